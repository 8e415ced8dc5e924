//! Integration tests for the cardsmith `convert` and `init` commands

use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use assert_cmd::Command as AssertCommand;
use predicates::prelude::*;
use tempfile::TempDir;

const CARD: &str = "BEGIN:VCARD\nVERSION:3.0\nFN:Jane Doe\nEMAIL:jane@x.com\nTEL:555-1234\nEND:VCARD";
const CARD_LI: &str = "BEGIN:VCARD\nVERSION:3.0\nFN:Li Lei\nTEL:138-0000-0000\nEND:VCARD";

const PROXY_VARS: &[&str] = &[
    "HTTP_PROXY",
    "http_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "ALL_PROXY",
    "all_proxy",
];

// =============================================================================
// Test Helpers
// =============================================================================

/// Isolated config location; the file itself only exists when written.
struct TestEnv {
    temp_dir: TempDir,
    config_path: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        Self {
            temp_dir,
            config_path,
        }
    }

    fn with_config(contents: &str) -> Self {
        let env = Self::new();
        fs::write(&env.config_path, contents).unwrap();
        env
    }

    /// Run cardsmith with this test env's config
    fn cardsmith(&self) -> AssertCommand {
        let mut cmd = AssertCommand::cargo_bin("cardsmith").unwrap();
        cmd.args(["--config", self.config_path.to_str().unwrap()])
            .env_remove("ANTHROPIC_API_KEY")
            .env_remove("CARDSMITH_LOG");
        // The mock server lives on loopback; keep requests off any proxy.
        for var in PROXY_VARS {
            cmd.env_remove(var);
        }
        cmd
    }
}

/// Minimal HTTP server answering each connection with the next canned reply.
struct MockServer {
    base_url: String,
    handle: JoinHandle<Vec<String>>,
}

impl MockServer {
    fn start(replies: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut requests = Vec::new();
            for (status, body) in replies {
                let (mut stream, _) = listener.accept().unwrap();
                requests.push(read_request(&mut stream));
                let reason = if status == 200 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).unwrap();
                stream.flush().unwrap();
            }
            requests
        });
        Self {
            base_url: format!("http://{}/v1", addr),
            handle,
        }
    }

    /// Raw requests received, lowercased for header matching.
    fn requests(self) -> Vec<String> {
        self.handle
            .join()
            .unwrap()
            .into_iter()
            .map(|r| r.to_lowercase())
            .collect()
    }
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= head_end + 4 + content_length {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn chat_reply(content: &str) -> (u16, String) {
    let body = serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    });
    (200, body.to_string())
}

// =============================================================================
// Dry run
// =============================================================================

#[test]
fn test_dry_run_custom_without_key_has_no_authorization() {
    let env = TestEnv::new();
    env.cardsmith()
        .args([
            "convert",
            "--dry-run",
            "--custom",
            "--base-url",
            "http://localhost:1234/v1/",
        ])
        .write_stdin("Jane Doe 555-1234")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "POST http://localhost:1234/v1/chat/completions",
        ))
        .stdout(predicate::str::contains("Jane Doe 555-1234"))
        .stdout(predicate::str::contains("\"max_tokens\": 1000"))
        .stdout(predicate::str::contains("llama-3-8b-instruct"))
        .stdout(predicate::str::contains("Authorization").not());
}

#[test]
fn test_dry_run_custom_redacts_api_key() {
    let env = TestEnv::new();
    env.cardsmith()
        .args(["convert", "--dry-run", "--custom", "--api-key", "sk-local-secret"])
        .write_stdin("Jane Doe")
        .assert()
        .success()
        .stdout(predicate::str::contains("Authorization: Bearer <redacted>"))
        .stdout(predicate::str::contains("sk-local-secret").not());
}

#[test]
fn test_dry_run_hosted_uses_configured_key() {
    let env = TestEnv::with_config(
        r#"
[llm]
provider = "hosted"

[llm.hosted]
api_key = "sk-ant-secret"
"#,
    );
    env.cardsmith()
        .args(["convert", "--dry-run"])
        .write_stdin("Li Lei, 138-0000-0000")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "POST https://api.anthropic.com/v1/messages",
        ))
        .stdout(predicate::str::contains("anthropic-version: 2023-06-01"))
        .stdout(predicate::str::contains("x-api-key: <redacted>"))
        .stdout(predicate::str::contains("claude-sonnet-4-20250514"))
        .stdout(predicate::str::contains("sk-ant-secret").not());
}

// =============================================================================
// Conversion errors
// =============================================================================

#[test]
fn test_empty_input_is_rejected() {
    let env = TestEnv::new();
    env.cardsmith()
        .args(["convert", "--dry-run"])
        .write_stdin("   \n\t")
        .assert()
        .failure()
        .stderr(predicate::str::contains("input text is empty"));
}

#[test]
fn test_custom_provider_without_base_url_fails() {
    let env = TestEnv::with_config(
        r#"
[llm]
provider = "custom"

[llm.custom]
base_url = "   "
"#,
    );
    env.cardsmith()
        .args(["convert", "--dry-run"])
        .write_stdin("Jane Doe")
        .assert()
        .failure()
        .stderr(predicate::str::contains("base URL is not configured"));
}

#[test]
fn test_unreachable_endpoint_reports_transport_error() {
    let env = TestEnv::new();
    env.cardsmith()
        .args(["convert", "--custom", "--base-url", "http://127.0.0.1:9/v1"])
        .write_stdin("Jane Doe")
        .assert()
        .failure()
        .stderr(predicate::str::contains("request failed"));
}

#[test]
fn test_server_error_status_is_reported() {
    let server = MockServer::start(vec![(500, r#"{"error":"model not loaded"}"#.to_string())]);
    let env = TestEnv::new();
    env.cardsmith()
        .args(["convert", "--custom", "--base-url", &server.base_url])
        .write_stdin("Jane Doe")
        .assert()
        .failure()
        .stderr(predicate::str::contains("server returned 500"))
        .stderr(predicate::str::contains("model not loaded"));
    server.requests();
}

#[test]
fn test_malformed_response_is_reported() {
    let server = MockServer::start(vec![(200, r#"{"choices":[]}"#.to_string())]);
    let env = TestEnv::new();
    env.cardsmith()
        .args(["convert", "--custom", "--base-url", &server.base_url])
        .write_stdin("Jane Doe")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected response from model"));
    server.requests();
}

#[test]
fn test_several_inputs_require_batch() {
    let env = TestEnv::new();
    let a = env.temp_dir.path().join("a.txt");
    let b = env.temp_dir.path().join("b.txt");
    fs::write(&a, "Jane").unwrap();
    fs::write(&b, "Li").unwrap();

    env.cardsmith()
        .args(["convert", "--dry-run", a.to_str().unwrap(), b.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--batch"));
}

// =============================================================================
// Conversion through an OpenAI-compatible server
// =============================================================================

#[test]
fn test_convert_single_prints_trimmed_vcard() {
    let server = MockServer::start(vec![chat_reply(&format!("\n  {}  \n", CARD))]);
    let env = TestEnv::new();

    env.cardsmith()
        .args([
            "convert",
            "--custom",
            "--base-url",
            &server.base_url,
            "--api-key",
            "sk-test",
            "--model",
            "qwen2.5",
        ])
        .write_stdin("Jane Doe, jane@x.com, 555-1234")
        .assert()
        .success()
        .stdout(predicate::str::diff(format!("{}\n", CARD)));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.starts_with("post /v1/chat/completions"));
    assert!(request.contains("authorization: bearer sk-test"));
    assert!(request.contains("\"model\":\"qwen2.5\""));
    assert!(request.contains("\"max_tokens\":1000"));
    assert!(request.contains("jane doe, jane@x.com, 555-1234"));
}

#[test]
fn test_convert_batch_writes_combined_export() {
    let server = MockServer::start(vec![chat_reply(CARD), chat_reply(CARD_LI)]);
    let env = TestEnv::new();
    let first = env.temp_dir.path().join("jane.txt");
    let second = env.temp_dir.path().join("li.txt");
    fs::write(&first, "Jane Doe, jane@x.com, 555-1234").unwrap();
    fs::write(&second, "Li Lei 138-0000-0000").unwrap();
    let out_dir = env.temp_dir.path().join("out");
    fs::create_dir(&out_dir).unwrap();

    env.cardsmith()
        .args([
            "convert",
            "--batch",
            "--custom",
            "--base-url",
            &server.base_url,
            "-o",
            out_dir.to_str().unwrap(),
            first.to_str().unwrap(),
            second.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("contacts_batch_2.vcf"));

    let written = fs::read_to_string(out_dir.join("contacts_batch_2.vcf")).unwrap();
    assert_eq!(written, format!("{}\n\n{}", CARD, CARD_LI));

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].contains("jane doe"));
    assert!(requests[1].contains("li lei"));
    assert!(!requests[0].contains("authorization:"));
}

#[test]
fn test_convert_output_file_path() {
    let server = MockServer::start(vec![chat_reply(CARD)]);
    let env = TestEnv::new();
    let out = env.temp_dir.path().join("jane.vcf");

    env.cardsmith()
        .args([
            "convert",
            "--custom",
            "--base-url",
            &server.base_url,
            "-o",
            out.to_str().unwrap(),
        ])
        .write_stdin("Jane Doe")
        .assert()
        .success()
        .stdout("");

    assert_eq!(fs::read_to_string(&out).unwrap(), CARD);
    server.requests();
}

// =============================================================================
// Init
// =============================================================================

#[test]
fn test_init_creates_config() {
    let env = TestEnv::new();
    env.cardsmith()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default configuration"));

    let contents = fs::read_to_string(&env.config_path).unwrap();
    assert!(contents.contains("[llm.custom]"));
    assert!(contents.contains(r#"base_url = "http://localhost:1234/v1""#));
}

#[test]
fn test_init_fails_if_config_exists_without_force() {
    let env = TestEnv::with_config("# existing");
    env.cardsmith()
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(fs::read_to_string(&env.config_path).unwrap(), "# existing");
}

#[test]
fn test_init_force_overwrites_existing_config() {
    let env = TestEnv::with_config("# existing");
    env.cardsmith().args(["init", "--force"]).assert().success();
    let contents = fs::read_to_string(&env.config_path).unwrap();
    assert!(contents.contains(r#"provider = "hosted""#));
}

#[test]
fn test_invalid_config_is_reported() {
    let env = TestEnv::with_config("[llm]\nprovider = \"openai\"\n");
    env.cardsmith()
        .args(["convert", "--dry-run"])
        .write_stdin("Jane")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid llm.provider"));
}
