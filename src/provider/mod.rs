//! Chat-completion providers.
//!
//! A provider knows two things: how to turn the user's text into an outbound
//! request, and where the vCard text lives in the JSON it gets back.
//! - `HostedProvider`: the fixed Anthropic messages endpoint
//! - `CustomProvider`: any OpenAI-compatible server (LM Studio, Ollama, vLLM, ...)

pub mod custom;
pub mod hosted;

use serde::Serialize;
use serde_json::Value;

use crate::error::ConvertError;

pub use custom::CustomProvider;
pub use hosted::HostedProvider;

/// Upper bound on generated tokens, identical for every provider.
pub const MAX_TOKENS: u32 = 1000;

pub const DEFAULT_CUSTOM_BASE_URL: &str = "http://localhost:1234/v1";
pub const DEFAULT_CUSTOM_MODEL: &str = "llama-3-8b-instruct";

/// Settings read once per conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionConfig {
    pub use_custom_endpoint: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Key for the hosted provider; never editable from the settings form.
    pub hosted_api_key: Option<String>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            use_custom_endpoint: false,
            base_url: DEFAULT_CUSTOM_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_CUSTOM_MODEL.to_string(),
            hosted_api_key: None,
        }
    }
}

impl ConversionConfig {
    /// Short human-readable description of the active backend.
    pub fn describe(&self) -> String {
        if self.use_custom_endpoint {
            format!("{} ({})", self.model, self.base_url)
        } else {
            "Claude (Anthropic)".to_string()
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// JSON body shared by both providers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatBody {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
}

impl ChatBody {
    pub fn single_user_message(model: impl Into<String>, content: String) -> Self {
        Self {
            model: model.into(),
            max_tokens: MAX_TOKENS,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
        }
    }
}

/// A fully assembled POST request, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: ChatBody,
}

/// Header names whose values must never be printed.
const SECRET_HEADERS: &[&str] = &["authorization", "x-api-key"];

impl OutboundRequest {
    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Headers with credential values masked, for display.
    pub fn redacted_headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(key, value)| {
                let lower = key.to_ascii_lowercase();
                if !SECRET_HEADERS.contains(&lower.as_str()) {
                    return (key.clone(), value.clone());
                }
                let masked = match value.split_once(' ') {
                    Some((scheme, _)) => format!("{} <redacted>", scheme),
                    None => "<redacted>".to_string(),
                };
                (key.clone(), masked)
            })
            .collect()
    }
}

/// One chat-completion backend.
pub trait Provider: Send + Sync {
    /// Name used in logs and notices.
    fn name(&self) -> &'static str;

    /// Assemble the request for `input`. Fails on blank input or incomplete
    /// configuration.
    fn build_request(&self, input: &str) -> Result<OutboundRequest, ConvertError>;

    /// Pull the vCard text out of the parsed response body, trimmed.
    fn parse_response(&self, body: &Value) -> Result<String, ConvertError>;
}

/// Pick the provider selected by `config`.
pub fn provider_for(config: &ConversionConfig) -> Box<dyn Provider> {
    if config.use_custom_endpoint {
        Box::new(CustomProvider::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.model.clone(),
        ))
    } else {
        Box::new(HostedProvider::new(config.hosted_api_key.clone()))
    }
}

fn ensure_input(input: &str) -> Result<(), ConvertError> {
    if input.trim().is_empty() {
        return Err(ConvertError::EmptyInput);
    }
    Ok(())
}

/// Walk `path` through nested arrays/objects and return the string found
/// there, trimmed.
fn extract_text(body: &Value, path: &[PathStep], shape: &str) -> Result<String, ConvertError> {
    let mut current = body;
    for step in path {
        let next = match step {
            PathStep::Key(key) => current.get(*key),
            PathStep::Index(index) => current.get(*index),
        };
        current = next.ok_or_else(|| {
            ConvertError::MalformedResponse(format!("missing `{}` in response", shape))
        })?;
    }
    current
        .as_str()
        .map(|text| text.trim().to_string())
        .ok_or_else(|| ConvertError::MalformedResponse(format!("`{}` is not a string", shape)))
}

#[derive(Debug, Clone, Copy)]
enum PathStep {
    Key(&'static str),
    Index(usize),
}
