mod batch;
mod clipboard;
mod config;
mod convert;
mod error;
mod export;
mod logging;
mod prompt;
mod provider;
mod session;
mod transport;
mod ui;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use config::Config;
use convert::Converter;
use provider::{provider_for, ConversionConfig};
use session::{Applied, Mode, Session};
use transport::HttpTransport;

#[derive(Parser, Debug)]
#[command(name = "cardsmith", version, about = "Turn free-form contact text into vCard 3.0")]
struct Cli {
    /// Configuration file (defaults to the platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert contact text without starting the interface
    Convert(ConvertArgs),
    /// Write a commented default configuration file
    Init(InitArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Files holding contact text, or "-" for stdin. Reads stdin when omitted.
    #[arg(value_name = "INPUT")]
    inputs: Vec<String>,

    /// Treat every input as one contact and combine the results
    #[arg(long)]
    batch: bool,

    /// Write the result to PATH instead of stdout. A directory receives the
    /// default export file name.
    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,

    /// Print the request that would be sent and exit
    #[arg(long)]
    dry_run: bool,

    /// Use the OpenAI-compatible endpoint
    #[arg(long, conflicts_with = "hosted")]
    custom: bool,

    /// Use the hosted Anthropic endpoint
    #[arg(long)]
    hosted: bool,

    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Args, Debug)]
struct InitArgs {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Convert(args)) => {
            logging::init_cli_logging()?;
            let config = config::load(cli.config.as_deref())?;
            handle_convert(args, &config)
        }
        Some(Command::Init(args)) => {
            logging::init_cli_logging()?;
            handle_init(cli.config.as_deref(), args.force)
        }
        None => {
            logging::init_tui_logging()?;
            let config = config::load(cli.config.as_deref())?;
            info!(
                config = %config.config_path.display(),
                from_file = config.from_file,
                "configuration loaded"
            );
            let mut app = ui::app::App::new(&config)?;
            app.run()
        }
    }
}

fn handle_init(path: Option<&Path>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config::default_config_path()?,
    };
    config::write_default(&path, force)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn apply_overrides(args: &ConvertArgs, mut conversion: ConversionConfig) -> ConversionConfig {
    if args.custom {
        conversion.use_custom_endpoint = true;
    }
    if args.hosted {
        conversion.use_custom_endpoint = false;
    }
    if let Some(base_url) = &args.base_url {
        conversion.base_url = base_url.trim().to_string();
    }
    if let Some(model) = &args.model {
        conversion.model = model.trim().to_string();
    }
    if let Some(api_key) = &args.api_key {
        let api_key = api_key.trim();
        conversion.api_key = (!api_key.is_empty()).then(|| api_key.to_string());
    }
    conversion
}

fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        return Ok(text);
    }
    fs::read_to_string(source).with_context(|| format!("failed to read {}", source))
}

fn handle_convert(args: ConvertArgs, config: &Config) -> Result<()> {
    let sources = if args.inputs.is_empty() {
        vec!["-".to_string()]
    } else {
        args.inputs.clone()
    };
    if !args.batch && sources.len() > 1 {
        bail!("several inputs given; pass --batch to convert them into one file");
    }

    let texts = sources
        .iter()
        .map(|source| read_input(source))
        .collect::<Result<Vec<_>>>()?;

    let mut session = Session::new(apply_overrides(&args, config.conversion.clone()));
    if args.batch {
        session.toggle_mode();
    }

    if args.dry_run {
        return print_requests(&session.conversion, &texts);
    }

    let converter = Converter::new(Box::new(HttpTransport::new()?));
    let mode = session.mode();
    let mut failures = 0usize;

    for (source, text) in sources.iter().zip(&texts) {
        session.input = text.clone();
        match converter.convert(&session.conversion, text) {
            Ok(vcard) => match session.apply_result(mode, text, vcard) {
                Applied::Single => {}
                Applied::Added { name, total } => {
                    info!(source = %source, name = %name, total, "added to batch");
                }
            },
            Err(err) if mode == Mode::Single => return Err(err.into()),
            Err(err) => {
                error!(source = %source, "conversion failed: {}", err);
                failures += 1;
            }
        }
    }

    write_output(&session, args.output.as_deref())?;

    if failures > 0 {
        bail!("{} of {} inputs failed to convert", failures, texts.len());
    }
    Ok(())
}

fn print_requests(conversion: &ConversionConfig, texts: &[String]) -> Result<()> {
    let provider = provider_for(conversion);
    for text in texts {
        let request = provider.build_request(text)?;
        println!("POST {}", request.url);
        for (name, value) in request.redacted_headers() {
            println!("{}: {}", name, value);
        }
        println!();
        println!("{}", serde_json::to_string_pretty(&request.body)?);
    }
    Ok(())
}

fn write_output(session: &Session, output: Option<&Path>) -> Result<()> {
    let content = session.output();
    let Some(path) = output else {
        if !content.is_empty() {
            println!("{}", content);
        }
        return Ok(());
    };

    let (dir, name) = if path.is_dir() {
        (path.to_path_buf(), session.export_file_name())
    } else {
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| session.export_file_name());
        (dir, name)
    };

    match export::write_export(&dir, &name, content)? {
        Some(written) => eprintln!("Wrote {}", written.display()),
        None => eprintln!("Nothing to export"),
    }
    Ok(())
}
