//! Mock Stub Engine - CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use mock_stub_engine::{IncomingRequest, MockServer, MockServerConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "mock-stub-engine",
    about = "Load HTTP stub definitions and replay requests against them",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "mock-server.yaml")]
    config: PathBuf,

    /// Directory that file bodies are resolved against (overrides the config)
    #[arg(long, value_name = "DIR")]
    files_root: Option<PathBuf>,

    /// Request to dispatch, e.g. "GET /company/100/users?name=bob" (repeatable)
    #[arg(short, long = "request", value_name = "REQUEST")]
    requests: Vec<String>,

    /// Header added to every request, e.g. "Accept: application/json" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Basic auth credentials added to every request, as user:password
    #[arg(long, value_name = "USER:PASSWORD")]
    basic_auth: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print sample configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let default_config = include_str!("../demos/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    // Load configuration
    let mut config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        MockServerConfig::from_file(&args.config)
            .with_context(|| format!("Invalid configuration: {}", args.config.display()))?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (no stubs)");
        MockServerConfig::default()
    };

    if args.validate {
        println!(
            "Configuration is valid ({} stubs defined)",
            config.stubs.len()
        );
        return Ok(());
    }

    if let Some(root) = args.files_root {
        config.settings.files_root = root;
    }

    let headers = args
        .headers
        .iter()
        .map(|h| parse_header(h))
        .collect::<Result<Vec<_>>>()?;
    let credentials = args.basic_auth.as_deref().map(parse_credentials).transpose()?;

    let server = MockServer::from_config(config)?;

    for line in &args.requests {
        let mut request = parse_request_line(line)?;
        for (name, value) in &headers {
            request = request.with_header(name.clone(), value.clone());
        }
        if let Some((user, password)) = credentials {
            request = request.with_basic_auth(user, password);
        }

        let outcome = server.dispatch(&request);
        let rendered = server.render(&server.response_for(&outcome))?;

        let output = serde_json::json!({
            "request": line,
            "stub_id": outcome.stub_id().map(|id| id.0),
            "stub": outcome.stub().and_then(|rule| rule.name()),
            "status": rendered.status,
            "headers": rendered.headers,
            "body": rendered.body_text(),
        });
        println!("{}", output);
    }

    info!(
        total = server.total_requests(),
        matched = server.total_matched(),
        unmatched = server.total_unmatched(),
        "Replay finished"
    );

    Ok(())
}

/// Parse "METHOD /target" or a bare "/target" (GET).
fn parse_request_line(line: &str) -> Result<IncomingRequest> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(target), None, None) if target.starts_with('/') => Ok(IncomingRequest::get(target)),
        (Some(method), Some(target), None) if target.starts_with('/') => {
            Ok(IncomingRequest::new(method, target))
        }
        _ => anyhow::bail!("Invalid request line: {:?}", line),
    }
}

fn parse_header(header: &str) -> Result<(String, String)> {
    let (name, value) = header
        .split_once(':')
        .with_context(|| format!("Invalid header, expected \"Name: value\": {:?}", header))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn parse_credentials(credentials: &str) -> Result<(&str, &str)> {
    credentials
        .split_once(':')
        .context("Invalid basic auth, expected user:password")
}
