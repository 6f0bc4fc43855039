//! ufsrv inspector
//!
//! Decodes the artefacts a ufsrv client handles (server envelopes, sealed
//! command wrappers, persisted outbox blobs) and prints them as JSON.

mod summary;

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, fmt};

use ufsrv_crypto::integrity_token;
use ufsrv_protocol::{Command, WireEnvelope};

use crate::summary::{CommandSummary, EnvelopeSummary};

/// ufsrv protocol inspector
#[derive(Parser, Debug)]
#[command(name = "ufsrv-inspect")]
#[command(version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "UFSRV_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log format (plain, json)
    #[arg(long, global = true, env = "UFSRV_LOG_FORMAT", default_value = "plain")]
    log_format: String,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Inspect,
}

#[derive(Subcommand, Debug)]
enum Inspect {
    /// Decode a base64 wire envelope
    Envelope {
        /// Base64 of the encoded envelope
        data: String,
    },
    /// Decode a base64 sealed command wrapper
    Command {
        /// Base64 of the encoded wrapper
        data: String,
    },
    /// Decode a base64 opaque (persisted) command
    Opaque {
        /// Base64 of the opaque blob
        data: String,
    },
    /// Compute the request integrity token for an account
    Token {
        /// Account id
        #[arg(long, env = "UFSRV_ACCOUNT_ID")]
        account: String,

        /// Session cookie
        #[arg(long, env = "UFSRV_COOKIE")]
        cookie: String,
    },
}

#[derive(Serialize)]
struct TokenOutput {
    account: String,
    token: String,
}

fn setup_logging(log_level: &str, log_format: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs go to stderr so stdout stays valid JSON.
    match log_format.to_lowercase().as_str() {
        "json" => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
        _ => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
    }

    Ok(())
}

fn decode_base64(data: &str, what: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(data.trim())
        .with_context(|| format!("Input is not valid base64 {}", what))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to render output")?;
    println!("{}", rendered);
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    match &args.command {
        Inspect::Envelope { data } => {
            let envelope = WireEnvelope::from_base64(data.trim())
                .context("Failed to decode envelope")?;
            debug!(type_code = envelope.type_code(), "Decoded envelope");
            print_json(&EnvelopeSummary::of(&envelope), args.pretty)
        }
        Inspect::Command { data } => {
            let bytes = decode_base64(data, "command")?;
            let command = Command::from_bytes(&bytes).context("Failed to decode command")?;
            debug!(kind = %command.kind(), "Decoded command");
            print_json(&CommandSummary::of(&command), args.pretty)
        }
        Inspect::Opaque { data } => {
            let blob = decode_base64(data, "opaque blob")?;
            let command =
                Command::deserialize_opaque(&blob).context("Failed to restore opaque command")?;
            debug!(kind = %command.kind(), len = blob.len(), "Restored opaque command");
            print_json(&CommandSummary::of(&command), args.pretty)
        }
        Inspect::Token { account, cookie } => {
            let output = TokenOutput {
                account: account.clone(),
                token: integrity_token(account, cookie),
            };
            print_json(&output, args.pretty)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level, &args.log_format)?;
    run(&args)
}
