//! consult — ask several AI models the same question and compare the answers
//!
//! Usage:
//!   consult serve [--host 0.0.0.0] [--port 3001]
//!   consult models
//!   consult ask "Explain recursion" -m openai:gpt-4o-mini -m google:gemini-2.0-flash
//!   consult doctor
//!   consult init

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use consult_core::config::{DEFAULT_CONFIG_TOML, default_config_path};
use consult_core::doctor::{CheckStatus, run_doctor};
use consult_core::{ChatRequest, ChatResponseBatch, ConsultConfig, Dispatcher, ModelOutcome};
use consult_gateway::GatewayServer;
use consult_gateway::protocol::{ChatEnvelope, ModelsEnvelope};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "consult", version, about = "Multi-provider AI consultation")]
struct Cli {
    /// Config file (defaults to ~/.consult/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// List every addressable model id
    Models {
        #[arg(long)]
        json: bool,
    },
    /// Ask one or more models a question
    Ask {
        prompt: String,
        /// Addressable model id, e.g. openai:gpt-4o-mini (repeatable)
        #[arg(short, long = "model", required = true)]
        models: Vec<String>,
        /// Print the same JSON the HTTP API returns
        #[arg(long)]
        json: bool,
    },
    /// Check configuration and API keys
    Doctor,
    /// Write the default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!("consult v{}", env!("CARGO_PKG_VERSION"));
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Serve { host, port } => cmd_serve(config_path, host, port).await,
        Command::Models { json } => cmd_models(config_path, json),
        Command::Ask {
            prompt,
            models,
            json,
        } => cmd_ask(config_path, prompt, models, json).await,
        Command::Doctor => cmd_doctor(config_path),
        Command::Init { force } => cmd_init(config_path, force),
    }
}

fn load_dispatcher(config_path: Option<&Path>) -> Result<(ConsultConfig, Dispatcher)> {
    let config = ConsultConfig::load(config_path).context("Failed to load configuration")?;
    let dispatcher =
        Dispatcher::from_config(&config).context("Failed to build model catalog")?;
    Ok((config, dispatcher))
}

async fn cmd_serve(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let (config, dispatcher) = load_dispatcher(config_path)?;
    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);

    info!("consult v{} starting", env!("CARGO_PKG_VERSION"));
    GatewayServer::new(host, port, dispatcher).run().await
}

fn cmd_models(config_path: Option<&Path>, json: bool) -> Result<()> {
    let (_, dispatcher) = load_dispatcher(config_path)?;
    let models = dispatcher.catalog().list_models();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ModelsEnvelope::new(models))?
        );
        return Ok(());
    }

    let width = models
        .iter()
        .map(|m| m.addressable_id.len())
        .max()
        .unwrap_or(0);
    for model in models {
        println!(
            "{:<width$}  {} ({})",
            model.addressable_id, model.display_name, model.provider_display_name
        );
    }
    Ok(())
}

async fn cmd_ask(
    config_path: Option<&Path>,
    prompt: String,
    models: Vec<String>,
    json: bool,
) -> Result<()> {
    let (_, dispatcher) = load_dispatcher(config_path)?;
    let batch = dispatcher.dispatch(&ChatRequest::new(prompt, models)).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ChatEnvelope::from_batch(&batch))?
        );
    } else {
        print_batch(&batch);
    }
    Ok(())
}

fn print_batch(batch: &ChatResponseBatch) {
    for outcome in batch {
        match outcome {
            ModelOutcome::Success {
                display_name,
                provider_display_name,
                text,
                elapsed_ms,
                ..
            } => {
                println!("== {display_name} ({provider_display_name}) {elapsed_ms}ms");
                println!("{}\n", text.trim_end());
            }
            ModelOutcome::Failure {
                display_name,
                provider_display_name,
                error_message,
                ..
            } => {
                println!("!! {display_name} ({provider_display_name}) failed: {error_message}\n");
            }
        }
    }

    let summary = batch.summary();
    match summary.average_elapsed_ms {
        Some(avg) => println!(
            "{}/{} succeeded, average {}ms",
            summary.succeeded, summary.total, avg
        ),
        None => println!("{}/{} succeeded", summary.succeeded, summary.total),
    }
}

fn cmd_doctor(config_path: Option<&Path>) -> Result<()> {
    let report = run_doctor(config_path)?;

    for check in &report.checks {
        println!("{:>9}  {}: {}", check.status, check.name, check.message);
        if check.status != CheckStatus::Ok
            && let Some(hint) = &check.fix_hint
        {
            println!("{:>9}  {}", "fix", hint);
        }
    }
    println!("\n{}", report.summary());

    if !report.is_healthy() {
        bail!(
            "Doctor found {} broken check(s)",
            report.count(CheckStatus::Broken)
        );
    }
    Ok(())
}

fn cmd_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    if path.exists() && !force {
        bail!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote {}", path.display());
    println!(
        "Set API keys via environment variables or the api_key field, then run `consult doctor`."
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::parse_from([
            "consult",
            "ask",
            "Explain recursion",
            "-m",
            "openai:gpt-4o-mini",
            "--model",
            "groq:llama3-8b-8192",
        ]);
        match cli.command {
            Command::Ask { prompt, models, json } => {
                assert_eq!(prompt, "Explain recursion");
                assert_eq!(models, ["openai:gpt-4o-mini", "groq:llama3-8b-8192"]);
                assert!(!json);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_ask_requires_a_model() {
        assert!(Cli::try_parse_from(["consult", "ask", "hi"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from([
            "consult",
            "serve",
            "--port",
            "8080",
            "--config",
            "/tmp/c.toml",
        ]);
        assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/c.toml")));
        assert!(matches!(cli.command, Command::Serve { port: Some(8080), .. }));
    }

    #[test]
    fn test_init_writes_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        cmd_init(Some(&path), false).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, DEFAULT_CONFIG_TOML);

        assert!(cmd_init(Some(&path), false).is_err());
        assert!(cmd_init(Some(&path), true).is_ok());
    }
}
