//! jsmod CLI entry point.
//!
//! Loads a configuration file, configures the eval component, then feeds it
//! requests and prints one JSON line per emission.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use jsmod_common::{ConfigFile, Settings};
use jsmod_component::{EvalComponent, Request};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Run an ECMAScript module graph as a request handler.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file (runtime options and script settings).
    #[arg(short, long, env = "JSMOD_CONFIG")]
    config: Option<PathBuf>,

    /// Use the built-in sample settings instead of the file's settings.
    #[arg(long)]
    sample: bool,

    /// Invoke once with this JSON input instead of reading requests from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t, env = "JSMOD_LOG_FORMAT")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!("Starting jsmod");

    let (config, settings) = load(cli.config.as_deref(), cli.sample)?;
    info!(
        deadline_ms = config.runtime.evaluation.deadline_ms,
        modules = settings.modules.len(),
        "Configuration loaded"
    );

    let component = EvalComponent::from_config(&config.runtime)?;
    component
        .reconfigure(settings)
        .await
        .context("Failed to configure script")?;
    info!(ports = ?component.ports(), "Component ready");

    if let Some(input) = cli.input {
        let input: Value = serde_json::from_str(&input).context("--input is not valid JSON")?;
        run(&component, Request::new(Value::Null, Some(input))).await?;
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Request>(&line) {
            Ok(request) => run(&component, request).await?,
            Err(e) => warn!(error = %e, "Skipping malformed request"),
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,jsmod=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn load(path: Option<&Path>, sample: bool) -> anyhow::Result<(ConfigFile, Settings)> {
    let Some(path) = path else {
        return Ok((ConfigFile::default(), Settings::sample()));
    };

    let config = ConfigFile::from_file(path)?;
    if sample {
        return Ok((config, Settings::sample()));
    }

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let settings = config
        .load_settings(base_dir)
        .with_context(|| format!("Failed to load scripts for {}", path.display()))?;
    Ok((config, settings))
}

async fn run(component: &EvalComponent, request: Request) -> anyhow::Result<()> {
    match component.handle(request).await {
        Ok(emission) => {
            let line = json!({"port": emission.port(), "message": emission.to_json()});
            println!("{line}");
        }
        Err(e) if e.is_invocation() => warn!(error = %e, "Invocation failed"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
