//! partner-intel binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing (RUST_LOG > --log-level > config)
//! 3. Resolve API keys from the environment or config file
//! 4. Wire the completion client, engine bridge and orchestrator
//! 5. Run the selected command: serve, chat, probe or init

mod cli;
mod repl;

use std::sync::Arc;

use clap::Parser;

use intel_api::state::AppState;
use intel_chat::{ConversationOrchestrator, GeminiClient};
use intel_core::config::{IntelConfig, Secret};
use intel_engine::EngineBridge;

use cli::{CliArgs, Command};

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_orchestrator(
    config: &IntelConfig,
) -> Result<ConversationOrchestrator, Box<dyn std::error::Error>> {
    let secrets = config.resolve_secrets()?;
    let client = GeminiClient::from_config(&config.llm, secrets.gemini_api_key)?;
    let bridge = EngineBridge::from_config(&config.backend, secrets.engine_api_key)?;
    tracing::info!(
        model = %config.llm.model,
        backend = %config.backend.base_url,
        max_tool_rounds = config.llm.max_tool_rounds,
        "Orchestrator ready"
    );
    Ok(ConversationOrchestrator::from_config(
        config,
        Arc::new(client),
        Arc::new(bridge),
    )?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let command = args.command();
    let config_file = args.resolve_config_path();

    // Init writes the file and never reads it.
    if let Command::Init { force } = command {
        init_tracing(&args.resolve_log_level("info"));
        if config_file.exists() && !force {
            return Err(format!(
                "{} already exists (use --force to overwrite)",
                config_file.display()
            )
            .into());
        }
        IntelConfig::default().save(&config_file)?;
        println!("Wrote default configuration to {}", config_file.display());
        return Ok(());
    }

    // Load before tracing is up so the config can pick the log level.
    let loaded = IntelConfig::load_optional(&config_file);
    let config_level = match &loaded {
        Ok(Some(c)) => c.general.log_level.clone(),
        _ => IntelConfig::default().general.log_level,
    };
    init_tracing(&args.resolve_log_level(&config_level));

    tracing::info!("Starting partner-intel v{}", env!("CARGO_PKG_VERSION"));

    // Only a missing file falls back to defaults; a broken one is fatal.
    let mut config = match loaded {
        Ok(Some(c)) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            c
        }
        Ok(None) => {
            tracing::warn!(path = %config_file.display(), "No config file, using defaults");
            IntelConfig::default()
        }
        Err(e) => {
            tracing::error!(path = %config_file.display(), error = %e, "Config file unusable");
            return Err(e.into());
        }
    };
    config.validate()?;

    match command {
        Command::Serve { .. } => {
            config.server.port = args.resolve_port(config.server.port);
            let orchestrator = build_orchestrator(&config)?;
            let state = AppState::new(config.clone(), orchestrator);
            intel_api::start_server(&config, state).await?;
        }
        Command::Chat => {
            let orchestrator = build_orchestrator(&config)?;
            repl::run(&orchestrator).await?;
        }
        Command::Probe => {
            // Probing needs no completion key; the engine key is optional.
            let key = config
                .resolve_secrets()
                .map(|s| s.engine_api_key)
                .unwrap_or_else(|_| Secret::new(""));
            let bridge = EngineBridge::from_config(&config.backend, key)?;
            let report = bridge.probe().await?;
            println!(
                "{} -> HTTP {} ({}) in {} ms",
                bridge.base_url(),
                report.status,
                if report.live { "live" } else { "not ready" },
                report.elapsed.as_millis()
            );
            if !report.excerpt.is_empty() {
                println!("{}", report.excerpt);
            }
        }
        Command::Init { .. } => {}
    }

    Ok(())
}
