mod actions;
mod deadline;
mod gateway;
mod grammar;
mod orchestrator;
mod resolver;
mod state;
#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use grammar::CommandGrammar;
use grouper_core::{
    config::{self, Config},
    shellexpand,
    traits::{MessagingPlatform, NameService, Provider},
};
use grouper_memory::{audit::AuditStatus, AuditLogger, Store};
use grouper_platform::{BridgePlatform, HttpNameService};
use grouper_providers::openai::OpenAiProvider;
use orchestrator::Orchestrator;
use resolver::HandleResolver;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "grouper",
    version,
    about = "Grouper: sidebar groups on demand for group messaging"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the agent.
    Start,
    /// Check the platform bridge and provider.
    Status,
    /// Resolve mention tokens the way the agent would.
    Resolve {
        /// Handles, addresses or inbox ids (with or without `@`).
        #[arg(required = true)]
        tokens: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (cfg, source) = config::load(&cli.config)?;
    let _log_guard = init_logging(&cfg)?;
    source.log();

    match cli.command {
        Commands::Start => {
            let platform: Arc<dyn MessagingPlatform> =
                Arc::new(BridgePlatform::connect(&cfg.platform).await?);
            let memory = Store::new(&cfg.memory).await?;

            let provider = build_provider(&cfg)?;
            if !provider.is_available().await {
                warn!(
                    "provider '{}' is not available; free-text replies will fall back",
                    provider.name()
                );
            }

            let resolver = Arc::new(build_resolver(&cfg, platform.clone(), &memory));
            let orchestrator = Arc::new(Orchestrator::new(
                platform.clone(),
                resolver.clone(),
                cfg.orchestrator.call_timeout(),
            ));
            let grammar = CommandGrammar::new(&cfg.agent.handle)?;

            println!("{}: starting agent...", cfg.agent.name);
            let gw = Arc::new(gateway::Gateway::new(
                platform,
                provider,
                orchestrator,
                resolver,
                grammar,
                &memory,
                cfg.conversation.clone(),
                cfg.orchestrator.call_timeout(),
                cfg.agent.name.clone(),
            ));
            gw.run().await?;
        }
        Commands::Status => {
            println!("{} status check\n", cfg.agent.name);
            println!("Config: {}", cli.config);
            println!("Handle: @{}", cfg.agent.handle);
            println!("Platform bridge: {}", cfg.platform.base_url);
            println!("Default provider: {}", cfg.provider.default);
            println!(
                "Name services: {}",
                cfg.directory
                    .services
                    .iter()
                    .map(|s| s.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!();

            match BridgePlatform::connect(&cfg.platform).await {
                Ok(platform) => println!(
                    "  bridge: connected as {}{}",
                    platform.self_inbox_id(),
                    platform
                        .address()
                        .map(|a| format!(" ({a})"))
                        .unwrap_or_default()
                ),
                Err(e) => println!("  bridge: unreachable ({e})"),
            }

            match build_provider(&cfg) {
                Ok(provider) => println!(
                    "  {}: {}",
                    provider.name(),
                    if provider.is_available().await {
                        "available"
                    } else {
                        "missing api key"
                    }
                ),
                Err(e) => println!("  provider: {e}"),
            }

            match Store::new(&cfg.memory).await {
                Ok(memory) => {
                    match memory.handle_count().await {
                        Ok(n) => println!("  handle cache: {n} handles"),
                        Err(e) => println!("  handle cache: {e}"),
                    }
                    let audit = AuditLogger::new(memory.pool().clone());
                    let mut counts = Vec::new();
                    for status in AuditStatus::ALL {
                        let n = audit.count(status).await.unwrap_or_default();
                        counts.push(format!("{n} {}", status.as_str()));
                    }
                    println!("  audit log: {}", counts.join(", "));
                }
                Err(e) => println!("  memory: unavailable ({e})"),
            }
        }
        Commands::Resolve { tokens } => {
            let platform: Arc<dyn MessagingPlatform> =
                Arc::new(BridgePlatform::connect(&cfg.platform).await?);
            let memory = Store::new(&cfg.memory).await?;
            let resolver = build_resolver(&cfg, platform, &memory);

            for resolution in resolver.resolve_batch(&tokens).await {
                println!(
                    "@{} → {}",
                    resolution.token.trim_start_matches('@'),
                    resolution.recipient.as_deref().unwrap_or("(unresolved)")
                );
            }
        }
    }

    Ok(())
}

/// Console plus daily-rolling file logging under `<data_dir>/logs/`.
fn init_logging(cfg: &Config) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = PathBuf::from(shellexpand(&cfg.agent.data_dir)).join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, "grouper.log"));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.agent.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    info!("logging to {}", log_dir.display());
    Ok(guard)
}

/// Build the configured provider.
fn build_provider(cfg: &Config) -> anyhow::Result<Arc<dyn Provider>> {
    match cfg.provider.default.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::from_config(&cfg.provider.openai))),
        other => anyhow::bail!("unsupported provider: {other}"),
    }
}

/// Resolver over the platform, the persisted handle cache and the configured
/// name services, in config order.
fn build_resolver(
    cfg: &Config,
    platform: Arc<dyn MessagingPlatform>,
    memory: &Store,
) -> HandleResolver {
    let services: Vec<Arc<dyn NameService>> = cfg
        .directory
        .services
        .iter()
        .map(|s| Arc::new(HttpNameService::from_config(s)) as Arc<dyn NameService>)
        .collect();

    HandleResolver::new(
        platform,
        Arc::new(memory.clone()),
        services,
        cfg.directory.handle_suffixes.clone(),
        cfg.orchestrator.call_timeout(),
    )
}
