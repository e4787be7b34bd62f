//! AgentAsKit orchestration core — binary entry point.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Arg, Command};
use tracing::{error, info};

use agentaskit_core::runtime::{BrokerBackend, CoreRuntime, PersistenceBackend};
use agentaskit_shared::config::CoreConfig;

#[tokio::main]
async fn main() -> Result<()> {
    agentaskit_core::init_tracing();

    let matches = Command::new("AgentAsKit Orchestration Core")
        .version(env!("CARGO_PKG_VERSION"))
        .author("AgentAsKit Contributors")
        .about("Agent Registry, Orchestrator, Distributed Task Service, Performance Monitor")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("in-memory")
                .long("in-memory")
                .help("Run against in-memory persistence and broker instead of Postgres/Redis")
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(Command::new("start").about("Assemble the core runtime and run until signalled"))
        .subcommand(Command::new("status").about("Report configuration and exit without starting background loops"))
        .get_matches();

    let config_path = matches.get_one::<PathBuf>("config").cloned();
    let config = CoreConfig::load(config_path.as_deref())?;
    let in_memory = matches.get_flag("in-memory");

    match matches.subcommand() {
        Some(("status", _)) => {
            println!("app: {} ({})", config.app.name, config.app.environment);
            println!("persistence: {}", config.persistence.database_url);
            println!("broker: {}", config.broker.redis_url);
            Ok(())
        }
        Some(("start", _)) | None => run(config, in_memory).await,
        Some((other, _)) => {
            error!(subcommand = other, "unknown subcommand");
            Ok(())
        }
    }
}

async fn run(config: CoreConfig, in_memory: bool) -> Result<()> {
    let (persistence_backend, broker_backend) = if in_memory {
        (PersistenceBackend::InMemory, BrokerBackend::InMemory)
    } else {
        (PersistenceBackend::Postgres, BrokerBackend::Redis)
    };

    let runtime = CoreRuntime::assemble(config, persistence_backend, broker_backend, None, None)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    runtime.start().await;
    info!("agentaskit-core running, press Ctrl+C to shut down");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    runtime.shutdown().await;

    Ok(())
}
