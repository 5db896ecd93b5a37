use anyhow::{bail, Context, Result};
use banmesh_core::{logging, ActorId, Config};
use banmesh_sync::{
    cancel_pair, spawn_sweeper, InMemoryGateway, NodeGateway, NodeRegistry, Operator,
    SyncService, TracingNotifier,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

mod console;

use console::ConsoleCommand;

const NODE_PROTOCOL_VERSION: u32 = 1;
const NODE_RUNTIME_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    runtime_version: u32,
    protocol_version: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--version-json") {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            runtime_version: NODE_RUNTIME_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let config_path = parse_config_path(&args)?;
    let config = Config::from_file(&config_path)?;
    logging::init_with(config.log_format);

    let registry = Arc::new(NodeRegistry::from_config(&config.nodes)?);
    let gateway = Arc::new(InMemoryGateway::with_nodes(
        config.nodes.iter().map(|n| n.id.clone()),
    ));

    let (shutdown, cancel) = cancel_pair();
    let service = Arc::new(
        SyncService::new(
            registry.clone(),
            gateway.clone(),
            Arc::new(TracingNotifier),
            &config.sync,
        )
        .with_cancel(cancel.clone()),
    );
    let sweeper = spawn_sweeper(service.lock(), config.sync.sweep_interval(), cancel.clone());

    // Writes made by the service come back as platform events, exactly as a
    // live platform would deliver them.
    let mut echoes = gateway.subscribe_echo();
    let echo_service = service.clone();
    let echo_task = tokio::spawn(async move {
        while let Some(event) = echoes.recv().await {
            if let Err(e) = echo_service.handle_ban_event(event).await {
                warn!(error = %e, "echoed ban event failed");
            }
        }
    });

    info!(
        nodes = registry.len(),
        config = %config_path.display(),
        "banmesh node started"
    );

    tokio::select! {
        result = run_console(&service, &gateway) => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupt received"),
    }

    shutdown.cancel();
    echo_task.abort();
    sweeper.await.context("lock sweeper panicked")?;
    info!("banmesh node stopped");
    Ok(())
}

async fn run_console(service: &SyncService, gateway: &InMemoryGateway) -> Result<()> {
    let Some(home) = service.registry().iter().next() else {
        bail!("node table is empty");
    };
    let operator = Operator {
        actor: ActorId::new("console"),
        node: home.id.clone(),
        has_ban_authority: true,
    };

    println!("{}", console::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match console::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match command {
            ConsoleCommand::Operator(command) => match service.execute(&operator, command).await {
                Ok(report) => println!("{}", report.summary()),
                Err(e) => println!("error: {e}"),
            },
            ConsoleCommand::Ban(event) => {
                // The ban happens on the node first; the event follows.
                let reason = event.reason.clone().unwrap_or_default();
                gateway.seed_ban(&event.node, &event.subject, &reason);
                match service.handle_ban_event(event).await {
                    Ok(Some(report)) => println!("{}", report.summary()),
                    Ok(None) => println!("event ignored"),
                    Err(e) => println!("error: {e}"),
                }
            }
            ConsoleCommand::Bans(node) => match gateway.list_ban_records(&node).await {
                Ok(records) => {
                    for record in records {
                        println!("{}\t{}", record.subject, record.reason);
                    }
                }
                Err(e) => println!("error: {e}"),
            },
            ConsoleCommand::Help => println!("{}", console::HELP),
            ConsoleCommand::Quit => break,
        }
    }
    Ok(())
}

fn parse_config_path(args: &[String]) -> Result<PathBuf> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            if let Some(path) = args_iter.next() {
                return Ok(PathBuf::from(path));
            }
            bail!("--config was provided without a path");
        }
    }

    bail!("missing required --config <path> argument")
}
