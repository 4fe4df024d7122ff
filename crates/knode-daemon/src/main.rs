//! knode: a Kademlia DHT node daemon.
//!
//! Loads configuration, binds the datagram transport, optionally joins an
//! existing network via a configured bootstrap peer, spawns the RPC
//! dispatcher, and then drives a line-oriented command channel over stdin
//! until `exit` or Ctrl-C.

mod commands;
mod config;

use std::net::IpAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use knode_dht::join;
use knode_dht::node::{Node, NodeState};
use knode_types::{Contact, NodeId};

use crate::commands::Outcome;
use crate::config::NodeConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("knode=info".parse()?),
        )
        .init();

    info!("knode starting");

    let config = NodeConfig::load()?;

    let self_id = match &config.self_node_id {
        Some(hex) => NodeId::from_hex(hex)?,
        None => NodeId::random(),
    };

    let bind_ip: IpAddr = config.advertised_host.parse()?;
    let state = NodeState::bind_with_pool(
        bind_ip,
        config.port,
        config.advertised_host.clone(),
        self_id,
        config.transport.ephemeral_base_port,
        config.transport.ephemeral_pool_size,
    )
    .await?;
    let node = Node::new(state.clone());

    info!(id = %node.print_id(), port = state.transport.main_port(), "node bound");

    tokio::spawn(knode_dht::dispatcher::run(state.clone()));

    if !config.is_bootstrap_node {
        if let (Some(bootstrap_port), Some(bootstrap_id_hex)) =
            (config.bootstrap_port, &config.bootstrap_node_id)
        {
            let bootstrap_id = NodeId::from_hex(bootstrap_id_hex)?;
            let bootstrap_contact = Contact::new(
                bootstrap_id,
                format!("{}:{}", config.advertised_host, bootstrap_port),
            );
            info!(bootstrap_port, "joining network via bootstrap peer");
            join::join(&node, bootstrap_contact).await;
        }
    }

    run_command_loop(node).await;

    info!("knode stopped");
    Ok(())
}

async fn run_command_loop(node: Node) {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else {
                    break;
                };
                match commands::handle_line(&node, &line).await {
                    Outcome::Reply(reply) => println!("{reply}"),
                    Outcome::Exit(reply) => {
                        println!("{reply}");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, shutting down");
                break;
            }
        }
    }
}
