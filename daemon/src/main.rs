// Daemon entry point (SPEC_FULL.md §9): parse the CLI, build a
// `FlowHandler` scoped to this broker's serviced chains, and drive it
// through its async actor loop. No P2P transport or RPC surface is wired
// up here — those are the explicit Non-goal (spec.md §1: "networking
// transport layer"); this binary only proves the core runs standalone.

use std::sync::Arc;

use blockflow_daemon::config::DaemonConfig;
use blockflow_daemon::core::events::RecordingEventBus;
use blockflow_daemon::core::flow_handler::{self, FlowHandler};
use blockflow_daemon::core::mempool::SimpleMempool;
use clap::Parser;
use log::info;
use tokio::sync::mpsc;

const COMMAND_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = DaemonConfig::parse();
    if let Err(err) = config.validate() {
        eprintln!("invalid configuration: {err}");
        std::process::exit(1);
    }

    let broker = config.broker_info();
    info!(
        "starting blockflow-daemon: broker {}/{}, network {}, bind {}",
        broker.broker_id,
        broker.broker_num,
        config.network_id(),
        config.bind,
    );

    let handler = FlowHandler::new(
        broker.serviced_chains(),
        config.network_id(),
        config.status_size_limit,
        Arc::new(RecordingEventBus::new()),
        Box::new(SimpleMempool::new()),
    );

    let (_command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    flow_handler::run(handler, command_rx).await;
}
