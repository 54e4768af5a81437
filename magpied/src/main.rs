//! magpied: a parametric Bitcoin-family full node.
//!
//! Connects to a coin's peer-to-peer network, syncs headers-first,
//! downloads and script-verifies block bodies, and maintains a queryable
//! UTXO database under the data directory.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use magpie_chain::parameters::Coin;
use magpie_network::node::Node;

#[derive(Parser, Debug)]
#[command(name = "magpied", version, about = "A parametric Bitcoin-family full node")]
struct Args {
    /// Directory for chain databases.
    #[arg(long, default_value = "magpie-data")]
    data_dir: PathBuf,

    /// Listen address for inbound peers; omit to stay outbound-only.
    #[arg(long)]
    address: Option<SocketAddr>,

    /// How many outbound peers to maintain.
    #[arg(long, default_value_t = 16)]
    seek_peers: usize,

    /// Hard cap on simultaneous connections.
    #[arg(long, default_value_t = 125)]
    max_peers: usize,

    /// Disable DNS-seed bootstrapping (rely on the address book only).
    #[arg(long)]
    no_bootstrap: bool,

    /// Which coin to run ("bitcoin" or "litecoin").
    #[arg(long, default_value = "bitcoin")]
    coin: String,

    /// Log filter, e.g. "info" or "magpie_network=debug,info".
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&args.log)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let coin = match Coin::from_name(&args.coin) {
        Some(coin) => coin,
        None => {
            error!(coin = %args.coin, "unknown coin");
            return ExitCode::FAILURE;
        }
    };

    let network_config = magpie_network::Config {
        listen_addr: args.address,
        seek_peers: args.seek_peers,
        max_peers: args.max_peers,
        bootstrap: !args.no_bootstrap,
        user_agent: None,
    };
    let state_config = magpie_state::Config::with_data_dir(args.data_dir);

    let node = match Node::new(coin, network_config, state_config) {
        Ok(node) => node,
        Err(error) => {
            error!(%error, "failed to open node state");
            return ExitCode::FAILURE;
        }
    };

    info!(coin = coin.name, "starting magpied");
    match node.serve_forever().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "node stopped");
            ExitCode::FAILURE
        }
    }
}
