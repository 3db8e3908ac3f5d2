#![forbid(unsafe_code)]

use std::net::SocketAddr;

use clap::Parser;
use enip_server_lib::config::{DelaySpec, ServerConfig, TagSpec};
use enip_server_lib::{init_tracing, server};
use tracing::error;

/// EtherNet/IP server simulating a Logix-style industrial controller.
#[derive(Parser, Debug)]
#[command(author, version, about = "ENIP/CIP server simulator")]
struct Cli {
    /// Interface:port to listen on for ENIP/CIP traffic.
    #[arg(short, long, default_value = "0.0.0.0:44818")]
    address: SocketAddr,

    /// Artificial response delay: a fixed number of seconds, or a "lo-hi" range.
    #[arg(short, long, default_value = "0")]
    delay: DelaySpec,

    /// Interface:port for the optional HTTP control plane. Disabled by default.
    #[arg(short, long)]
    control_address: Option<SocketAddr>,

    /// Tag definitions, each NAME=TYPE[SIZE] (TYPE in SINT|INT|DINT, default INT[1]).
    #[arg(value_name = "NAME=TYPE[SIZE]")]
    tags: Vec<TagSpec>,

    /// Increase log verbosity (info -> debug).
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "info" });

    let config = ServerConfig {
        address: cli.address,
        control_address: cli.control_address,
        tags: cli.tags,
        delay: cli.delay,
    };

    if let Err(err) = enip_server_lib::config::validate(&config) {
        error!(%err, "invalid configuration");
        std::process::exit(1);
    }

    if let Err(err) = server::run(config).await {
        error!(%err, "enip server exited with error");
        std::process::exit(1);
    }
}
