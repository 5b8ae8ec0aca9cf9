use std::path::PathBuf;

use clap::Parser;
use rudis::config::Config;
use rudis::{server, Error};

#[derive(Parser, Debug)]
#[command(name = "rudis-server", version, about)]
struct Args {
    /// Path to a TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// The port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of logical databases
    #[arg(long)]
    databases: Option<usize>,

    /// Enable append-only-file persistence
    #[arg(long)]
    appendonly: bool,

    /// Append-only file path
    #[arg(long)]
    appendfilename: Option<String>,

    /// This node's advertised address; enables cluster mode with --peers
    #[arg(long = "self")]
    self_addr: Option<String>,

    /// Comma-separated peer addresses
    #[arg(long, value_delimiter = ',')]
    peers: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(databases) = args.databases {
        config.databases = databases;
    }
    if args.appendonly {
        config.appendonly = true;
    }
    if let Some(appendfilename) = args.appendfilename {
        config.appendfilename = appendfilename;
    }
    if let Some(self_addr) = args.self_addr {
        config.self_addr = self_addr;
    }
    if let Some(peers) = args.peers {
        config.peers = peers;
    }

    server::run(config).await
}
