use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "quote-node",
    about = "Quote ingestion node with leader election",
    version = env!("CARGO_PKG_VERSION"),
    long_about = "Runs one cluster member: elects a leader among the configured peers, \
                  fetches quotes on followers and persists them once on the leader."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "QUOTE_NODE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[arg(short, long, value_name = "ADDR", env = "QUOTE_NODE_BIND")]
    pub bind: Option<String>,

    /// Advertised host:port identifying this node
    #[arg(long, value_name = "ID", env = "QUOTE_NODE_ID")]
    pub node_id: Option<String>,

    /// Comma separated host:port list of cluster members
    #[arg(long, value_name = "CSV", env = "QUOTE_NODE_PEERS")]
    pub peers: Option<String>,

    /// Ticker to fetch
    #[arg(short, long, env = "QUOTE_TICKER")]
    pub ticker: Option<String>,

    /// Quote provider (brapi, stockdata)
    #[arg(short, long, env = "QUOTE_API")]
    pub api: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
