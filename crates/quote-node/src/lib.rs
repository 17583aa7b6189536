//! Quote Node
//!
//! Command line, configuration and runtime wiring of a cluster member.

pub mod cli;
pub mod config;
pub mod runtime;

pub use cli::Cli;
pub use config::{NodeConfig, ServerConfig};
pub use runtime::QuoteNode;
