//! # Node Runtime Library
//!
//! Wiring between the consensus engine and the rest of the node. The main
//! entry point is the `main.rs` binary; the modules are exposed for tests.
//!
//! - `config` - `DS_*` environment configuration
//! - `worker` - single-writer inbound submission queue

pub mod config;
pub mod worker;

pub use config::{ConfigError, NodeConfig};
pub use worker::{Inbound, InboundHandle, InboundWorker, WorkerError};
