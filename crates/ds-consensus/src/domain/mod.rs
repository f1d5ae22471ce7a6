//! Domain layer for the consensus engine
//!
//! Pure chain logic with no I/O of its own:
//! - chained_header / tree: the header arena and ancestor queries
//! - pow: compact targets, work and retargeting
//! - deployment: version-bits state machine
//! - selector: most-work tip selection
//! - reorg: atomic tip switches through the storage port

mod chained_header;
mod deployment;
mod error;
mod params;
mod pow;
mod reorg;
mod selector;
mod tree;

pub use chained_header::*;
pub use deployment::*;
pub use error::*;
pub use params::*;
pub use pow::*;
pub use reorg::*;
pub use selector::*;
pub use tree::*;
