//! Adapters layer (Hexagonal Architecture)
//!
//! Concrete implementations of the outbound ports.

mod peer_manager;
mod proof;
mod rules;
mod storage;

pub use peer_manager::*;
pub use proof::*;
pub use rules::*;
pub use storage::*;
