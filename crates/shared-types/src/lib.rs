//! # Shared Types Crate
//!
//! Chain entities and collaborator error types shared by every crate in the
//! workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: headers, blocks and peer identities are
//!   defined once, here.
//! - **No wire formats**: decoding from bytes belongs to the codec
//!   collaborator; these are already-parsed values.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
