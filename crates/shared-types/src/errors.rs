//! # Error Types
//!
//! Defines error types shared between the engine and its collaborators.

use thiserror::Error;

/// Errors reported by the block/UTXO storage engine.
///
/// The consensus engine never inspects these beyond their display form;
/// any of them aborts the current operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Block data not found in storage.
    #[error("Block not found: {0}")]
    NotFound(String),

    /// The block's transactions failed validation against the UTXO state
    /// (for example a double spend).
    #[error("Block {block_hash} rejected by state: {reason}")]
    RejectedByState { block_hash: String, reason: String },

    /// Data corruption detected during read.
    #[error("Data corruption: checksum mismatch for block {block_hash}")]
    DataCorruption { block_hash: String },

    /// Disk space below required threshold.
    #[error("Disk full: only {available_percent}% available")]
    DiskFull { available_percent: u8 },

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),
}
