//! # Integration Scenarios
//!
//! Whole-engine tests driven only through the public `ConsensusApi`.

mod deployments;
mod ordering;
mod reorg;
mod storage;
