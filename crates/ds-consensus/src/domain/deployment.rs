//! # Version-Bits Deployments
//!
//! Soft-fork activation by miner signalling, one generic evaluator driven by
//! [`DeploymentDefinition`] data.
//!
//! ## State Machine
//!
//! ```text
//!   Defined ──start reached──► Started ──threshold met──► LockedIn ──► Active
//!      │                          │
//!      └──────timeout─────────────┴──────────────────────► Failed
//! ```
//!
//! States change only at window boundaries (the last header of each window
//! of `W` headers). The state stored on a header is the state that governs
//! its children.

use super::chained_header::ChainedHeader;
use super::error::{ConsensusError, ConsensusResult};
use super::tree::{median, ChainedHeaderTree};
use serde::{Deserialize, Serialize};
use shared_types::BlockHeader;

/// Top three version bits marking a version-bits header.
pub const VERSIONBITS_TOP_MASK: u32 = 0xE000_0000;
pub const VERSIONBITS_TOP_BITS: u32 = 0x2000_0000;

/// Activation state of one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdState {
    Defined,
    Started,
    LockedIn,
    Active,
    Failed,
}

impl ThresholdState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Active | Self::Failed)
    }
}

/// When signalling may start and when it gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeploymentSchedule {
    /// Compared against the boundary header's median time past.
    MedianTime { start: u64, timeout: u64 },
    /// Compared against the first height the next window governs.
    Height { start: u64, timeout: u64 },
}

/// A soft-fork deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDefinition {
    pub id: String,
    /// Version bit (0..=28).
    pub bit: u8,
    /// Window length `W`.
    pub window: u64,
    /// Signalling headers per window needed to lock in.
    pub threshold: u64,
    pub schedule: DeploymentSchedule,
}

impl DeploymentDefinition {
    pub fn new(id: impl Into<String>, bit: u8, window: u64, threshold: u64, schedule: DeploymentSchedule) -> Self {
        Self {
            id: id.into(),
            bit,
            window: window.max(1),
            threshold,
            schedule,
        }
    }

    /// Whether `header` signals readiness for this deployment.
    pub fn is_signalled_by(&self, header: &BlockHeader) -> bool {
        header.version & VERSIONBITS_TOP_MASK == VERSIONBITS_TOP_BITS
            && (header.version >> self.bit) & 1 == 1
    }

    /// Whether a header at `height` closes a window.
    pub fn is_boundary(&self, height: u64) -> bool {
        (height + 1) % self.window == 0
    }

    fn progress(&self, boundary_height: u64, median_time_past: u64) -> (bool, bool) {
        match self.schedule {
            DeploymentSchedule::MedianTime { start, timeout } => {
                (median_time_past >= start, median_time_past >= timeout)
            }
            DeploymentSchedule::Height { start, timeout } => {
                let governed = boundary_height + 1;
                (governed >= start, governed >= timeout)
            }
        }
    }
}

/// Signalling statistics for the window in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStats {
    pub state: ThresholdState,
    pub period: u64,
    pub threshold: u64,
    /// Headers of the current window seen so far.
    pub elapsed: u64,
    /// Signalling headers among them.
    pub count: u64,
    /// Whether the threshold can still be reached in this window.
    pub possible: bool,
}

/// Evaluates every configured deployment for new headers.
#[derive(Debug, Clone, Default)]
pub struct DeploymentTracker {
    deployments: Vec<DeploymentDefinition>,
    median_time_span: usize,
}

impl DeploymentTracker {
    pub fn new(deployments: Vec<DeploymentDefinition>, median_time_span: usize) -> Self {
        Self {
            deployments,
            median_time_span: median_time_span.max(1),
        }
    }

    pub fn deployments(&self) -> &[DeploymentDefinition] {
        &self.deployments
    }

    pub fn index_of(&self, id: &str) -> ConsensusResult<usize> {
        self.deployments
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| ConsensusError::UnknownDeployment(id.to_string()))
    }

    /// States for the genesis header.
    pub fn genesis_states(&self) -> Vec<ThresholdState> {
        vec![ThresholdState::Defined; self.deployments.len()]
    }

    /// State of deployment `id` governing the children of `header`.
    pub fn get_state(&self, id: &str, header: &ChainedHeader) -> ConsensusResult<ThresholdState> {
        let index = self.index_of(id)?;
        Ok(header
            .deployment_state(index)
            .unwrap_or(ThresholdState::Defined))
    }

    /// Ids of deployments that are active for the children of `parent`.
    pub fn active_for_child(&self, parent: &ChainedHeader) -> Vec<&str> {
        self.deployments
            .iter()
            .enumerate()
            .filter(|(i, _)| parent.deployment_state(*i) == Some(ThresholdState::Active))
            .map(|(_, d)| d.id.as_str())
            .collect()
    }

    /// Compute the memoized states of `child`, about to be linked under `parent`.
    pub fn states_for_child(
        &self,
        tree: &ChainedHeaderTree,
        parent: &ChainedHeader,
        child: &BlockHeader,
    ) -> ConsensusResult<Vec<ThresholdState>> {
        let height = parent.height() + 1;
        let mut median_time_past = None;

        let mut states = Vec::with_capacity(self.deployments.len());
        for (index, deployment) in self.deployments.iter().enumerate() {
            let previous = parent
                .deployment_state(index)
                .unwrap_or(ThresholdState::Defined);
            if previous.is_terminal() || !deployment.is_boundary(height) {
                states.push(previous);
                continue;
            }

            let mtp = match median_time_past {
                Some(mtp) => mtp,
                None => {
                    let mut times = tree.recent_timestamps(&parent.hash(), self.median_time_span.saturating_sub(1))?;
                    times.push(child.timestamp);
                    let mtp = median(times);
                    median_time_past = Some(mtp);
                    mtp
                }
            };
            let (start_reached, timed_out) = deployment.progress(height, mtp);

            let next = match previous {
                ThresholdState::Defined if timed_out => ThresholdState::Failed,
                ThresholdState::Defined if start_reached => ThresholdState::Started,
                ThresholdState::Defined => ThresholdState::Defined,
                ThresholdState::Started => {
                    let count = self.count_signalling(tree, deployment, parent, child)?;
                    if count >= deployment.threshold {
                        ThresholdState::LockedIn
                    } else if timed_out {
                        ThresholdState::Failed
                    } else {
                        ThresholdState::Started
                    }
                }
                ThresholdState::LockedIn => ThresholdState::Active,
                terminal => terminal,
            };

            if next != previous {
                tracing::info!(
                    deployment = %deployment.id,
                    height,
                    from = ?previous,
                    to = ?next,
                    "Deployment state transition"
                );
            }
            states.push(next);
        }
        Ok(states)
    }

    /// Signalling statistics for the window in progress at `header`.
    pub fn statistics(
        &self,
        tree: &ChainedHeaderTree,
        id: &str,
        header: &ChainedHeader,
    ) -> ConsensusResult<DeploymentStats> {
        let index = self.index_of(id)?;
        let deployment = &self.deployments[index];
        let state = header
            .deployment_state(index)
            .unwrap_or(ThresholdState::Defined);

        let elapsed = (header.height() + 1) % deployment.window;
        let mut count = 0;
        let mut cursor = tree.get(&header.hash());
        for _ in 0..elapsed {
            let Some(current) = cursor else { break };
            if deployment.is_signalled_by(current.header()) {
                count += 1;
            }
            cursor = tree.get(&current.parent_hash());
        }

        Ok(DeploymentStats {
            state,
            period: deployment.window,
            threshold: deployment.threshold,
            elapsed,
            count,
            possible: count + (deployment.window - elapsed) >= deployment.threshold,
        })
    }

    /// Count signals in the window closed by `child`.
    fn count_signalling(
        &self,
        tree: &ChainedHeaderTree,
        deployment: &DeploymentDefinition,
        parent: &ChainedHeader,
        child: &BlockHeader,
    ) -> ConsensusResult<u64> {
        let mut count = u64::from(deployment.is_signalled_by(child));
        let mut hash = parent.hash();
        for _ in 1..deployment.window {
            let current = tree
                .get(&hash)
                .ok_or(ConsensusError::UnknownHeader(hash))?;
            if deployment.is_signalled_by(current.header()) {
                count += 1;
            }
            if current.is_genesis() {
                break;
            }
            hash = current.parent_hash();
        }
        Ok(count)
    }
}
