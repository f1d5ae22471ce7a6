//! Deployment rule adapters.

use crate::ports::DeploymentRules;
use shared_types::BlockHeader;

/// Enforces nothing. Rules of individual deployments live with the script
/// and transaction engines.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDeploymentRules;

impl DeploymentRules for NoDeploymentRules {
    fn check(&self, _header: &BlockHeader, _active: &[&str]) -> Result<(), String> {
        Ok(())
    }
}

/// Requires headers to carry at least `min_version` once `deployment` is
/// active (BIP34-style version bump).
#[derive(Debug, Clone)]
pub struct MinimumVersionRule {
    pub deployment: String,
    pub min_version: u32,
}

impl DeploymentRules for MinimumVersionRule {
    fn check(&self, header: &BlockHeader, active: &[&str]) -> Result<(), String> {
        if active.contains(&self.deployment.as_str()) && header.version < self.min_version {
            return Err(format!(
                "version {} below {} required by {}",
                header.version, self.min_version, self.deployment
            ));
        }
        Ok(())
    }
}
