use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    DeployedContract, DeploymentFailure, DeploymentPlan, DeploymentReport, DeploymentStep,
    FailurePoint, abi,
};

/// Records sharing a timestamp get a numeric suffix, up to this many files.
const MAX_NAME_ATTEMPTS: usize = 100;

/// The inputs that define what a run deploys.
///
/// Two runs with the same fingerprint hash submitted the same creations (same contracts,
/// same argument bindings) to the same named network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanFingerprint<'a> {
    pub network_name: &'a str,
    pub steps: &'a [DeploymentStep],
}

impl<'a> PlanFingerprint<'a> {
    pub fn new(network_name: &'a str, plan: &'a DeploymentPlan) -> Self {
        Self {
            network_name,
            steps: plan.steps(),
        }
    }

    /// Compute a SHA-256 hash of this fingerprint.
    ///
    /// The hash is deterministic: the same plan always produces the same hash.
    pub fn compute_hash(&self) -> Result<String> {
        let json = serde_json::to_string(self).context("Failed to serialize plan fingerprint")?;

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());

        Ok(hex::encode(hasher.finalize()))
    }
}

/// A deployed contract as written to a deployment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedContract {
    pub step: String,
    pub label: String,
    pub contract: String,
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    pub args: Vec<String>,
}

impl From<&DeployedContract> for RecordedContract {
    fn from(contract: &DeployedContract) -> Self {
        Self {
            step: contract.step.clone(),
            label: contract.label.clone(),
            contract: contract.contract.clone(),
            address: contract.address,
            tx_hash: contract.tx_hash,
            block_number: contract.block_number,
            gas_used: contract.gas_used,
            args: contract.args.iter().map(abi::format_value).collect(),
        }
    }
}

/// How a recorded run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Succeeded,
    Failed {
        /// Step that failed, if the run got past the signer lookup.
        step: Option<String>,
        error: String,
    },
}

/// Description of one deployment run, written once the run ends.
///
/// Records are saved as `{records}/{network_name}/{created_at}.json`. They are output
/// for operators and are never read back to alter a later run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// SHA-256 hash of the plan fingerprint.
    pub plan_hash: String,
    pub network_name: String,
    pub chain_id: Option<u64>,
    pub deployer: Option<Address>,
    /// RFC 3339 UTC timestamp of the end of the run, in milliseconds.
    pub created_at: String,
    /// Version of stakeup that performed the run.
    pub tool_version: String,
    pub outcome: RecordOutcome,
    /// Contracts deployed by the run, in plan order.
    pub contracts: Vec<RecordedContract>,
}

impl DeploymentRecord {
    fn new(plan_hash: String, network_name: &str, outcome: RecordOutcome) -> Self {
        Self {
            plan_hash,
            network_name: network_name.to_string(),
            chain_id: None,
            deployer: None,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            outcome,
            contracts: Vec::new(),
        }
    }

    /// Record a successful run.
    pub fn from_report(plan_hash: String, network_name: &str, report: &DeploymentReport) -> Self {
        Self {
            chain_id: Some(report.chain_id),
            deployer: Some(report.deployer),
            contracts: report.contracts.iter().map(RecordedContract::from).collect(),
            ..Self::new(plan_hash, network_name, RecordOutcome::Succeeded)
        }
    }

    /// Record a failed run, including the contracts deployed before the failure.
    pub fn from_failure(
        plan_hash: String,
        network_name: &str,
        failure: &DeploymentFailure,
    ) -> Self {
        let step = match &failure.at {
            FailurePoint::Provider => None,
            FailurePoint::Step { name, .. } => Some(name.clone()),
        };

        Self {
            chain_id: failure.chain_id,
            deployer: failure.deployer,
            contracts: failure.completed.iter().map(RecordedContract::from).collect(),
            ..Self::new(
                plan_hash,
                network_name,
                RecordOutcome::Failed {
                    step,
                    error: format!("{:#}", failure.cause),
                },
            )
        }
    }

    /// Save the record under `records_dir`, returning the path written.
    ///
    /// Existing records are never overwritten: when a record with the same timestamp is
    /// already present, a numeric suffix is added to the file name.
    pub fn save_to_dir(&self, records_dir: &Path) -> Result<PathBuf> {
        let dir = records_dir.join(&self.network_name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create records directory {}", dir.display()))?;

        let json = self.to_json()?;
        let stem = self.created_at.replace(':', "");

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = match attempt {
                0 => dir.join(format!("{stem}.json")),
                n => dir.join(format!("{stem}-{n}.json")),
            };

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e).context(format!(
                        "Failed to create deployment record {}",
                        path.display()
                    ));
                }
            };

            file.write_all(json.as_bytes()).context(format!(
                "Failed to write deployment record to {}",
                path.display()
            ))?;

            return Ok(path);
        }

        anyhow::bail!(
            "Too many deployment records named {} in {}",
            stem,
            dir.display()
        )
    }

    /// Save this record to a file as formatted JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?).context(format!(
            "Failed to write deployment record to {}",
            path.display()
        ))?;

        Ok(())
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize deployment record")
    }

    /// Load a record from a file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Deployment record does not exist: {}", path.display());
        }

        let content = std::fs::read_to_string(path).context(format!(
            "Failed to read deployment record from {}",
            path.display()
        ))?;

        serde_json::from_str(&content).context("Failed to parse deployment record JSON")
    }
}
