//! stakeup-deploy - Deployment library for the staking contracts.
//!
//! This crate turns a [`DeploymentPlan`] (an ordered list of contract creations whose
//! constructor arguments may reference addresses produced by earlier steps) into
//! contracts on an EVM network, one confirmed creation at a time.

pub mod abi;

mod artifact;
pub use artifact::{ArtifactResolver, ArtifactStore, ContractArtifact};

mod config;
pub use config::{CONFIG_FILENAME, DeployConfig, ENV_PREFIX};

mod network;
pub use network::{CreationReceipt, JsonRpcNetwork, Network, NetworkConfig};

mod orchestrator;
pub use orchestrator::{
    DeployedContract, DeploymentFailure, DeploymentReport, FailurePoint, Orchestrator,
    StepPreview, preview,
};

mod plan;
pub use plan::{ArgValue, DeploymentPlan, DeploymentStep, StepArg};

mod presets;
pub use presets::{Preset, PresetParams};

mod record;
pub use record::{DeploymentRecord, PlanFingerprint, RecordOutcome, RecordedContract};

pub mod rpc;
