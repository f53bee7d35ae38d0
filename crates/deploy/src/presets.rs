//! Built-in plans for the known staking deployments.

use alloy_core::primitives::{Address, address};
use serde::{Deserialize, Serialize};

use crate::{DeployConfig, DeploymentStep, StepArg};

/// Token used by the reward pool deployment on BSC.
pub const DEFAULT_TOKEN: Address = address!("acD09f2a5F1612522c632bA4b1E515f6296ec506");
/// Staking start time (2022-06-02 06:40:00 UTC).
pub const DEFAULT_START_TIMESTAMP: u64 = 1654152000;
/// Staking duration, in blocks.
pub const DEFAULT_DURATION_BLOCKS: u64 = 26_400_000;
/// Reward per block, in token wei (0.07 tokens).
pub const DEFAULT_REWARD_PER_BLOCK: &str = "7e16";

/// A built-in deployment plan.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// `TokenStaking(token, startTime)` then `RewardPool(tokenStaking, token)`.
    #[default]
    StakingRewardPool,
    /// `SBCToken()` then `TokenStaking(sbcToken, durationBlocks, rewardPerBlock)`.
    SbcStaking,
    /// `WakaToken()` then `TokenStaking(wakaToken, durationBlocks, rewardPerBlock)`.
    WakaStaking,
}

/// Values substituted into a preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetParams {
    /// Existing token contract (reward pool preset).
    pub token: Address,
    /// Unix timestamp at which staking starts (reward pool preset).
    pub start_timestamp: u64,
    /// Staking duration in blocks (token presets).
    pub duration_blocks: u64,
    /// Reward distributed per block (token presets).
    pub reward_per_block: String,
}

impl Default for PresetParams {
    fn default() -> Self {
        Self {
            token: DEFAULT_TOKEN,
            start_timestamp: DEFAULT_START_TIMESTAMP,
            duration_blocks: DEFAULT_DURATION_BLOCKS,
            reward_per_block: DEFAULT_REWARD_PER_BLOCK.to_string(),
        }
    }
}

impl Preset {
    /// The ordered steps of this preset.
    pub fn steps(&self, params: &PresetParams) -> Vec<DeploymentStep> {
        match self {
            Preset::StakingRewardPool => vec![
                DeploymentStep::new("tokenStaking", "TokenStaking")
                    .arg(StepArg::literal(params.token.to_checksum(None)))
                    .arg(StepArg::literal(params.start_timestamp)),
                DeploymentStep::new("rewardPool", "RewardPool")
                    .arg(StepArg::step("tokenStaking"))
                    .arg(StepArg::literal(params.token.to_checksum(None))),
            ],
            Preset::SbcStaking => Self::token_staking("sbcToken", "SBCToken", params),
            Preset::WakaStaking => Self::token_staking("wakaToken", "WakaToken", params),
        }
    }

    fn token_staking(step: &str, token: &str, params: &PresetParams) -> Vec<DeploymentStep> {
        vec![
            DeploymentStep::new(step, token),
            DeploymentStep::new("tokenStaking", "TokenStaking")
                .arg(StepArg::step(step))
                .arg(StepArg::literal(params.duration_blocks))
                .arg(StepArg::literal(&params.reward_per_block)),
        ]
    }

    /// A full configuration running this preset with default network settings.
    pub fn config(&self, params: &PresetParams) -> DeployConfig {
        DeployConfig {
            steps: self.steps(params),
            ..Default::default()
        }
    }
}
