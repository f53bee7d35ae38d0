use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use stakeup_deploy::{CONFIG_FILENAME, Preset, PresetParams};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "stakeup")]
#[command(
    author,
    version,
    about = "Deploy the staking contracts to an EVM network, one confirmed step at a time"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "STAKEUP_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the deployment plan against the configured network.
    Deploy(DeployArgs),
    /// Check the deployment plan against the compiled artifacts without sending anything.
    Plan(PlanArgs),
    /// Write a configuration file for one of the built-in deployments.
    Init(InitArgs),
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    /// Path to the configuration file, or to a directory containing Stakeup.toml.
    ///
    /// If not provided, ./Stakeup.toml is used when it exists. Relative `artifacts` and
    /// `records` paths in the file are resolved against the file's directory.
    #[arg(short, long, alias = "conf", env = "STAKEUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// The URL of the JSON-RPC endpoint. Overrides `network.rpc_url`.
    #[arg(long, alias = "rpc")]
    pub rpc_url: Option<String>,

    /// The account signing the creations. Defaults to the first account of the node.
    #[arg(long)]
    pub from: Option<Address>,

    /// Directory containing the compiled contract artifacts, relative to the working directory.
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// Name of the target network, used to organize deployment records.
    #[arg(short, long)]
    pub network_name: Option<String>,

    /// Directory where deployment records are written.
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Do not write a deployment record.
    #[arg(long, default_value_t = false)]
    pub no_record: bool,
}

#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    /// Path to the configuration file, or to a directory containing Stakeup.toml.
    ///
    /// Relative `artifacts` paths in the file are resolved against the file's directory.
    #[arg(short, long, alias = "conf", env = "STAKEUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory containing the compiled contract artifacts, relative to the working directory.
    #[arg(long)]
    pub artifacts: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct InitArgs {
    /// The built-in deployment to write.
    #[arg(short, long, default_value_t = Preset::default())]
    pub preset: Preset,

    /// Where to write the configuration.
    #[arg(short, long, default_value = CONFIG_FILENAME)]
    pub output: PathBuf,

    /// Overwrite the output file if it already exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Existing token contract (staking-reward-pool).
    #[arg(long)]
    pub token: Option<Address>,

    /// Unix timestamp at which staking starts (staking-reward-pool).
    #[arg(long)]
    pub start_time: Option<u64>,

    /// Staking duration in blocks (sbc-staking, waka-staking).
    #[arg(long)]
    pub duration_blocks: Option<u64>,

    /// Reward per block in token wei, e.g. `7e16` (sbc-staking, waka-staking).
    #[arg(long)]
    pub reward_per_block: Option<String>,
}

impl InitArgs {
    /// Preset parameters, with defaults for everything not given on the command line.
    pub fn params(&self) -> PresetParams {
        let defaults = PresetParams::default();
        PresetParams {
            token: self.token.unwrap_or(defaults.token),
            start_timestamp: self.start_time.unwrap_or(defaults.start_timestamp),
            duration_blocks: self.duration_blocks.unwrap_or(defaults.duration_blocks),
            reward_per_block: self
                .reward_per_block
                .clone()
                .unwrap_or(defaults.reward_per_block),
        }
    }
}
