//! Layered deployment configuration.
//!
//! Values are resolved in order: built-in defaults, the TOML configuration file, then
//! `STAKEUP_`-prefixed environment variables (nested keys separated by `__`, e.g.
//! `STAKEUP_NETWORK__RPC_URL`). Command-line flags are applied on top by the binary.
//!
//! Relative `artifacts` and `records` paths written in a configuration file are relative
//! to the directory containing that file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    Figment, Source,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{DeploymentPlan, DeploymentStep, NetworkConfig};

/// The default name for the stakeup configuration file.
pub const CONFIG_FILENAME: &str = "Stakeup.toml";

/// Prefix of the environment variables overriding configuration values.
pub const ENV_PREFIX: &str = "STAKEUP_";

/// Everything needed to run a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Name of the target network, used to organize deployment records.
    pub network_name: String,
    /// Directory containing the compiled contract artifacts.
    pub artifacts: PathBuf,
    /// Directory where deployment records are written.
    pub records: PathBuf,
    /// Network provider configuration.
    pub network: NetworkConfig,
    /// The deployment plan, in execution order.
    #[serde(default)]
    pub steps: Vec<DeploymentStep>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            network_name: "localhost".to_string(),
            artifacts: PathBuf::from("artifacts"),
            records: PathBuf::from("deployments"),
            network: NetworkConfig::default(),
            steps: Vec::new(),
        }
    }
}

impl DeployConfig {
    /// Resolve the configuration from defaults, a TOML file and the environment.
    ///
    /// `path` may point at a file or at a directory containing [`CONFIG_FILENAME`].
    /// Without a path, `./Stakeup.toml` is used when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file or directory not found: {}",
                        path.display()
                    );
                }
                Some(if path.is_dir() {
                    path.join(CONFIG_FILENAME)
                } else {
                    path.to_path_buf()
                })
            }
            None => Some(PathBuf::from(CONFIG_FILENAME)).filter(|p| p.exists()),
        };

        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_path) = &config_path {
            figment = figment.merge(Toml::file(config_path));
        }

        let figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        let mut config: Self = figment
            .extract()
            .context("Failed to resolve deployment configuration")?;

        config.artifacts = relative_to_source(&figment, "artifacts", config.artifacts);
        config.records = relative_to_source(&figment, "records", config.records);

        match &config_path {
            Some(path) => tracing::debug!(path = %path.display(), "Configuration loaded"),
            None => tracing::debug!("No configuration file found, using defaults"),
        }

        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Build and validate the deployment plan described by this configuration.
    pub fn plan(&self) -> Result<DeploymentPlan> {
        DeploymentPlan::new(self.steps.clone()).context("Invalid deployment plan")
    }
}

/// Resolve a relative path read from a configuration file against that file's directory.
///
/// Paths set by defaults or environment variables stay relative to the working directory.
fn relative_to_source(figment: &Figment, key: &str, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }

    match figment.find_metadata(key).and_then(|m| m.source.as_ref()) {
        Some(Source::File(file)) => match file.parent() {
            Some(dir) => dir.join(path),
            None => path,
        },
        _ => path,
    }
}
