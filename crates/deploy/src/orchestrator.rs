//! Sequential execution of a deployment plan.
//!
//! The orchestrator moves through `Idle -> Running(0) -> ... -> Running(n-1)` and ends
//! in either `Succeeded` or `Failed`. A failed step is never retried and contracts
//! created by earlier steps stay deployed.

use std::fmt;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256},
};
use anyhow::{Context, Result};

use crate::{
    ArtifactResolver, DeploymentPlan, DeploymentStep, Network, StepArg,
    abi::{self, ArgInput},
};

/// A contract created by one step of the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployedContract {
    /// Name of the step that created the contract.
    pub step: String,
    /// Label printed for the step.
    pub label: String,
    /// Contract artifact name.
    pub contract: String,
    /// Address of the contract.
    pub address: Address,
    /// Creation transaction hash.
    pub tx_hash: B256,
    /// Block in which the contract was created.
    pub block_number: u64,
    /// Gas used by the creation.
    pub gas_used: u64,
    /// Constructor arguments, after step references were resolved.
    pub args: Vec<DynSolValue>,
}

/// Outcome of a fully successful run.
#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub chain_id: u64,
    pub deployer: Address,
    /// Deployed contracts, in plan order.
    pub contracts: Vec<DeployedContract>,
}

impl DeploymentReport {
    /// The contract created by the step named `step`.
    pub fn contract(&self, step: &str) -> Option<&DeployedContract> {
        self.contracts.iter().find(|c| c.step == step)
    }
}

/// Where a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePoint {
    /// Querying the provider for the chain ID or the signer account failed.
    Provider,
    /// The step at `index` (zero-based) failed.
    Step { index: usize, name: String },
}

/// A run that stopped before every step completed.
#[derive(Debug)]
pub struct DeploymentFailure {
    pub at: FailurePoint,
    pub chain_id: Option<u64>,
    pub deployer: Option<Address>,
    /// Contracts deployed before the failure. They remain on-chain.
    pub completed: Vec<DeployedContract>,
    pub cause: anyhow::Error,
}

impl fmt::Display for DeploymentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.at {
            FailurePoint::Provider => write!(
                f,
                "Failed to query the network provider for the chain ID and signer account"
            ),
            FailurePoint::Step { index, name } => write!(
                f,
                "Deployment aborted at step {} ('{}') with {} contract(s) already deployed",
                index + 1,
                name,
                self.completed.len()
            ),
        }
    }
}

impl std::error::Error for DeploymentFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.cause)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running { step: usize },
    Succeeded,
    Failed,
}

/// Runs a [`DeploymentPlan`] against a [`Network`], one step at a time.
pub struct Orchestrator<'a, N, A> {
    network: &'a N,
    artifacts: &'a A,
    state: RunState,
}

impl<'a, N, A> Orchestrator<'a, N, A>
where
    N: Network,
    A: ArtifactResolver,
{
    pub fn new(network: &'a N, artifacts: &'a A) -> Self {
        Self {
            network,
            artifacts,
            state: RunState::Idle,
        }
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "Deployment state transition");
        self.state = next;
    }

    /// Execute every step of `plan` in order.
    ///
    /// Each step starts only after the previous one is confirmed. The first failure
    /// aborts the run and is returned together with the contracts deployed so far.
    pub async fn execute(
        mut self,
        plan: &DeploymentPlan,
    ) -> Result<DeploymentReport, DeploymentFailure> {
        let (chain_id, deployer) = match self.provider_info().await {
            Ok(info) => info,
            Err(cause) => {
                self.transition(RunState::Failed);
                tracing::error!(error = ?cause, "Failed to query the network provider");
                return Err(DeploymentFailure {
                    at: FailurePoint::Provider,
                    chain_id: None,
                    deployer: None,
                    completed: Vec::new(),
                    cause,
                });
            }
        };

        tracing::info!(
            chain_id,
            steps = plan.len(),
            "Deploying contracts with address: {}",
            deployer
        );

        let mut completed: Vec<DeployedContract> = Vec::with_capacity(plan.len());

        for (index, step) in plan.iter().enumerate() {
            self.transition(RunState::Running { step: index });

            match self.deploy_step(deployer, step, &completed).await {
                Ok(contract) => {
                    tracing::info!(
                        step = %step.name,
                        tx_hash = %contract.tx_hash,
                        block = contract.block_number,
                        "{} contract deployed at {}",
                        contract.label,
                        contract.address
                    );
                    completed.push(contract);
                }
                Err(cause) => {
                    self.transition(RunState::Failed);
                    tracing::error!(
                        step = %step.name,
                        index,
                        deployed = completed.len(),
                        error = ?cause,
                        "Deployment step failed, aborting"
                    );
                    return Err(DeploymentFailure {
                        at: FailurePoint::Step {
                            index,
                            name: step.name.clone(),
                        },
                        chain_id: Some(chain_id),
                        deployer: Some(deployer),
                        completed,
                        cause,
                    });
                }
            }
        }

        self.transition(RunState::Succeeded);

        Ok(DeploymentReport {
            chain_id,
            deployer,
            contracts: completed,
        })
    }

    async fn provider_info(&self) -> Result<(u64, Address)> {
        let chain_id = self.network.chain_id().await?;
        let deployer = self.network.signer().await?;
        Ok((chain_id, deployer))
    }

    async fn deploy_step(
        &self,
        deployer: Address,
        step: &DeploymentStep,
        completed: &[DeployedContract],
    ) -> Result<DeployedContract> {
        let artifact = self.artifacts.resolve(&step.contract)?;
        let inputs = artifact.constructor_inputs()?;

        let resolved = step
            .args
            .iter()
            .map(|arg| match arg {
                StepArg::Literal(raw) => Ok(ArgInput::Literal(raw.as_str())),
                StepArg::StepAddress(name) => completed
                    .iter()
                    .find(|c| c.step == *name)
                    .map(|c| ArgInput::Address(c.address))
                    .with_context(|| format!("Step '{}' has not been deployed", name)),
            })
            .collect::<Result<Vec<_>>>()?;

        let args = abi::coerce_args(&inputs, &resolved)
            .with_context(|| format!("Invalid arguments for {}", step.contract))?;
        let init_code = artifact.init_code(&args);

        tracing::debug!(
            step = %step.name,
            contract = %step.contract,
            args = ?args.iter().map(abi::format_value).collect::<Vec<_>>(),
            init_code_len = init_code.len(),
            "Submitting contract creation"
        );

        let receipt = self
            .network
            .create_contract(deployer, init_code)
            .await
            .with_context(|| format!("Failed to deploy {}", step.contract))?;

        Ok(DeployedContract {
            step: step.name.clone(),
            label: step.display_label().to_string(),
            contract: step.contract.clone(),
            address: receipt.address,
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            args,
        })
    }
}

/// Offline view of a step: what would be sent, without touching the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPreview {
    pub name: String,
    pub label: String,
    pub contract: String,
    /// Arguments as written, references shown as `@step`.
    pub args: Vec<String>,
    /// Size of the creation payload in bytes.
    pub init_code_len: usize,
}

/// Check every step of `plan` against its artifact without deploying anything.
///
/// References are encoded with a placeholder address, so this validates artifact
/// lookup, argument counts and literal types.
pub fn preview<A: ArtifactResolver>(plan: &DeploymentPlan, artifacts: &A) -> Result<Vec<StepPreview>> {
    plan.iter()
        .map(|step| {
            let artifact = artifacts.resolve(&step.contract)?;
            let inputs = artifact.constructor_inputs()?;
            let resolved = step
                .args
                .iter()
                .map(|arg| match arg {
                    StepArg::Literal(raw) => ArgInput::Literal(raw.as_str()),
                    StepArg::StepAddress(_) => ArgInput::Address(Address::ZERO),
                })
                .collect::<Vec<_>>();
            let args = abi::coerce_args(&inputs, &resolved)
                .with_context(|| format!("Invalid arguments for step '{}'", step.name))?;

            Ok(StepPreview {
                name: step.name.clone(),
                label: step.display_label().to_string(),
                contract: step.contract.clone(),
                args: step.args.iter().map(ToString::to_string).collect(),
                init_code_len: artifact.init_code(&args).len(),
            })
        })
        .collect()
}
