//! Orchestrator tests against an in-memory network.
//!
//! The network assigns sequential addresses to created contracts and can be told to
//! reject a given creation, so runs can be checked without a node.

use std::{
    collections::HashMap,
    io,
    path::Path,
    sync::{Arc, Mutex},
};

use alloy_core::{
    dyn_abi::DynSolValue,
    json_abi::JsonAbi,
    primitives::{Address, B256, Bytes, U256},
};
use anyhow::{Context, Result};
use stakeup_deploy::{
    ArtifactStore, ContractArtifact, CreationReceipt, DeploymentPlan, DeploymentStep,
    FailurePoint, Network, Orchestrator, Preset, PresetParams, StepArg, preview,
};
use tempdir::TempDir;

const TOKEN: &str = "0xacD09f2a5F1612522c632bA4b1E515f6296ec506";
const START_TIME: u64 = 1654152000;

const TOKEN_STAKING_ABI: &str = r#"[
    {"type":"constructor","stateMutability":"nonpayable","inputs":[
        {"name":"_token","type":"address","internalType":"contract IERC20"},
        {"name":"_startTime","type":"uint256","internalType":"uint256"}
    ]},
    {"type":"function","name":"stake","stateMutability":"nonpayable","inputs":[{"name":"amount","type":"uint256","internalType":"uint256"}],"outputs":[]}
]"#;

const REWARD_POOL_ABI: &str = r#"[
    {"type":"constructor","stateMutability":"nonpayable","inputs":[
        {"name":"_staking","type":"address","internalType":"address"},
        {"name":"_token","type":"address","internalType":"contract IERC20"}
    ]}
]"#;

/// Creation request received by the mock network.
#[derive(Debug, Clone)]
struct Creation {
    from: Address,
    init_code: Bytes,
}

struct MockNetwork {
    signer: Option<Address>,
    /// Zero-based index of the creation to reject.
    reject_at: Option<usize>,
    creations: Mutex<Vec<Creation>>,
}

impl MockNetwork {
    fn new() -> Self {
        Self {
            signer: Some(deployer()),
            reject_at: None,
            creations: Mutex::new(Vec::new()),
        }
    }

    fn rejecting_at(index: usize) -> Self {
        Self {
            reject_at: Some(index),
            ..Self::new()
        }
    }

    fn without_accounts() -> Self {
        Self {
            signer: None,
            ..Self::new()
        }
    }

    fn creations(&self) -> Vec<Creation> {
        self.creations.lock().unwrap().clone()
    }
}

impl Network for MockNetwork {
    async fn chain_id(&self) -> Result<u64> {
        Ok(31337)
    }

    async fn signer(&self) -> Result<Address> {
        self.signer.context("Provider exposes no accounts")
    }

    async fn create_contract(&self, from: Address, init_code: Bytes) -> Result<CreationReceipt> {
        let index = {
            let mut creations = self.creations.lock().unwrap();
            if self.reject_at == Some(creations.len()) {
                anyhow::bail!("RPC error: transaction rejected by network");
            }
            creations.push(Creation { from, init_code });
            creations.len()
        };

        Ok(CreationReceipt {
            address: Address::with_last_byte(0x10 + index as u8),
            tx_hash: B256::with_last_byte(index as u8),
            block_number: index as u64,
            gas_used: 1_000_000,
        })
    }
}

fn deployer() -> Address {
    Address::with_last_byte(0xde)
}

fn artifact(name: &str, abi: &str, bytecode: &[u8]) -> ContractArtifact {
    let abi: JsonAbi = serde_json::from_str(abi).unwrap();
    ContractArtifact::new(name, abi, Bytes::from(bytecode.to_vec()))
}

fn staking_artifacts() -> HashMap<String, ContractArtifact> {
    let mut artifacts = HashMap::new();
    artifacts.insert(
        "TokenStaking".to_string(),
        artifact("TokenStaking", TOKEN_STAKING_ABI, &[0x60, 0x80, 0x01]),
    );
    artifacts.insert(
        "RewardPool".to_string(),
        artifact("RewardPool", REWARD_POOL_ABI, &[0x60, 0x80, 0x02]),
    );
    artifacts
}

fn staking_plan() -> DeploymentPlan {
    DeploymentPlan::new(vec![
        DeploymentStep::new("tokenStaking", "TokenStaking")
            .arg(StepArg::literal(TOKEN))
            .arg(StepArg::literal(START_TIME)),
        DeploymentStep::new("rewardPool", "RewardPool")
            .arg(StepArg::step("tokenStaking"))
            .arg(StepArg::literal(TOKEN)),
    ])
    .unwrap()
}

fn token() -> Address {
    TOKEN.parse().unwrap()
}

#[tokio::test]
async fn test_all_steps_deployed_in_order() {
    let network = MockNetwork::new();
    let artifacts = staking_artifacts();

    let report = Orchestrator::new(&network, &artifacts)
        .execute(&staking_plan())
        .await
        .unwrap();

    assert_eq!(report.chain_id, 31337);
    assert_eq!(report.deployer, deployer());
    assert_eq!(report.contracts.len(), 2);
    assert_eq!(report.contracts[0].label, "TokenStaking");
    assert_eq!(report.contracts[1].label, "RewardPool");

    let creations = network.creations();
    assert_eq!(creations.len(), 2);
    assert!(creations.iter().all(|c| c.from == deployer()));
}

#[tokio::test]
async fn test_dependent_step_receives_previous_address() {
    let network = MockNetwork::new();
    let artifacts = staking_artifacts();

    let report = Orchestrator::new(&network, &artifacts)
        .execute(&staking_plan())
        .await
        .unwrap();

    let staking = report.contract("tokenStaking").unwrap();
    let pool = report.contract("rewardPool").unwrap();

    assert_eq!(pool.args[0], DynSolValue::Address(staking.address));
    assert_eq!(pool.args[1], DynSolValue::Address(token()));
    assert_eq!(
        report.contracts[0].args,
        vec![
            DynSolValue::Address(token()),
            DynSolValue::Uint(U256::from(START_TIME), 256)
        ]
    );

    // The creation payload is the bytecode followed by the encoded arguments.
    let pool_code = &network.creations()[1].init_code;
    assert_eq!(pool_code.len(), 3 + 64);
    assert_eq!(&pool_code[..3], &[0x60, 0x80, 0x02]);
    assert_eq!(&pool_code[3 + 12..3 + 32], staking.address.as_slice());
    assert_eq!(&pool_code[3 + 44..], token().as_slice());
}

#[tokio::test]
async fn test_failed_step_aborts_remaining_steps() {
    let network = MockNetwork::rejecting_at(1);
    let artifacts = staking_artifacts();

    let failure = Orchestrator::new(&network, &artifacts)
        .execute(&staking_plan())
        .await
        .unwrap_err();

    assert_eq!(
        failure.at,
        FailurePoint::Step {
            index: 1,
            name: "rewardPool".to_string()
        }
    );
    assert_eq!(failure.completed.len(), 1);
    assert_eq!(failure.completed[0].step, "tokenStaking");
    assert_eq!(failure.deployer, Some(deployer()));
    assert!(format!("{:#}", failure.cause).contains("rejected"));
    assert_eq!(network.creations().len(), 1);

    // The failure converts into an error chain for the binary.
    let error = anyhow::Error::from(failure);
    assert!(error.to_string().contains("step 2"));
    assert!(format!("{error:#}").contains("Failed to deploy RewardPool"));
}

#[tokio::test]
async fn test_first_step_failure_deploys_nothing() {
    let network = MockNetwork::rejecting_at(0);
    let artifacts = staking_artifacts();

    let failure = Orchestrator::new(&network, &artifacts)
        .execute(&staking_plan())
        .await
        .unwrap_err();

    assert!(matches!(failure.at, FailurePoint::Step { index: 0, .. }));
    assert!(failure.completed.is_empty());
    assert!(network.creations().is_empty());
}

#[tokio::test]
async fn test_signer_failure_before_any_creation() {
    let network = MockNetwork::without_accounts();
    let artifacts = staking_artifacts();

    let failure = Orchestrator::new(&network, &artifacts)
        .execute(&staking_plan())
        .await
        .unwrap_err();

    assert_eq!(failure.at, FailurePoint::Provider);
    assert!(failure.to_string().contains("provider"), "{failure}");
    assert!(failure.completed.is_empty());
    assert!(failure.deployer.is_none());
    assert!(network.creations().is_empty());
}

#[tokio::test]
async fn test_missing_artifact_fails_step() {
    let network = MockNetwork::new();
    let mut artifacts = staking_artifacts();
    artifacts.remove("RewardPool");

    let failure = Orchestrator::new(&network, &artifacts)
        .execute(&staking_plan())
        .await
        .unwrap_err();

    assert!(matches!(failure.at, FailurePoint::Step { index: 1, .. }));
    assert_eq!(failure.completed.len(), 1);
    assert_eq!(network.creations().len(), 1);
}

#[tokio::test]
async fn test_invalid_literal_fails_before_submission() {
    let network = MockNetwork::new();
    let artifacts = staking_artifacts();
    let plan = DeploymentPlan::new(vec![
        DeploymentStep::new("tokenStaking", "TokenStaking")
            .arg(StepArg::literal("not-an-address"))
            .arg(StepArg::literal(START_TIME)),
    ])
    .unwrap();

    let failure = Orchestrator::new(&network, &artifacts)
        .execute(&plan)
        .await
        .unwrap_err();

    assert!(format!("{:#}", failure.cause).contains("Invalid constructor argument #1"));
    assert!(network.creations().is_empty());
}

fn write_hardhat_artifact(root: &Path, source: &str, name: &str, abi: &str, bytecode: &str) {
    let dir = root.join("contracts").join(source);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(format!("{name}.json")),
        format!(
            r#"{{"_format":"hh-sol-artifact-1","contractName":"{name}","sourceName":"contracts/{source}","abi":{abi},"bytecode":"{bytecode}","deployedBytecode":"0x","linkReferences":{{}},"deployedLinkReferences":{{}}}}"#
        ),
    )
    .unwrap();
}

#[tokio::test]
async fn test_preset_with_artifacts_on_disk() {
    let dir = TempDir::new("stakeup-e2e").unwrap();
    write_hardhat_artifact(dir.path(), "SBCToken.sol", "SBCToken", "[]", "0x6080");
    write_hardhat_artifact(
        dir.path(),
        "TokenStaking.sol",
        "TokenStaking",
        r#"[{"type":"constructor","stateMutability":"nonpayable","inputs":[
            {"name":"_token","type":"address","internalType":"address"},
            {"name":"_duration","type":"uint256","internalType":"uint256"},
            {"name":"_rewardPerBlock","type":"uint256","internalType":"uint256"}
        ]}]"#,
        "0x6080",
    );

    let plan = DeploymentPlan::new(Preset::SbcStaking.steps(&PresetParams::default())).unwrap();
    let artifacts = ArtifactStore::new(dir.path());

    let previews = preview(&plan, &artifacts).unwrap();
    assert_eq!(previews.len(), 2);
    assert_eq!(previews[0].init_code_len, 2);
    assert_eq!(previews[1].init_code_len, 2 + 96);
    assert_eq!(previews[1].args[0], "@sbcToken");

    let network = MockNetwork::new();
    let report = Orchestrator::new(&network, &artifacts)
        .execute(&plan)
        .await
        .unwrap();

    let token = report.contract("sbcToken").unwrap();
    let staking = report.contract("tokenStaking").unwrap();
    assert_eq!(staking.args[0], DynSolValue::Address(token.address));
    assert_eq!(staking.args[1], DynSolValue::Uint(U256::from(26_400_000u64), 256));
    assert_eq!(
        staking.args[2],
        DynSolValue::Uint(U256::from(70_000_000_000_000_000u64), 256)
    );
}

#[test]
fn test_preview_reports_argument_errors() {
    let artifacts = staking_artifacts();
    let plan = DeploymentPlan::new(vec![
        DeploymentStep::new("tokenStaking", "TokenStaking").arg(StepArg::literal(TOKEN)),
    ])
    .unwrap();

    let err = preview(&plan, &artifacts).unwrap_err();
    assert!(format!("{err:#}").contains("expects 2"), "{err:#}");
}

/// Log output captured from a `tracing_subscriber::fmt` subscriber.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn deployed_lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .filter(|line| line.contains(" contract deployed at "))
            .map(str::to_string)
            .collect()
    }
}

fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();

    (logs, tracing::subscriber::set_default(subscriber))
}

#[tokio::test]
async fn test_one_deployed_line_per_step() {
    let (logs, _guard) = capture_logs();
    let network = MockNetwork::new();
    let artifacts = staking_artifacts();

    let report = Orchestrator::new(&network, &artifacts)
        .execute(&staking_plan())
        .await
        .unwrap();

    let lines = logs.deployed_lines();
    assert_eq!(lines.len(), 2, "{lines:#?}");
    assert!(lines[0].contains(&format!(
        "TokenStaking contract deployed at {}",
        report.contracts[0].address
    )));
    assert!(lines[1].contains(&format!(
        "RewardPool contract deployed at {}",
        report.contracts[1].address
    )));
}

#[tokio::test]
async fn test_no_deployed_line_after_failure() {
    let (logs, _guard) = capture_logs();
    let network = MockNetwork::rejecting_at(1);
    let artifacts = staking_artifacts();

    Orchestrator::new(&network, &artifacts)
        .execute(&staking_plan())
        .await
        .unwrap_err();

    let lines = logs.deployed_lines();
    assert_eq!(lines.len(), 1, "{lines:#?}");
    assert!(lines[0].contains("TokenStaking contract deployed at"));
}
