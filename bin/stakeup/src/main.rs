//! stakeup deploys the staking contracts to an EVM network in dependency order.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};

use cli::{Cli, Command, DeployArgs, InitArgs, PlanArgs};
use stakeup_deploy::{
    ArtifactStore, DeployConfig, DeploymentRecord, DeploymentReport, JsonRpcNetwork,
    Orchestrator, PlanFingerprint, StepPreview, preview,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match cli.command {
        Command::Deploy(args) => deploy(args).await,
        Command::Plan(args) => plan(args),
        Command::Init(args) => init(args),
    }
}

async fn deploy(args: DeployArgs) -> Result<()> {
    let mut config = DeployConfig::load(args.config.as_deref())?;

    if let Some(rpc_url) = args.rpc_url {
        config.network.rpc_url = rpc_url;
    }
    if let Some(from) = args.from {
        config.network.from = Some(from);
    }
    if let Some(artifacts) = args.artifacts {
        config.artifacts = artifacts;
    }
    if let Some(network_name) = args.network_name {
        config.network_name = network_name;
    }
    if let Some(records) = args.records {
        config.records = records;
    }

    let plan = config.plan()?;
    let artifacts = ArtifactStore::new(&config.artifacts);
    let network = JsonRpcNetwork::new(&config.network)?;
    let plan_hash = PlanFingerprint::new(&config.network_name, &plan).compute_hash()?;

    tracing::info!(
        network = %config.network_name,
        rpc_url = %network.url(),
        artifacts = %artifacts.root().display(),
        steps = plan.len(),
        plan_hash = %plan_hash,
        "Starting deployment..."
    );

    let outcome = Orchestrator::new(&network, &artifacts)
        .execute(&plan)
        .await;

    if !args.no_record {
        let record = match &outcome {
            Ok(report) => DeploymentRecord::from_report(plan_hash, &config.network_name, report),
            Err(failure) => {
                DeploymentRecord::from_failure(plan_hash, &config.network_name, failure)
            }
        };

        // A record that cannot be written must not hide the deployment outcome.
        match record.save_to_dir(&config.records) {
            Ok(path) => tracing::info!(path = %path.display(), "Deployment record saved"),
            Err(e) => tracing::warn!(error = ?e, "Failed to save deployment record"),
        }
    }

    let report = outcome?;

    println!("{}", report_table(&report));
    tracing::info!(
        contracts = report.contracts.len(),
        "All contracts deployed successfully!"
    );

    Ok(())
}

fn plan(args: PlanArgs) -> Result<()> {
    let mut config = DeployConfig::load(args.config.as_deref())?;

    if let Some(artifacts) = args.artifacts {
        config.artifacts = artifacts;
    }

    let plan = config.plan()?;
    let previews = preview(&plan, &ArtifactStore::new(&config.artifacts))?;

    println!("{}", preview_table(&previews));
    tracing::info!(steps = previews.len(), "Deployment plan is valid");

    Ok(())
}

fn init(args: InitArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            args.output.display()
        );
    }

    let config = args.preset.config(&args.params());
    config.plan().context("Built-in plan is invalid")?;
    config.save_to_file(&args.output)?;

    tracing::info!(
        preset = %args.preset,
        path = %args.output.display(),
        "Configuration written. Compile the contracts, then run `stakeup deploy`."
    );

    Ok(())
}

fn report_table(report: &DeploymentReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Step", "Contract", "Address", "Tx hash", "Block"]);

    for contract in &report.contracts {
        table.add_row(vec![
            contract.step.clone(),
            contract.label.clone(),
            contract.address.to_checksum(None),
            contract.tx_hash.to_string(),
            contract.block_number.to_string(),
        ]);
    }

    table
}

fn preview_table(previews: &[StepPreview]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "Step", "Contract", "Arguments", "Init code"]);

    for (index, step) in previews.iter().enumerate() {
        table.add_row(vec![
            (index + 1).to_string(),
            step.name.clone(),
            step.contract.clone(),
            step.args.join("\n"),
            format!("{} bytes", step.init_code_len),
        ]);
    }

    table
}
