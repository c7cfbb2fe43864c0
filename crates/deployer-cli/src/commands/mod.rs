//! Command handlers.
//!
//! Each handler prints its results through [`Display`] and returns the
//! process exit code. Errors found before any transaction is sent are
//! returned as `Err`; a deployment that halts part way returns
//! [`ExitCode::FAILURE`] after naming the contract it stopped at.

use crate::cli::{output::Display, Commands, DeployArgs, PlanArgs};
use crate::Context;
use anyhow::Result;
use deployer_core::{preview, RunOptions, RunOutcome, RunReport, StepState};
use deployer_storage::RecordStore;
use deployer_types::short_hash;
use std::process::ExitCode;
use tracing::{info, instrument};

/// Dispatches parsed commands against a loaded [`Context`].
pub struct CommandHandler {
	ctx: Context,
}

impl CommandHandler {
	pub fn new(ctx: Context) -> Self {
		Self { ctx }
	}

	pub async fn handle(&self, command: Commands) -> Result<ExitCode> {
		match command {
			Commands::Deploy(args) => self.deploy(args).await,
			Commands::Plan(args) => self.plan(args).await,
			Commands::Status { network } => self.status(&network).await,
			Commands::Artifacts => self.artifacts().await,
		}
	}

	/// Handle deploy command
	///
	/// # Arguments
	/// * `args` - Target network, contract filter and run flags
	///
	/// # Returns
	/// `SUCCESS` when every planned contract is confirmed, `FAILURE` when
	/// the run halted
	#[instrument(skip(self, args), fields(network = %args.network, dry_run = args.dry_run))]
	async fn deploy(&self, args: DeployArgs) -> Result<ExitCode> {
		let dry_run = args.dry_run;
		let report = self.run_deploy(args).await?;

		for name in &report.reused {
			Display::info(&format!("{name} already deployed"));
		}
		for record in &report.deployed {
			let resumed = if report.resumed.contains(&record.contract) {
				", resumed"
			} else {
				""
			};
			Display::success(&format!(
				"{} deployed at {} (tx {}{resumed})",
				record.contract,
				record.address,
				short_hash(&record.transaction_hash)
			));
		}

		if let Some(message) = halt_message(&report) {
			Display::error(&message);
			for (name, status) in &report.statuses {
				Display::kv(name, &status.to_string());
			}
			Display::next_steps(&[
				"Fix the cause above and run the same command again",
				"Contracts deployed so far are recorded and will not be redeployed",
			]);
			return Ok(ExitCode::FAILURE);
		}

		info!(
			deployed = report.deployed.len(),
			reused = report.reused.len(),
			"Run finished"
		);
		if dry_run {
			Display::success("Dry run complete, no transactions were sent");
		} else {
			Display::success(&format!(
				"All {} contracts deployed on {}",
				report.plan.len(),
				report.network
			));
		}
		Ok(ExitCode::SUCCESS)
	}

	/// Builds the orchestrator for the requested mode and runs it.
	async fn run_deploy(&self, args: DeployArgs) -> Result<RunReport> {
		let network = args.network.as_str();
		self.ctx.network(network)?;

		let orchestrator = if args.dry_run {
			Display::header(&format!("Dry Run: {network}"));
			self.ctx.dry_run_orchestrator(network).await?
		} else {
			Display::header(&format!("Deploying to {network}"));
			self.ctx.orchestrator(network).await?
		};

		let options = RunOptions {
			only: args.only,
			discard_pending: args.discard_pending,
			verify_records: !args.no_verify,
		};
		Ok(orchestrator
			.run(network, &self.ctx.config.contracts, &options)
			.await?)
	}

	/// Handle plan command
	#[instrument(skip(self, args), fields(network = %args.network))]
	async fn plan(&self, args: PlanArgs) -> Result<ExitCode> {
		self.ctx.network(&args.network)?;
		Display::header(&format!("Deployment Plan: {}", args.network));

		let registry = self.ctx.registry().await?;
		let store = self.ctx.record_store();
		let steps = preview(
			&registry,
			&store,
			&args.network,
			&self.ctx.config.contracts,
			&args.only,
		)
		.await?;

		for (index, step) in steps.iter().enumerate() {
			let (tag, mut detail) = match &step.state {
				StepState::Recorded(address) => ("recorded", address.to_string()),
				StepState::Pending(hash) => ("pending", format!("tx {}", short_hash(hash))),
				StepState::ToDeploy => ("deploy", String::new()),
			};
			if step.artifact != step.contract {
				detail = format!("[{}] {detail}", step.artifact);
			}
			if !step.dependencies.is_empty() {
				detail = format!("{detail} after {}", step.dependencies.join(", "));
			}
			Display::step(index, &step.contract, tag, detail.trim());
		}

		let to_deploy = steps
			.iter()
			.filter(|s| s.state == StepState::ToDeploy)
			.count();
		Display::kv("To deploy", &to_deploy.to_string());
		Ok(ExitCode::SUCCESS)
	}

	/// Handle status command
	///
	/// A network that cannot be reached is reported, not treated as an
	/// error, so the recorded deployments are still shown.
	#[instrument(skip(self))]
	async fn status(&self, network: &str) -> Result<ExitCode> {
		let network_config = self.ctx.network(network)?;
		Display::header(&format!("Network Status: {network}"));
		Display::kv("Config", &self.ctx.config_path.display().to_string());
		Display::kv("RPC", &network_config.rpc_url);

		match self.ctx.connect(network).await {
			Ok(client) => {
				Display::kv("Chain ID", &client.chain_id().await?.to_string());
				Display::kv("Latest block", &client.block_number().await?.to_string());
				Display::success("Connected");
			},
			Err(e) => Display::error(&format!("{e:#}")),
		}

		let deployments = self.ctx.record_store().load(network).await?;
		if deployments.is_empty() {
			Display::info("No deployments recorded");
			return Ok(ExitCode::SUCCESS);
		}

		Display::header("Recorded Deployments");
		for (name, record) in &deployments.contracts {
			let block = record
				.block_number
				.map(|b| format!("block {b}"))
				.unwrap_or_default();
			Display::kv(name, &format!("{} {block}", record.address));
		}
		for (name, pending) in &deployments.pending {
			Display::warning(&format!(
				"{name}: transaction {} awaiting confirmation",
				pending.transaction_hash
			));
		}
		Ok(ExitCode::SUCCESS)
	}

	/// Handle artifacts command
	#[instrument(skip(self))]
	async fn artifacts(&self) -> Result<ExitCode> {
		Display::header(&format!(
			"Artifacts in {}",
			self.ctx.config.deployer.artifacts_dir.display()
		));

		let registry = self.ctx.registry().await?;
		if registry.is_empty() {
			Display::warning("No deployable artifacts found");
			return Ok(ExitCode::SUCCESS);
		}

		for name in registry.names() {
			let artifact = registry.get(&name)?;
			let params = artifact
				.constructor_inputs()
				.iter()
				.map(|p| p.ty.as_str())
				.collect::<Vec<_>>()
				.join(", ");
			Display::kv(
				&name,
				&format!("{} bytes, constructor({params})", artifact.bytecode().len()),
			);
		}
		Ok(ExitCode::SUCCESS)
	}
}

/// Message naming the contract a halted run stopped at, or `None` if the
/// run completed.
pub fn halt_message(report: &RunReport) -> Option<String> {
	match &report.outcome {
		RunOutcome::Completed => None,
		RunOutcome::Halted { contract, error } => Some(format!(
			"Deployment of {contract} on {} failed: {error}",
			report.network
		)),
	}
}
