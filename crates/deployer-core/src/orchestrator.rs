//! Deployment orchestration.
//!
//! The orchestrator drives a whole run for one network:
//!
//! 1. Pre-flight: plan the contracts, resolve every artifact and check the
//!    declared constructor arguments. Nothing is submitted if any of this
//!    fails.
//! 2. Verify that recorded addresses still hold code.
//! 3. Walk the plan in order. Recorded contracts are reused, contracts with
//!    a pending transaction are confirmed without resubmitting, everything
//!    else is submitted and confirmed. Each confirmation is persisted before
//!    the next contract starts.
//!
//! The first contract failure halts the run. Records written so far are
//! kept, so the next run resumes at the first unconfirmed contract.

use crate::args::{encode_constructor_args, validate_constructor_args, ArgumentError};
use crate::state::DeploymentRun;
use alloy_primitives::{Address, B256};
use deployer_artifacts::{ArtifactError, ArtifactRegistry};
use deployer_config::ContractConfig;
use deployer_delivery::{DeliveryError, DeploymentExecutor};
use deployer_planner::{plan_filtered, ContractNode, DeploymentPlan, PlanError, PlanStep};
use deployer_storage::{RecordStore, StorageError};
use deployer_types::{
	current_timestamp, ContractArtifact, ContractStatus, DeploymentRecord, InvalidTransition,
	NetworkDeployments, PendingDeployment, TransactionHandle,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Errors that stop a run before or outside of a single contract's
/// deployment. None of them leave a transaction behind.
#[derive(Debug, Error)]
pub enum OrchestratorError {
	#[error("Artifact error: {0}")]
	Artifact(#[from] ArtifactError),
	#[error("Plan error: {0}")]
	Plan(#[from] PlanError),
	#[error("Argument error: {0}")]
	Arguments(#[from] ArgumentError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Recorded address {address} of {contract} holds no code")]
	StaleRecord { contract: String, address: Address },
	#[error("Network error: {0}")]
	Network(#[from] DeliveryError),
	#[error("Contract '{0}' is not declared")]
	UnknownContract(String),
}

/// Why a contract could not be deployed.
#[derive(Debug, Error)]
pub enum ContractFailure {
	#[error(transparent)]
	Arguments(#[from] ArgumentError),
	#[error(transparent)]
	Delivery(#[from] DeliveryError),
	#[error("Failed to persist deployment state: {0}")]
	Storage(#[from] StorageError),
	#[error("Dependency '{0}' is not confirmed")]
	DependencyNotConfirmed(String),
	#[error(transparent)]
	State(#[from] InvalidTransition),
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
	/// Every planned contract is confirmed.
	Completed,
	/// The run stopped at `contract`.
	Halted {
		contract: String,
		error: ContractFailure,
	},
}

/// Result of a run.
#[derive(Debug)]
pub struct RunReport {
	pub network: String,
	/// Planned contracts in deployment order.
	pub plan: Vec<String>,
	/// Records confirmed during this run, including resumed transactions.
	pub deployed: Vec<DeploymentRecord>,
	/// Contracts recorded before the run started.
	pub reused: Vec<String>,
	/// Contracts confirmed from a transaction submitted by an earlier run.
	pub resumed: Vec<String>,
	/// Final status of every planned contract, in plan order.
	pub statuses: Vec<(String, ContractStatus)>,
	pub outcome: RunOutcome,
}

impl RunReport {
	pub fn is_success(&self) -> bool {
		self.failed_contract().is_none()
	}

	/// The contract the run halted at, if any.
	pub fn failed_contract(&self) -> Option<&str> {
		match &self.outcome {
			RunOutcome::Completed => None,
			RunOutcome::Halted { contract, .. } => Some(contract),
		}
	}
}

/// State of one plan step before a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepState {
	/// Already deployed at the address.
	Recorded(Address),
	/// A transaction was submitted earlier and is awaiting confirmation.
	Pending(B256),
	/// Will be submitted.
	ToDeploy,
}

/// One step of a previewed plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPreview {
	pub contract: String,
	pub artifact: String,
	pub dependencies: Vec<String>,
	pub state: StepState,
}

/// Options for a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
	/// Restrict the run to these contracts and their dependencies.
	pub only: Vec<String>,
	/// Drop pending transactions from earlier runs instead of confirming
	/// them. The contracts are submitted again.
	pub discard_pending: bool,
	/// Check that recorded addresses still hold code before submitting.
	pub verify_records: bool,
}

impl Default for RunOptions {
	fn default() -> Self {
		Self {
			only: Vec::new(),
			discard_pending: false,
			verify_records: true,
		}
	}
}

/// Output of pre-flight.
struct Prepared<'a> {
	plan: DeploymentPlan,
	steps: Vec<PreparedStep<'a>>,
}

/// A planned contract with everything needed to deploy it.
struct PreparedStep<'a> {
	step: PlanStep,
	config: &'a ContractConfig,
	artifact: Arc<ContractArtifact>,
}

/// Plans the run and reports what each step would do, without touching
/// the network.
pub async fn preview(
	registry: &ArtifactRegistry,
	store: &dyn RecordStore,
	network: &str,
	contracts: &[ContractConfig],
	only: &[String],
) -> Result<Vec<StepPreview>, OrchestratorError> {
	let prepared = prepare(registry, contracts, only)?;
	let deployments = store.load(network).await?;

	Ok(prepared
		.steps
		.into_iter()
		.map(|p| {
			let state = if let Some(address) = deployments.address_of(&p.step.name) {
				StepState::Recorded(address)
			} else if let Some(pending) = deployments.pending(&p.step.name) {
				StepState::Pending(pending.transaction_hash)
			} else {
				StepState::ToDeploy
			};
			StepPreview {
				contract: p.step.name,
				artifact: p.config.artifact_name().to_string(),
				dependencies: p.step.dependencies,
				state,
			}
		})
		.collect())
}

/// Plans the declared contracts, resolves their artifacts and checks their
/// constructor arguments.
fn prepare<'a>(
	registry: &ArtifactRegistry,
	contracts: &'a [ContractConfig],
	only: &[String],
) -> Result<Prepared<'a>, OrchestratorError> {
	let nodes: Vec<ContractNode> = contracts
		.iter()
		.map(|c| ContractNode {
			name: c.name.clone(),
			dependencies: c.dependencies(),
		})
		.collect();
	let plan = plan_filtered(&nodes, only)?;

	let steps = plan
		.steps()
		.iter()
		.map(|step| -> Result<PreparedStep<'a>, OrchestratorError> {
			let config = contracts
				.iter()
				.find(|c| c.name == step.name)
				.ok_or_else(|| OrchestratorError::UnknownContract(step.name.clone()))?;
			let artifact = registry.get(config.artifact_name())?;
			validate_constructor_args(config, &artifact)?;
			Ok(PreparedStep {
				step: step.clone(),
				config,
				artifact,
			})
		})
		.collect::<Result<Vec<_>, _>>()?;

	Ok(Prepared { plan, steps })
}

/// Deploys declared contracts to one network in dependency order.
pub struct Orchestrator {
	registry: Arc<ArtifactRegistry>,
	executor: DeploymentExecutor,
	store: Arc<dyn RecordStore>,
}

impl Orchestrator {
	pub fn new(
		registry: Arc<ArtifactRegistry>,
		executor: DeploymentExecutor,
		store: Arc<dyn RecordStore>,
	) -> Self {
		Self {
			registry,
			executor,
			store,
		}
	}

	/// Runs the deployment.
	///
	/// Returns `Err` for problems found before any transaction is submitted.
	/// Once deployment starts, a contract failure is reported through
	/// [`RunOutcome::Halted`] together with everything deployed so far.
	#[instrument(skip_all, fields(network = %network))]
	pub async fn run(
		&self,
		network: &str,
		contracts: &[ContractConfig],
		options: &RunOptions,
	) -> Result<RunReport, OrchestratorError> {
		let prepared = prepare(&self.registry, contracts, &options.only)?;
		let plan: Vec<String> = prepared.plan.names().into_iter().map(String::from).collect();
		info!(contracts = ?plan, "Deployment plan ready");

		let mut deployments = self.store.load(network).await?;
		if options.discard_pending {
			self.discard_pending(network, &prepared.steps, &mut deployments)
				.await?;
		}
		if options.verify_records {
			self.verify_records(&prepared.steps, &deployments).await?;
		}

		let mut run = DeploymentRun::new(&prepared.plan, &deployments);

		let mut report = RunReport {
			network: network.to_string(),
			plan,
			deployed: Vec::new(),
			reused: Vec::new(),
			resumed: Vec::new(),
			statuses: Vec::new(),
			outcome: RunOutcome::Completed,
		};

		for prepared_step in &prepared.steps {
			let name = prepared_step.step.name.as_str();

			if run.is_reused(name) {
				debug!(contract = %name, "Already deployed, reusing record");
				report.reused.push(name.to_string());
				continue;
			}

			let result = self
				.deploy_step(network, prepared_step, &mut run, &mut deployments)
				.await;
			match result {
				Ok(record) => {
					if run.is_resumed(name) {
						report.resumed.push(name.to_string());
					}
					report.deployed.push(record);
				},
				Err(failure) => {
					if let Err(e) = run.mark_failed(name) {
						debug!(contract = %name, error = %e, "Status already terminal");
					}
					error!(contract = %name, error = %failure, "Deployment halted");
					report.outcome = RunOutcome::Halted {
						contract: name.to_string(),
						error: failure,
					};
					break;
				},
			}
		}

		report.statuses = run.statuses();
		if !report.is_success() {
			return Ok(report);
		}
		info!(
			deployed = report.deployed.len(),
			reused = report.reused.len(),
			"Deployment complete"
		);
		Ok(report)
	}

	async fn discard_pending(
		&self,
		network: &str,
		prepared: &[PreparedStep<'_>],
		deployments: &mut NetworkDeployments,
	) -> Result<(), OrchestratorError> {
		for p in prepared {
			if let Some(pending) = deployments.pending.remove(&p.step.name) {
				warn!(
					contract = %p.step.name,
					tx_hash = %pending.transaction_hash,
					"Discarding pending deployment"
				);
				self.store.clear_pending(network, &p.step.name).await?;
			}
		}
		Ok(())
	}

	async fn verify_records(
		&self,
		prepared: &[PreparedStep<'_>],
		deployments: &NetworkDeployments,
	) -> Result<(), OrchestratorError> {
		for p in prepared {
			let Some(address) = deployments.address_of(&p.step.name) else {
				continue;
			};
			if !self.executor.client().code_exists(address).await? {
				return Err(OrchestratorError::StaleRecord {
					contract: p.step.name.clone(),
					address,
				});
			}
			debug!(contract = %p.step.name, address = %address, "Recorded deployment verified");
		}
		Ok(())
	}

	/// Deploys one contract, or confirms its pending transaction.
	async fn deploy_step(
		&self,
		network: &str,
		prepared: &PreparedStep<'_>,
		run: &mut DeploymentRun,
		deployments: &mut NetworkDeployments,
	) -> Result<DeploymentRecord, ContractFailure> {
		let name = prepared.step.name.as_str();

		if let Some(dependency) = prepared
			.step
			.dependencies
			.iter()
			.find(|d| !deployments.is_confirmed(d))
		{
			return Err(ContractFailure::DependencyNotConfirmed(dependency.clone()));
		}

		let resumed = deployments.pending(name).map(PendingDeployment::handle);
		let handle = match resumed {
			Some(handle) => {
				info!(contract = %name, tx_hash = %handle, "Resuming pending deployment");
				handle
			},
			None => {
				let args = encode_constructor_args(prepared.config, &prepared.artifact, |c| {
					deployments.address_of(c)
				})?;
				let handle = self.executor.submit(&prepared.artifact, &args).await?;
				run.mark_submitted(name)?;

				let pending = PendingDeployment {
					contract: name.to_string(),
					transaction_hash: handle.hash(),
					submitted_at: current_timestamp(),
				};
				if let Err(e) = self.store.set_pending(network, pending.clone()).await {
					error!(
						contract = %name,
						tx_hash = %handle,
						error = %e,
						"Submitted transaction could not be recorded as pending"
					);
					return Err(e.into());
				}
				deployments.pending.insert(name.to_string(), pending);
				handle
			},
		};

		let record = match self.executor.await_confirmation(name, &handle).await {
			Ok(record) => record,
			Err(e) => {
				self.forget_failed(network, name, &handle, &e, deployments)
					.await;
				return Err(e.into());
			},
		};

		if let Err(e) = self.store.append(network, record.clone()).await {
			error!(
				contract = %name,
				address = %record.address,
				tx_hash = %handle,
				error = %e,
				"Confirmed deployment could not be recorded"
			);
			return Err(e.into());
		}
		deployments.pending.remove(name);
		deployments
			.contracts
			.insert(name.to_string(), record.clone());
		run.mark_confirmed(name)?;

		info!(contract = %name, address = %record.address, "Contract deployed");
		Ok(record)
	}

	/// Clears the pending entry of a transaction that definitely did not
	/// deploy the contract. Ambiguous failures keep it for the next run.
	async fn forget_failed(
		&self,
		network: &str,
		contract: &str,
		handle: &TransactionHandle,
		failure: &DeliveryError,
		deployments: &mut NetworkDeployments,
	) {
		if failure.is_ambiguous() {
			warn!(
				contract = %contract,
				tx_hash = %handle,
				"Deployment outcome unknown, keeping pending entry for the next run"
			);
			return;
		}

		deployments.pending.remove(contract);
		if let Err(e) = self.store.clear_pending(network, contract).await {
			warn!(contract = %contract, error = %e, "Failed to clear pending entry");
		}
	}
}
