//! Shared state for command handlers.
//!
//! Loads the configuration once and builds the registry, record store and
//! network client each command needs.

use anyhow::{Context as _, Result};
use deployer_artifacts::ArtifactRegistry;
use deployer_config::{Config, NetworkConfig};
use deployer_core::Orchestrator;
use deployer_delivery::implementations::evm::alloy::AlloyClient;
use deployer_delivery::implementations::simulated::SimulatedClient;
use deployer_delivery::{DeploymentExecutor, NetworkClient, RetryPolicy};
use deployer_storage::{FileRecordStore, MemoryRecordStore, RecordStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Chain id reported by the simulated network when none is configured.
const SIMULATED_CHAIN_ID: u64 = 1337;

/// Configuration plus the path it was loaded from.
#[derive(Debug)]
pub struct Context {
	pub config: Config,
	pub config_path: PathBuf,
}

impl Context {
	pub async fn load(path: &Path) -> Result<Self> {
		let config = Config::from_file(path)
			.await
			.with_context(|| format!("Failed to load configuration from {}", path.display()))?;
		debug!(
			config_path = %path.display(),
			networks = config.networks.len(),
			contracts = config.contracts.len(),
			"Configuration loaded"
		);
		Ok(Self {
			config,
			config_path: path.to_path_buf(),
		})
	}

	pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
		Ok(self.config.network(name)?)
	}

	pub async fn registry(&self) -> Result<ArtifactRegistry> {
		let dir = &self.config.deployer.artifacts_dir;
		ArtifactRegistry::load_dir(dir)
			.await
			.with_context(|| format!("Failed to load artifacts from {}", dir.display()))
	}

	pub fn record_store(&self) -> FileRecordStore {
		FileRecordStore::new(&self.config.deployer.records_path)
	}

	/// Connects to a configured network.
	pub async fn connect(&self, network: &str) -> Result<Arc<dyn NetworkClient>> {
		let network_config = self.network(network)?;
		let client = AlloyClient::connect(network_config)
			.await
			.with_context(|| format!("Failed to connect to network '{network}'"))?;
		Ok(Arc::new(client))
	}

	/// Builds an orchestrator for a real deployment.
	pub async fn orchestrator(&self, network: &str) -> Result<Orchestrator> {
		let registry = Arc::new(self.registry().await?);
		let client = self.connect(network).await?;
		let store: Arc<dyn RecordStore> = Arc::new(self.record_store());
		Ok(Orchestrator::new(registry, self.executor(network, client)?, store))
	}

	/// Builds an orchestrator against a simulated network.
	///
	/// Records are copied into memory so the dry run sees the same starting
	/// point as a real run but never writes the records file.
	pub async fn dry_run_orchestrator(&self, network: &str) -> Result<Orchestrator> {
		let registry = Arc::new(self.registry().await?);
		let deployments = self.record_store().load(network).await?;

		let chain_id = self.network(network)?.chain_id.unwrap_or(SIMULATED_CHAIN_ID);
		let client = SimulatedClient::new(chain_id)
			.with_code(deployments.contracts.values().map(|r| r.address));
		let store: Arc<dyn RecordStore> =
			Arc::new(MemoryRecordStore::with_deployments(network, deployments));

		Ok(Orchestrator::new(
			registry,
			self.executor(network, Arc::new(client))?,
			store,
		))
	}

	fn executor(
		&self,
		network: &str,
		client: Arc<dyn NetworkClient>,
	) -> Result<DeploymentExecutor> {
		let network_config = self.network(network)?;
		Ok(DeploymentExecutor::new(
			client,
			network_config.confirmation_timeout(),
			RetryPolicy::from(&self.config.submission),
		))
	}
}
