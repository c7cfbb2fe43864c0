//! In-memory record store.
//!
//! Used by tests and by dry runs, which start from a copy of the persisted
//! records and must not write them back.

use crate::{apply_append, apply_pending, RecordStore, StorageError};
use async_trait::async_trait;
use deployer_types::{DeploymentRecord, NetworkDeployments, PendingDeployment};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Record store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
	networks: RwLock<HashMap<String, NetworkDeployments>>,
}

impl MemoryRecordStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a store that starts with the given deployments for `network`.
	pub fn with_deployments(network: impl Into<String>, deployments: NetworkDeployments) -> Self {
		let mut networks = HashMap::new();
		networks.insert(network.into(), deployments);
		Self {
			networks: RwLock::new(networks),
		}
	}
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
	async fn load(&self, network: &str) -> Result<NetworkDeployments, StorageError> {
		let networks = self.networks.read().await;
		Ok(networks.get(network).cloned().unwrap_or_default())
	}

	async fn append(&self, network: &str, record: DeploymentRecord) -> Result<(), StorageError> {
		let mut networks = self.networks.write().await;
		apply_append(networks.entry(network.to_string()).or_default(), record)
	}

	async fn set_pending(
		&self,
		network: &str,
		pending: PendingDeployment,
	) -> Result<(), StorageError> {
		let mut networks = self.networks.write().await;
		apply_pending(networks.entry(network.to_string()).or_default(), pending)
	}

	async fn clear_pending(&self, network: &str, contract: &str) -> Result<(), StorageError> {
		let mut networks = self.networks.write().await;
		if let Some(deployments) = networks.get_mut(network) {
			deployments.pending.remove(contract);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::{pending, record};

	#[tokio::test]
	async fn test_basic_operations() {
		let store = MemoryRecordStore::new();
		assert!(store.load("development").await.unwrap().is_empty());

		store
			.set_pending("development", pending("A", 1))
			.await
			.unwrap();
		store.append("development", record("A", 1)).await.unwrap();

		let deployments = store.load("development").await.unwrap();
		assert!(deployments.is_confirmed("A"));
		assert!(deployments.pending.is_empty());
	}

	#[tokio::test]
	async fn test_seeded_store() {
		let mut seeded = NetworkDeployments::default();
		seeded.contracts.insert("A".to_string(), record("A", 1));
		let store = MemoryRecordStore::with_deployments("development", seeded);

		assert!(store.load("development").await.unwrap().is_confirmed("A"));
		assert!(store.load("sepolia").await.unwrap().is_empty());
	}
}
