//! Storage of deployment records.
//!
//! Records are append-only: once a contract is recorded for a network its
//! address never changes. Alongside the records, each network keeps the
//! deployments that were submitted but not yet confirmed, so an interrupted
//! run can be resumed without submitting a second transaction.

use async_trait::async_trait;
use deployer_types::{DeploymentRecord, NetworkDeployments, PendingDeployment};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

pub use implementations::file::FileRecordStore;
pub use implementations::memory::MemoryRecordStore;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// A write would change an existing record.
	#[error("Conflict: {0}")]
	Conflict(String),
}

/// Durable store of deployment records, keyed by network name.
#[async_trait]
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait RecordStore: Send + Sync {
	/// Loads everything recorded for a network. A network without records
	/// yields an empty value.
	async fn load(&self, network: &str) -> Result<NetworkDeployments, StorageError>;

	/// Records a confirmed deployment and clears its pending entry.
	///
	/// Appending a record identical to the stored one is a no-op. Appending a
	/// different record for an already recorded contract fails with
	/// [`StorageError::Conflict`].
	async fn append(&self, network: &str, record: DeploymentRecord) -> Result<(), StorageError>;

	/// Remembers a submitted but unconfirmed deployment.
	async fn set_pending(
		&self,
		network: &str,
		pending: PendingDeployment,
	) -> Result<(), StorageError>;

	/// Forgets the pending deployment of a contract, if any.
	async fn clear_pending(&self, network: &str, contract: &str) -> Result<(), StorageError>;
}

/// Applies an append to a network's deployments.
pub(crate) fn apply_append(
	deployments: &mut NetworkDeployments,
	record: DeploymentRecord,
) -> Result<(), StorageError> {
	if let Some(existing) = deployments.contracts.get(&record.contract) {
		if existing.address != record.address
			|| existing.transaction_hash != record.transaction_hash
		{
			return Err(StorageError::Conflict(format!(
				"{} is already recorded at {}",
				record.contract, existing.address
			)));
		}
		deployments.pending.remove(&record.contract);
		return Ok(());
	}

	deployments.pending.remove(&record.contract);
	deployments.contracts.insert(record.contract.clone(), record);
	Ok(())
}

/// Applies a pending entry to a network's deployments.
pub(crate) fn apply_pending(
	deployments: &mut NetworkDeployments,
	pending: PendingDeployment,
) -> Result<(), StorageError> {
	if let Some(existing) = deployments.contracts.get(&pending.contract) {
		return Err(StorageError::Conflict(format!(
			"{} is already recorded at {}",
			pending.contract, existing.address
		)));
	}
	deployments.pending.insert(pending.contract.clone(), pending);
	Ok(())
}

#[cfg(test)]
pub(crate) mod test_utils {
	use alloy_primitives::{Address, B256};
	use deployer_types::{DeploymentRecord, PendingDeployment};

	pub fn record(contract: &str, byte: u8) -> DeploymentRecord {
		DeploymentRecord {
			contract: contract.to_string(),
			address: Address::repeat_byte(byte),
			transaction_hash: B256::repeat_byte(byte),
			block_number: Some(byte as u64),
			deployed_at: 1_700_000_000,
		}
	}

	pub fn pending(contract: &str, byte: u8) -> PendingDeployment {
		PendingDeployment {
			contract: contract.to_string(),
			transaction_hash: B256::repeat_byte(byte),
			submitted_at: 1_700_000_000,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::test_utils::{pending, record};
	use super::*;

	#[test]
	fn test_append_clears_pending() {
		let mut deployments = NetworkDeployments::default();
		apply_pending(&mut deployments, pending("A", 1)).unwrap();
		apply_append(&mut deployments, record("A", 1)).unwrap();

		assert!(deployments.is_confirmed("A"));
		assert!(deployments.pending("A").is_none());
	}

	#[test]
	fn test_append_is_idempotent() {
		let mut deployments = NetworkDeployments::default();
		apply_append(&mut deployments, record("A", 1)).unwrap();
		apply_append(&mut deployments, record("A", 1)).unwrap();
		assert_eq!(deployments.contracts.len(), 1);
	}

	#[test]
	fn test_append_never_overwrites() {
		let mut deployments = NetworkDeployments::default();
		apply_append(&mut deployments, record("A", 1)).unwrap();

		let result = apply_append(&mut deployments, record("A", 2));
		assert!(matches!(result, Err(StorageError::Conflict(_))));
		assert_eq!(deployments.record("A").unwrap(), &record("A", 1));
	}

	#[test]
	fn test_pending_rejected_for_recorded_contract() {
		let mut deployments = NetworkDeployments::default();
		apply_append(&mut deployments, record("A", 1)).unwrap();

		let result = apply_pending(&mut deployments, pending("A", 2));
		assert!(matches!(result, Err(StorageError::Conflict(_))));
	}
}
