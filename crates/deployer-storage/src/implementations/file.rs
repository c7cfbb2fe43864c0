//! JSON file record store.
//!
//! All networks share one JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "networks": {
//!     "development": {
//!       "contracts": { "WafLog": { "address": "0x..", "transaction_hash": "0x..", "block_number": 5, "deployed_at": 1700000000 } },
//!       "pending": { "Registry": { "transaction_hash": "0x..", "submitted_at": 1700000000 } }
//!     }
//!   }
//! }
//! ```
//!
//! Every write happens under an exclusive `fs2` lock on a sibling `.lock`
//! file and replaces the document atomically through a temporary file.
//! Reads take a shared lock once the document exists.

use crate::{apply_append, apply_pending, RecordStore, StorageError};
use async_trait::async_trait;
use deployer_types::{DeploymentRecord, NetworkDeployments, PendingDeployment};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Current document version.
const RECORDS_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RecordsDocument {
	version: u32,
	#[serde(default)]
	networks: BTreeMap<String, NetworkDeployments>,
}

impl Default for RecordsDocument {
	fn default() -> Self {
		Self {
			version: RECORDS_VERSION,
			networks: BTreeMap::new(),
		}
	}
}

/// Record store persisted to a single JSON file.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
	path: PathBuf,
}

impl FileRecordStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Takes the store lock. It is released when the returned file is dropped.
	async fn lock(&self, exclusive: bool) -> Result<std::fs::File, StorageError> {
		let lock_path = self.path.with_extension("lock");

		if let Some(parent) = lock_path.parent() {
			if !parent.as_os_str().is_empty() {
				fs::create_dir_all(parent).await.map_err(|e| {
					StorageError::Backend(format!("Failed to create lock directory: {e}"))
				})?;
			}
		}

		tokio::task::spawn_blocking(move || {
			let lock_file = std::fs::OpenOptions::new()
				.create(true)
				.truncate(false)
				.read(true)
				.write(true)
				.open(&lock_path)
				.map_err(|e| StorageError::Backend(format!("Failed to open lock file: {e}")))?;

			let locked = if exclusive {
				FileExt::lock_exclusive(&lock_file)
			} else {
				FileExt::lock_shared(&lock_file)
			};
			locked.map_err(|e| StorageError::Backend(format!("Failed to acquire lock: {e}")))?;

			Ok(lock_file)
		})
		.await
		.map_err(|e| StorageError::Backend(format!("Failed to spawn blocking task: {e}")))?
	}

	async fn read_document(&self) -> Result<RecordsDocument, StorageError> {
		let bytes = match fs::read(&self.path).await {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Ok(RecordsDocument::default())
			},
			Err(e) => {
				return Err(StorageError::Backend(format!(
					"Failed to read {}: {e}",
					self.path.display()
				)))
			},
		};

		let document: RecordsDocument = serde_json::from_slice(&bytes).map_err(|e| {
			StorageError::Serialization(format!(
				"Invalid records file {}: {e}",
				self.path.display()
			))
		})?;
		if document.version != RECORDS_VERSION {
			return Err(StorageError::Serialization(format!(
				"Unsupported records version {} in {}",
				document.version,
				self.path.display()
			)));
		}
		Ok(document)
	}

	async fn write_document(&self, document: &RecordsDocument) -> Result<(), StorageError> {
		let data = serde_json::to_vec_pretty(document)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;

		// Write atomically by writing to temp file then renaming
		let temp_path = self.path.with_extension("tmp");
		fs::write(&temp_path, data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &self.path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		Ok(())
	}

	/// Read-modify-write of one network under the exclusive lock.
	async fn modify<F>(&self, network: &str, f: F) -> Result<(), StorageError>
	where
		F: FnOnce(&mut NetworkDeployments) -> Result<(), StorageError> + Send,
	{
		let _lock = self.lock(true).await?;

		let mut document = self.read_document().await?;
		let deployments = document.networks.entry(network.to_string()).or_default();
		f(deployments)?;
		if deployments.is_empty() {
			document.networks.remove(network);
		}

		self.write_document(&document).await?;
		debug!(path = %self.path.display(), network, "Records written");
		Ok(())
	}
}

#[async_trait]
impl RecordStore for FileRecordStore {
	async fn load(&self, network: &str) -> Result<NetworkDeployments, StorageError> {
		// Reads of a store that was never written must not create the lock file
		let exists = fs::try_exists(&self.path).await.map_err(|e| {
			StorageError::Backend(format!("Failed to access {}: {e}", self.path.display()))
		})?;
		if !exists {
			return Ok(NetworkDeployments::default());
		}

		let _lock = self.lock(false).await?;
		let mut document = self.read_document().await?;
		Ok(document.networks.remove(network).unwrap_or_default())
	}

	async fn append(&self, network: &str, record: DeploymentRecord) -> Result<(), StorageError> {
		self.modify(network, |deployments| apply_append(deployments, record))
			.await
	}

	async fn set_pending(
		&self,
		network: &str,
		pending: PendingDeployment,
	) -> Result<(), StorageError> {
		self.modify(network, |deployments| apply_pending(deployments, pending))
			.await
	}

	async fn clear_pending(&self, network: &str, contract: &str) -> Result<(), StorageError> {
		self.modify(network, |deployments| {
			deployments.pending.remove(contract);
			Ok(())
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::{pending, record};
	use tempfile::TempDir;

	fn store(dir: &TempDir) -> FileRecordStore {
		FileRecordStore::new(dir.path().join("deployments.json"))
	}

	#[tokio::test]
	async fn test_missing_file_is_empty() {
		let dir = TempDir::new().unwrap();
		let deployments = store(&dir).load("development").await.unwrap();
		assert!(deployments.is_empty());
	}

	#[tokio::test]
	async fn test_load_of_missing_file_writes_nothing() {
		let dir = TempDir::new().unwrap();
		let store = FileRecordStore::new(dir.path().join("state/deployments.json"));

		assert!(store.load("development").await.unwrap().is_empty());

		let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
		assert!(entries.next_entry().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_records_survive_reopen() {
		let dir = TempDir::new().unwrap();
		store(&dir)
			.append("development", record("WafLog", 1))
			.await
			.unwrap();

		let reopened = store(&dir);
		let deployments = reopened.load("development").await.unwrap();
		assert_eq!(deployments.record("WafLog"), Some(&record("WafLog", 1)));
		assert!(reopened.load("sepolia").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_networks_are_independent() {
		let dir = TempDir::new().unwrap();
		let store = store(&dir);
		store.append("development", record("A", 1)).await.unwrap();
		store.append("sepolia", record("A", 2)).await.unwrap();

		assert_eq!(
			store.load("development").await.unwrap().address_of("A"),
			Some(record("A", 1).address)
		);
		assert_eq!(
			store.load("sepolia").await.unwrap().address_of("A"),
			Some(record("A", 2).address)
		);
	}

	#[tokio::test]
	async fn test_pending_lifecycle() {
		let dir = TempDir::new().unwrap();
		let store = store(&dir);

		store
			.set_pending("development", pending("Registry", 3))
			.await
			.unwrap();
		let deployments = store.load("development").await.unwrap();
		assert_eq!(deployments.pending("Registry"), Some(&pending("Registry", 3)));

		store.clear_pending("development", "Registry").await.unwrap();
		assert!(store.load("development").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_conflicting_append_leaves_file_untouched() {
		let dir = TempDir::new().unwrap();
		let store = store(&dir);
		store.append("development", record("A", 1)).await.unwrap();

		let result = store.append("development", record("A", 2)).await;
		assert!(matches!(result, Err(StorageError::Conflict(_))));
		assert_eq!(
			store.load("development").await.unwrap().record("A"),
			Some(&record("A", 1))
		);
	}

	#[tokio::test]
	async fn test_document_layout() {
		let dir = TempDir::new().unwrap();
		let store = store(&dir);
		store.append("development", record("WafLog", 1)).await.unwrap();

		let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
		let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
		assert_eq!(value["version"], 1);
		assert_eq!(
			value["networks"]["development"]["contracts"]["WafLog"]["block_number"],
			1
		);
		assert!(value["networks"]["development"].get("pending").is_none());
	}

	#[tokio::test]
	async fn test_corrupt_file() {
		let dir = TempDir::new().unwrap();
		let store = store(&dir);
		tokio::fs::write(store.path(), b"not json").await.unwrap();

		let result = store.load("development").await;
		assert!(matches!(result, Err(StorageError::Serialization(_))));
	}

	#[tokio::test]
	async fn test_unsupported_version() {
		let dir = TempDir::new().unwrap();
		let store = store(&dir);
		tokio::fs::write(store.path(), br#"{"version": 2, "networks": {}}"#)
			.await
			.unwrap();

		let result = store.load("development").await;
		assert!(matches!(result, Err(StorageError::Serialization(_))));
	}
}
