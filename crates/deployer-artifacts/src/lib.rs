//! Artifact registry for the contract deployer.
//!
//! The registry maps contract names to compiled artifacts (creation bytecode
//! and ABI). It is populated once, either from a build directory or from
//! in-memory artifacts, and is read-only afterwards.
//!
//! Two on-disk layouts are understood:
//!
//! - Truffle: `build/contracts/<Name>.json` with `"bytecode": "0x..."` and an
//!   optional `"contractName"`.
//! - Foundry: `out/<File>.sol/<Name>.json` with `"bytecode": { "object": "0x..." }`.

use alloy_json_abi::JsonAbi;
use alloy_primitives::{hex, Bytes};
use deployer_types::ContractArtifact;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while loading or looking up artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
	/// No artifact is registered under the requested name.
	#[error("Artifact not found: {0}")]
	NotFound(String),
	/// An artifact file exists but cannot be used.
	#[error("Invalid artifact {path}: {reason}")]
	Invalid { path: PathBuf, reason: String },
	/// Error reading the artifacts directory.
	#[error("IO error: {0}")]
	Io(String),
}

/// Outcome of parsing a single JSON file.
enum Parsed {
	Artifact(ContractArtifact),
	Skipped(&'static str),
}

/// Read-only lookup of compiled contract artifacts by name.
#[derive(Debug, Default, Clone)]
pub struct ArtifactRegistry {
	artifacts: HashMap<String, Arc<ContractArtifact>>,
}

impl ArtifactRegistry {
	/// Builds a registry from artifacts already in memory.
	///
	/// When two artifacts share a name the first one is kept.
	pub fn from_artifacts(artifacts: impl IntoIterator<Item = ContractArtifact>) -> Self {
		let mut registry = Self::default();
		for artifact in artifacts {
			registry.insert(artifact, None);
		}
		registry
	}

	/// Loads every deployable artifact found under `dir`.
	///
	/// Subdirectories are walked recursively. JSON files without bytecode are
	/// ignored, as are interfaces, abstract contracts and artifacts that still
	/// contain unlinked library placeholders.
	pub async fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
		let dir = dir.as_ref();
		let mut registry = Self::default();
		let mut files = collect_json_files(dir).await?;
		files.sort();

		for path in files {
			match parse_artifact_file(&path).await? {
				Parsed::Artifact(artifact) => registry.insert(artifact, Some(&path)),
				Parsed::Skipped(reason) => {
					debug!(path = %path.display(), reason, "Skipping artifact file");
				},
			}
		}

		info!(
			dir = %dir.display(),
			count = registry.len(),
			"Loaded contract artifacts"
		);
		Ok(registry)
	}

	fn insert(&mut self, artifact: ContractArtifact, path: Option<&Path>) {
		let name = artifact.name().to_string();
		if self.artifacts.contains_key(&name) {
			warn!(
				contract = %name,
				path = ?path.map(|p| p.display().to_string()),
				"Duplicate artifact name, keeping the first one loaded"
			);
			return;
		}
		self.artifacts.insert(name, Arc::new(artifact));
	}

	/// Returns the artifact registered under `name`.
	pub fn get(&self, name: &str) -> Result<Arc<ContractArtifact>, ArtifactError> {
		self.artifacts
			.get(name)
			.cloned()
			.ok_or_else(|| ArtifactError::NotFound(name.to_string()))
	}

	/// Registered names, sorted.
	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.artifacts.keys().cloned().collect();
		names.sort();
		names
	}

	pub fn len(&self) -> usize {
		self.artifacts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.artifacts.is_empty()
	}
}

async fn collect_json_files(root: &Path) -> Result<Vec<PathBuf>, ArtifactError> {
	let mut files = Vec::new();
	let mut dirs = vec![root.to_path_buf()];

	while let Some(dir) = dirs.pop() {
		let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
			ArtifactError::Io(format!("Failed to read {}: {e}", dir.display()))
		})?;

		while let Some(entry) = entries.next_entry().await.map_err(|e| {
			ArtifactError::Io(format!("Failed to read entry in {}: {e}", dir.display()))
		})? {
			let path = entry.path();
			let file_type = entry.file_type().await.map_err(|e| {
				ArtifactError::Io(format!("Failed to stat {}: {e}", path.display()))
			})?;

			if file_type.is_dir() {
				dirs.push(path);
			} else if path.extension().is_some_and(|ext| ext == "json") {
				files.push(path);
			}
		}
	}

	Ok(files)
}

async fn parse_artifact_file(path: &Path) -> Result<Parsed, ArtifactError> {
	let content = tokio::fs::read_to_string(path)
		.await
		.map_err(|e| ArtifactError::Io(format!("Failed to read {}: {e}", path.display())))?;

	let json: Value = serde_json::from_str(&content).map_err(|e| ArtifactError::Invalid {
		path: path.to_path_buf(),
		reason: format!("invalid JSON: {e}"),
	})?;

	let stem = path
		.file_stem()
		.and_then(|s| s.to_str())
		.unwrap_or_default();
	parse_artifact(&json, stem).map_err(|reason| ArtifactError::Invalid {
		path: path.to_path_buf(),
		reason,
	})
}

fn parse_artifact(json: &Value, fallback_name: &str) -> Result<Parsed, String> {
	// Truffle stores a hex string, Foundry an object with the hex under "object"
	let bytecode = match json.get("bytecode") {
		Some(Value::String(s)) => s.as_str(),
		Some(Value::Object(obj)) => match obj.get("object").and_then(Value::as_str) {
			Some(s) => s,
			None => return Ok(Parsed::Skipped("no bytecode object")),
		},
		_ => return Ok(Parsed::Skipped("not a contract artifact")),
	};

	let Some(abi_value) = json.get("abi") else {
		return Ok(Parsed::Skipped("no ABI"));
	};

	let hex_str = bytecode.strip_prefix("0x").unwrap_or(bytecode);
	if hex_str.is_empty() {
		return Ok(Parsed::Skipped("empty bytecode"));
	}
	if hex_str.contains("__") {
		return Ok(Parsed::Skipped("unlinked library placeholder"));
	}

	let bytes = hex::decode(hex_str).map_err(|e| format!("invalid bytecode hex: {e}"))?;
	let abi: JsonAbi =
		serde_json::from_value(abi_value.clone()).map_err(|e| format!("invalid ABI: {e}"))?;

	let name = json
		.get("contractName")
		.and_then(Value::as_str)
		.unwrap_or(fallback_name);
	if name.is_empty() {
		return Err("cannot determine contract name".to_string());
	}

	Ok(Parsed::Artifact(ContractArtifact::new(
		name,
		Bytes::from(bytes),
		abi,
	)))
}
