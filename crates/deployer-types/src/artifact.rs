//! Compiled contract artifact type.

use alloy_json_abi::{JsonAbi, Param};
use alloy_primitives::Bytes;

/// A compiled contract ready for deployment.
///
/// Holds the creation bytecode and the ABI descriptor of a single contract.
/// Artifacts are immutable once loaded and are shared between components as
/// `Arc<ContractArtifact>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
	name: String,
	bytecode: Bytes,
	abi: JsonAbi,
}

impl ContractArtifact {
	/// Creates a new artifact from its parts.
	pub fn new(name: impl Into<String>, bytecode: Bytes, abi: JsonAbi) -> Self {
		Self {
			name: name.into(),
			bytecode,
			abi,
		}
	}

	/// Logical contract name used for lookups and records.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Creation bytecode, without constructor arguments.
	pub fn bytecode(&self) -> &Bytes {
		&self.bytecode
	}

	/// Constructor parameters declared in the ABI.
	///
	/// Returns an empty slice when the contract has no explicit constructor.
	pub fn constructor_inputs(&self) -> &[Param] {
		self.abi
			.constructor
			.as_ref()
			.map(|c| c.inputs.as_slice())
			.unwrap_or(&[])
	}
}
