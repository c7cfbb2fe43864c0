//! Handle for a submitted deployment transaction.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle for a submitted transaction.
///
/// Network clients return a handle from `submit` and accept it back in
/// `confirm`. The handle is the transaction hash, which is also what gets
/// persisted for pending deployments so a later run can look it up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHandle(pub B256);

impl TransactionHandle {
	/// Transaction hash behind this handle.
	pub fn hash(&self) -> B256 {
		self.0
	}
}

impl From<B256> for TransactionHandle {
	fn from(hash: B256) -> Self {
		Self(hash)
	}
}

impl fmt::Display for TransactionHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}
