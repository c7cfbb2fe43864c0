//! Deployment delivery for the contract deployer.
//!
//! This crate submits contract creation transactions to a target network and
//! waits for their confirmation. The [`NetworkClient`] trait abstracts the
//! ledger client; [`DeploymentExecutor`] adds retries for submission and a
//! hard bound on the confirmation wait.

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use deployer_types::TransactionHandle;
use std::time::Duration;
use thiserror::Error;

mod executor;

pub use executor::{DeploymentExecutor, RetryPolicy};

/// Network client implementations.
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod simulated;
}

/// Errors that can occur while deploying a contract.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// The deployment transaction could not be submitted.
	#[error("Submission failed: {0}")]
	Submission(String),
	/// The transaction was not confirmed in time. It may still be mined, so
	/// the outcome is unknown.
	#[error("Confirmation of transaction {handle} timed out after {}s", .waited.as_secs())]
	ConfirmationTimeout {
		handle: TransactionHandle,
		waited: Duration,
	},
	/// The transaction was mined but the contract creation reverted.
	#[error("Deployment transaction {handle} reverted")]
	Reverted { handle: TransactionHandle },
	/// The receipt did not carry a contract address.
	#[error("Receipt for transaction {handle} has no contract address")]
	MissingContractAddress { handle: TransactionHandle },
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
}

impl DeliveryError {
	/// Returns true if submitting again may succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, DeliveryError::Submission(_) | DeliveryError::Network(_))
	}

	/// Returns true if a submitted transaction may still deploy the
	/// contract, so its outcome has to be checked again later.
	pub fn is_ambiguous(&self) -> bool {
		matches!(
			self,
			DeliveryError::ConfirmationTimeout { .. } | DeliveryError::Network(_)
		)
	}
}

/// Outcome of a confirmed contract creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
	pub address: Address,
	pub transaction_hash: B256,
	pub block_number: Option<u64>,
}

/// Ledger client used to deploy contracts.
#[async_trait]
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait NetworkClient: Send + Sync {
	/// Submits a contract creation transaction.
	///
	/// The transaction input is the creation bytecode followed by the ABI
	/// encoded constructor arguments.
	async fn submit(&self, bytecode: Bytes, args: Bytes)
		-> Result<TransactionHandle, DeliveryError>;

	/// Waits until the transaction is confirmed or `timeout` elapses.
	async fn confirm(
		&self,
		handle: &TransactionHandle,
		timeout: Duration,
	) -> Result<Confirmation, DeliveryError>;

	/// Chain id reported by the node.
	async fn chain_id(&self) -> Result<u64, DeliveryError>;

	/// Latest block number.
	async fn block_number(&self) -> Result<u64, DeliveryError>;

	/// Returns true if the address holds contract code.
	async fn code_exists(&self, address: Address) -> Result<bool, DeliveryError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_error_classification() {
		let handle = TransactionHandle(B256::repeat_byte(1));
		let timeout = DeliveryError::ConfirmationTimeout {
			handle,
			waited: Duration::from_secs(5),
		};

		assert!(timeout.is_ambiguous());
		assert!(!timeout.is_retryable());
		assert!(DeliveryError::Network("reset".into()).is_ambiguous());
		assert!(DeliveryError::Network("reset".into()).is_retryable());
		assert!(DeliveryError::Submission("rejected".into()).is_retryable());
		assert!(!DeliveryError::Submission("rejected".into()).is_ambiguous());
		assert!(!DeliveryError::Reverted { handle }.is_ambiguous());
		assert!(!DeliveryError::MissingContractAddress { handle }.is_ambiguous());
	}
}
