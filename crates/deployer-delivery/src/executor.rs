//! Deployment executor: submit, then wait for confirmation.

use crate::{DeliveryError, NetworkClient};
use alloy_primitives::Bytes;
use deployer_config::SubmissionConfig;
use deployer_types::{current_timestamp, ContractArtifact, DeploymentRecord, TransactionHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Exponential backoff applied to failed submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub initial_backoff: Duration,
	pub max_backoff: Duration,
}

impl RetryPolicy {
	/// A policy that never retries.
	pub fn none() -> Self {
		Self {
			max_attempts: 1,
			initial_backoff: Duration::ZERO,
			max_backoff: Duration::ZERO,
		}
	}

	/// Delay before the attempt following `attempt` (1-based).
	pub fn backoff(&self, attempt: u32) -> Duration {
		let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
		self.initial_backoff
			.saturating_mul(factor)
			.min(self.max_backoff)
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::from(&SubmissionConfig::default())
	}
}

impl From<&SubmissionConfig> for RetryPolicy {
	fn from(config: &SubmissionConfig) -> Self {
		Self {
			max_attempts: config.max_attempts.max(1),
			initial_backoff: Duration::from_millis(config.initial_backoff_ms),
			max_backoff: Duration::from_millis(config.max_backoff_ms),
		}
	}
}

/// Deploys single contracts through a [`NetworkClient`].
///
/// Submission failures are retried according to the [`RetryPolicy`]. The
/// confirmation wait is bounded by `confirmation_timeout` and is never
/// retried: a timeout means the transaction may still be mined, and
/// submitting again could deploy the contract twice.
#[derive(Clone)]
pub struct DeploymentExecutor {
	client: Arc<dyn NetworkClient>,
	confirmation_timeout: Duration,
	retry: RetryPolicy,
}

impl DeploymentExecutor {
	pub fn new(
		client: Arc<dyn NetworkClient>,
		confirmation_timeout: Duration,
		retry: RetryPolicy,
	) -> Self {
		Self {
			client,
			confirmation_timeout,
			retry,
		}
	}

	pub fn client(&self) -> &Arc<dyn NetworkClient> {
		&self.client
	}

	pub fn confirmation_timeout(&self) -> Duration {
		self.confirmation_timeout
	}

	/// Submits the creation transaction for `artifact`.
	#[instrument(skip_all, fields(contract = %artifact.name()))]
	pub async fn submit(
		&self,
		artifact: &ContractArtifact,
		args: &Bytes,
	) -> Result<TransactionHandle, DeliveryError> {
		let mut attempt = 1;
		loop {
			match self
				.client
				.submit(artifact.bytecode().clone(), args.clone())
				.await
			{
				Ok(handle) => {
					info!(tx_hash = %handle, attempt, "Deployment transaction submitted");
					return Ok(handle);
				},
				Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
					let delay = self.retry.backoff(attempt);
					warn!(
						error = %e,
						attempt,
						max_attempts = self.retry.max_attempts,
						delay_ms = delay.as_millis() as u64,
						"Submission failed, retrying"
					);
					tokio::time::sleep(delay).await;
					attempt += 1;
				},
				Err(DeliveryError::Network(message)) => {
					return Err(DeliveryError::Submission(message));
				},
				Err(e) => return Err(e),
			}
		}
	}

	/// Waits for a submitted transaction and builds the deployment record.
	#[instrument(skip_all, fields(contract = %contract, tx_hash = %handle))]
	pub async fn await_confirmation(
		&self,
		contract: &str,
		handle: &TransactionHandle,
	) -> Result<DeploymentRecord, DeliveryError> {
		let timeout = self.confirmation_timeout;
		let confirmation =
			match tokio::time::timeout(timeout, self.client.confirm(handle, timeout)).await {
				Ok(result) => result?,
				Err(_) => {
					return Err(DeliveryError::ConfirmationTimeout {
						handle: *handle,
						waited: timeout,
					})
				},
			};

		info!(
			address = %confirmation.address,
			block = ?confirmation.block_number,
			"Deployment confirmed"
		);
		Ok(DeploymentRecord {
			contract: contract.to_string(),
			address: confirmation.address,
			transaction_hash: confirmation.transaction_hash,
			block_number: confirmation.block_number,
			deployed_at: current_timestamp(),
		})
	}
}
