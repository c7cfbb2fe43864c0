//! Alloy-based network client.
//!
//! Deploys contracts over HTTP JSON-RPC. Transactions are signed locally when
//! a private key is configured. Otherwise they are sent from the node's first
//! unlocked account, which is how development nodes such as Ganache and
//! Anvil are usually driven.

use crate::{Confirmation, DeliveryError, NetworkClient};
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use deployer_config::NetworkConfig;
use deployer_types::TransactionHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Network client backed by an alloy HTTP provider.
pub struct AlloyClient {
	provider: DynProvider,
	/// Unlocked node account used when no local signer is configured.
	from: Option<Address>,
	poll_interval: Duration,
	min_confirmations: u64,
}

impl AlloyClient {
	/// Connects to the network and checks that it is reachable.
	///
	/// Fails if the node reports a chain id different from the configured
	/// one, or if no signer is configured and the node has no accounts.
	pub async fn connect(network: &NetworkConfig) -> Result<Self, DeliveryError> {
		let url = network
			.rpc_url
			.parse()
			.map_err(|e| DeliveryError::Network(format!("Invalid RPC URL: {e}")))?;

		let (provider, from) = match &network.private_key {
			Some(key) => {
				let signer: PrivateKeySigner = key
					.with_exposed(|k| k.parse::<PrivateKeySigner>())
					.map_err(|e| DeliveryError::Network(format!("Invalid private key: {e}")))?;
				let sender = signer.address();
				let provider = ProviderBuilder::new()
					.wallet(EthereumWallet::from(signer))
					.connect_http(url)
					.erased();
				debug!(sender = %sender, "Using local signer");
				(provider, None)
			},
			None => {
				let provider = ProviderBuilder::new().connect_http(url).erased();
				let accounts = provider.get_accounts().await.map_err(|e| {
					DeliveryError::Network(format!(
						"Failed to list node accounts at {}: {e}",
						network.rpc_url
					))
				})?;
				let sender = accounts.first().copied().ok_or_else(|| {
					DeliveryError::Network(
						"No private key configured and the node has no unlocked accounts"
							.to_string(),
					)
				})?;
				debug!(sender = %sender, "Using unlocked node account");
				(provider, Some(sender))
			},
		};

		let chain_id = provider.get_chain_id().await.map_err(|e| {
			DeliveryError::Network(format!("Failed to connect to {}: {e}", network.rpc_url))
		})?;
		if let Some(expected) = network.chain_id {
			if expected != chain_id {
				return Err(DeliveryError::Network(format!(
					"Chain id mismatch: configured {expected}, node reports {chain_id}"
				)));
			}
		}
		info!(rpc_url = %network.rpc_url, chain_id, "Connected to network");

		Ok(Self {
			provider,
			from,
			poll_interval: network.poll_interval(),
			min_confirmations: network.min_confirmations.max(1),
		})
	}

	async fn wait_for_receipt(
		&self,
		handle: &TransactionHandle,
	) -> Result<Confirmation, DeliveryError> {
		let hash = handle.hash();
		let receipt = loop {
			match self.provider.get_transaction_receipt(hash).await {
				Ok(Some(receipt)) => break receipt,
				Ok(None) => {},
				Err(e) => {
					warn!(tx_hash = %hash, error = %e, "Failed to fetch receipt, will retry");
				},
			}
			tokio::time::sleep(self.poll_interval).await;
		};

		if !receipt.status() {
			return Err(DeliveryError::Reverted { handle: *handle });
		}
		let address = receipt
			.contract_address
			.ok_or(DeliveryError::MissingContractAddress { handle: *handle })?;

		if let Some(included) = receipt.block_number {
			let target = confirmation_target(included, self.min_confirmations);
			while self.current_block().await < target {
				debug!(tx_hash = %hash, included, target, "Waiting for confirmations");
				tokio::time::sleep(self.poll_interval).await;
			}
		}

		Ok(Confirmation {
			address,
			transaction_hash: receipt.transaction_hash,
			block_number: receipt.block_number,
		})
	}

	/// Latest block, or zero if the node cannot be reached right now.
	async fn current_block(&self) -> u64 {
		match self.provider.get_block_number().await {
			Ok(block) => block,
			Err(e) => {
				warn!(error = %e, "Failed to fetch block number, will retry");
				0
			},
		}
	}
}

/// Block the chain head must reach before a receipt included at `included`
/// has `min_confirmations` confirmations.
fn confirmation_target(included: u64, min_confirmations: u64) -> u64 {
	included.saturating_add(min_confirmations.max(1) - 1)
}

#[async_trait]
impl NetworkClient for AlloyClient {
	async fn submit(
		&self,
		bytecode: Bytes,
		args: Bytes,
	) -> Result<TransactionHandle, DeliveryError> {
		let mut data = bytecode.to_vec();
		data.extend_from_slice(&args);

		let mut request = TransactionRequest::default().with_deploy_code(data);
		if let Some(from) = self.from {
			request = request.from(from);
		}

		debug!(
			data_len = bytecode.len() + args.len(),
			from = ?self.from,
			"Sending contract creation transaction"
		);
		let pending = self
			.provider
			.send_transaction(request)
			.await
			.map_err(|e| DeliveryError::Submission(format!("Failed to send transaction: {e}")))?;

		Ok(TransactionHandle(*pending.tx_hash()))
	}

	async fn confirm(
		&self,
		handle: &TransactionHandle,
		timeout: Duration,
	) -> Result<Confirmation, DeliveryError> {
		tokio::time::timeout(timeout, self.wait_for_receipt(handle))
			.await
			.map_err(|_| DeliveryError::ConfirmationTimeout {
				handle: *handle,
				waited: timeout,
			})?
	}

	async fn chain_id(&self) -> Result<u64, DeliveryError> {
		self.provider
			.get_chain_id()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get chain id: {e}")))
	}

	async fn block_number(&self) -> Result<u64, DeliveryError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get block number: {e}")))
	}

	async fn code_exists(&self, address: Address) -> Result<bool, DeliveryError> {
		let code = self
			.provider
			.get_code_at(address)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get code at {address}: {e}")))?;
		Ok(!code.is_empty())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	// Nothing listens on port 1, so connection attempts fail fast.
	const UNREACHABLE_RPC: &str = "http://127.0.0.1:1";

	fn network_error(result: Result<AlloyClient, DeliveryError>) -> String {
		match result {
			Err(DeliveryError::Network(msg)) => msg,
			Err(other) => panic!("expected network error, got {other}"),
			Ok(_) => panic!("expected connect to fail"),
		}
	}

	#[tokio::test]
	async fn test_connect_invalid_rpc_url() {
		let network = NetworkConfig::new("not a url");

		let msg = network_error(AlloyClient::connect(&network).await);
		assert!(msg.starts_with("Invalid RPC URL"), "{msg}");
	}

	#[tokio::test]
	async fn test_connect_invalid_private_key() {
		let mut network = NetworkConfig::new(UNREACHABLE_RPC);
		network.private_key = Some("0xnot-a-key".into());

		let msg = network_error(AlloyClient::connect(&network).await);
		assert!(msg.starts_with("Invalid private key"), "{msg}");
	}

	#[tokio::test]
	async fn test_connect_with_signer_unreachable_node() {
		let mut network = NetworkConfig::new(UNREACHABLE_RPC);
		network.private_key = Some(ANVIL_KEY.into());

		let msg = network_error(AlloyClient::connect(&network).await);
		assert!(msg.starts_with("Failed to connect to http://127.0.0.1:1"), "{msg}");
	}

	#[tokio::test]
	async fn test_connect_without_signer_unreachable_node() {
		let network = NetworkConfig::new(UNREACHABLE_RPC);

		let msg = network_error(AlloyClient::connect(&network).await);
		assert!(msg.starts_with("Failed to list node accounts"), "{msg}");
	}

	#[test]
	fn test_confirmation_target() {
		assert_eq!(confirmation_target(10, 1), 10);
		assert_eq!(confirmation_target(10, 3), 12);
		assert_eq!(confirmation_target(10, 0), 10);
		assert_eq!(confirmation_target(10, u64::MAX), u64::MAX);
	}
}
