//! In-process network used for dry runs.
//!
//! Addresses follow the CREATE rule for a fixed deployer account, so a dry
//! run reports the addresses a fresh deployment from that account would get.
//! Nothing leaves the process.

use crate::{Confirmation, DeliveryError, NetworkClient};
use alloy_primitives::{address, keccak256, Address, Bytes, B256};
use async_trait::async_trait;
use deployer_types::TransactionHandle;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

/// Account that "sends" simulated deployments.
pub const SIMULATED_DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

#[derive(Default)]
struct ChainState {
	nonce: u64,
	block: u64,
	submitted: HashMap<B256, Address>,
	code: HashSet<Address>,
}

/// Deterministic simulated network.
pub struct SimulatedClient {
	chain_id: u64,
	deployer: Address,
	state: Mutex<ChainState>,
}

impl SimulatedClient {
	pub fn new(chain_id: u64) -> Self {
		Self {
			chain_id,
			deployer: SIMULATED_DEPLOYER,
			state: Mutex::new(ChainState::default()),
		}
	}

	/// Marks addresses as already holding code, e.g. previously recorded
	/// deployments.
	pub fn with_code(self, addresses: impl IntoIterator<Item = Address>) -> Self {
		let mut state = self.state.into_inner();
		state.code.extend(addresses);
		Self {
			chain_id: self.chain_id,
			deployer: self.deployer,
			state: Mutex::new(state),
		}
	}
}

#[async_trait]
impl NetworkClient for SimulatedClient {
	async fn submit(
		&self,
		bytecode: Bytes,
		args: Bytes,
	) -> Result<TransactionHandle, DeliveryError> {
		if bytecode.is_empty() {
			return Err(DeliveryError::Submission("empty creation bytecode".into()));
		}

		let mut state = self.state.lock().await;
		let address = self.deployer.create(state.nonce);

		let mut preimage = Vec::with_capacity(28 + bytecode.len() + args.len());
		preimage.extend_from_slice(self.deployer.as_slice());
		preimage.extend_from_slice(&state.nonce.to_be_bytes());
		preimage.extend_from_slice(&bytecode);
		preimage.extend_from_slice(&args);
		let hash = keccak256(&preimage);

		state.nonce += 1;
		state.submitted.insert(hash, address);
		Ok(TransactionHandle(hash))
	}

	/// Confirms immediately. A handle this client never issued is reported
	/// as a timeout since its outcome cannot be known.
	async fn confirm(
		&self,
		handle: &TransactionHandle,
		_timeout: Duration,
	) -> Result<Confirmation, DeliveryError> {
		let mut state = self.state.lock().await;
		let Some(address) = state.submitted.remove(&handle.hash()) else {
			return Err(DeliveryError::ConfirmationTimeout {
				handle: *handle,
				waited: Duration::ZERO,
			});
		};

		state.block += 1;
		state.code.insert(address);
		Ok(Confirmation {
			address,
			transaction_hash: handle.hash(),
			block_number: Some(state.block),
		})
	}

	async fn chain_id(&self) -> Result<u64, DeliveryError> {
		Ok(self.chain_id)
	}

	async fn block_number(&self) -> Result<u64, DeliveryError> {
		Ok(self.state.lock().await.block)
	}

	async fn code_exists(&self, address: Address) -> Result<bool, DeliveryError> {
		Ok(self.state.lock().await.code.contains(&address))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_addresses_follow_create_rule() {
		let client = SimulatedClient::new(1337);
		let code = Bytes::from(vec![0x60, 0x80]);

		let first = client.submit(code.clone(), Bytes::new()).await.unwrap();
		let second = client.submit(code, Bytes::new()).await.unwrap();
		assert_ne!(first, second);

		let confirmation = client.confirm(&first, Duration::from_secs(1)).await.unwrap();
		assert_eq!(confirmation.address, SIMULATED_DEPLOYER.create(0));
		assert_eq!(confirmation.block_number, Some(1));
		assert!(client.code_exists(confirmation.address).await.unwrap());

		let confirmation = client.confirm(&second, Duration::from_secs(1)).await.unwrap();
		assert_eq!(confirmation.address, SIMULATED_DEPLOYER.create(1));
		assert_eq!(client.block_number().await.unwrap(), 2);
	}

	#[tokio::test]
	async fn test_unknown_handle_is_ambiguous() {
		let client = SimulatedClient::new(1337);
		let err = client
			.confirm(&TransactionHandle(B256::repeat_byte(9)), Duration::from_secs(1))
			.await
			.unwrap_err();
		assert!(err.is_ambiguous());
	}

	#[tokio::test]
	async fn test_seeded_code() {
		let recorded = Address::repeat_byte(0x42);
		let client = SimulatedClient::new(1337).with_code([recorded]);

		assert!(client.code_exists(recorded).await.unwrap());
		assert!(!client.code_exists(Address::ZERO).await.unwrap());
		assert_eq!(client.chain_id().await.unwrap(), 1337);
	}

	#[tokio::test]
	async fn test_empty_bytecode_rejected() {
		let client = SimulatedClient::new(1337);
		let err = client.submit(Bytes::new(), Bytes::new()).await.unwrap_err();
		assert!(matches!(err, DeliveryError::Submission(_)));
	}
}
