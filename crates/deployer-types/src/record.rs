//! Deployment records and the per-network deployment ledger.
//!
//! A [`DeploymentRecord`] is the durable output of deploying one contract.
//! [`NetworkDeployments`] groups the records of one target network together
//! with any [`PendingDeployment`] whose outcome is still unknown.

use crate::TransactionHandle;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Confirmed deployment of a single contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
	/// Logical contract name.
	pub contract: String,
	/// Address the contract was deployed to.
	pub address: Address,
	/// Hash of the deployment transaction.
	pub transaction_hash: B256,
	/// Block the deployment transaction was included in.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub block_number: Option<u64>,
	/// Unix timestamp at which the deployment was confirmed.
	pub deployed_at: u64,
}

/// Deployment transaction that was submitted but never confirmed.
///
/// Written before waiting for confirmation so a run that times out (or
/// crashes) leaves a trace of the transaction. The next run checks this
/// transaction before submitting a new one, which prevents double
/// deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeployment {
	/// Logical contract name.
	pub contract: String,
	/// Hash of the submitted deployment transaction.
	pub transaction_hash: B256,
	/// Unix timestamp of the submission.
	pub submitted_at: u64,
}

impl PendingDeployment {
	/// Handle for the pending transaction.
	pub fn handle(&self) -> TransactionHandle {
		TransactionHandle(self.transaction_hash)
	}
}

/// Everything persisted for one target network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDeployments {
	/// Confirmed records keyed by contract name.
	#[serde(default)]
	pub contracts: BTreeMap<String, DeploymentRecord>,
	/// Submitted but unconfirmed deployments keyed by contract name.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub pending: BTreeMap<String, PendingDeployment>,
}

impl NetworkDeployments {
	/// Returns the confirmed record for a contract, if any.
	pub fn record(&self, contract: &str) -> Option<&DeploymentRecord> {
		self.contracts.get(contract)
	}

	/// Returns the pending deployment for a contract, if any.
	pub fn pending(&self, contract: &str) -> Option<&PendingDeployment> {
		self.pending.get(contract)
	}

	/// Returns true if the contract has a confirmed record.
	pub fn is_confirmed(&self, contract: &str) -> bool {
		self.contracts.contains_key(contract)
	}

	/// Address of a confirmed contract.
	pub fn address_of(&self, contract: &str) -> Option<Address> {
		self.contracts.get(contract).map(|r| r.address)
	}

	/// Returns true if nothing has been recorded for the network.
	pub fn is_empty(&self) -> bool {
		self.contracts.is_empty() && self.pending.is_empty()
	}
}
