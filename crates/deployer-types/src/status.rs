//! Contract lifecycle status within a deployment run.
//!
//! Contracts move through `Pending -> Submitted -> Confirmed` or end in
//! `Failed`. A contract can also fail straight from `Pending` when no
//! transaction was ever accepted by the network. `Confirmed` and `Failed`
//! are terminal for the run.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Status of a single contract within a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
	/// Not yet submitted in this run.
	Pending,
	/// Deployment transaction accepted by the network, awaiting confirmation.
	Submitted,
	/// Deployment confirmed and recorded.
	Confirmed,
	/// Deployment failed; retryable in a later run.
	Failed,
}

/// Error returned for a transition the lifecycle does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid status transition from {from} to {to}")]
pub struct InvalidTransition {
	pub from: ContractStatus,
	pub to: ContractStatus,
}

impl ContractStatus {
	/// Checks whether moving from `self` to `next` is allowed.
	pub fn can_transition_to(self, next: ContractStatus) -> bool {
		use ContractStatus::*;
		matches!(
			(self, next),
			(Pending, Submitted) | (Pending, Failed) | (Submitted, Confirmed) | (Submitted, Failed)
		)
	}

	/// Returns the next status or an error if the transition is invalid.
	pub fn transition(self, next: ContractStatus) -> Result<ContractStatus, InvalidTransition> {
		if self.can_transition_to(next) {
			Ok(next)
		} else {
			Err(InvalidTransition {
				from: self,
				to: next,
			})
		}
	}
}

impl fmt::Display for ContractStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ContractStatus::Pending => "pending",
			ContractStatus::Submitted => "submitted",
			ContractStatus::Confirmed => "confirmed",
			ContractStatus::Failed => "failed",
		};
		f.write_str(s)
	}
}
