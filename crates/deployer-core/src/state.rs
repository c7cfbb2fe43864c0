//! Per-contract state of a deployment run.
//!
//! Contracts already recorded enter the run as `Confirmed`, contracts with a
//! pending transaction from an earlier run enter as `Submitted`, everything
//! else starts `Pending`. Transitions are validated against the lifecycle
//! defined by [`ContractStatus`].

use deployer_planner::DeploymentPlan;
use deployer_types::{ContractStatus, InvalidTransition, NetworkDeployments};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
	/// Recorded before the run started.
	Recorded,
	/// Submitted by an earlier run, outcome unknown at start.
	Resumed,
	Fresh,
}

#[derive(Debug, Clone)]
struct Entry {
	status: ContractStatus,
	origin: Origin,
}

/// State of every contract in a plan during one run.
#[derive(Debug, Clone)]
pub struct DeploymentRun {
	order: Vec<String>,
	entries: HashMap<String, Entry>,
}

impl DeploymentRun {
	pub fn new(plan: &DeploymentPlan, deployments: &NetworkDeployments) -> Self {
		let mut order = Vec::with_capacity(plan.len());
		let mut entries = HashMap::with_capacity(plan.len());

		for step in plan {
			let (status, origin) = if deployments.is_confirmed(&step.name) {
				(ContractStatus::Confirmed, Origin::Recorded)
			} else if deployments.pending(&step.name).is_some() {
				(ContractStatus::Submitted, Origin::Resumed)
			} else {
				(ContractStatus::Pending, Origin::Fresh)
			};
			order.push(step.name.clone());
			entries.insert(step.name.clone(), Entry { status, origin });
		}

		Self { order, entries }
	}

	pub fn status(&self, contract: &str) -> Option<ContractStatus> {
		self.entries.get(contract).map(|e| e.status)
	}

	/// Returns true if the contract was recorded before this run.
	pub fn is_reused(&self, contract: &str) -> bool {
		self.entries
			.get(contract)
			.is_some_and(|e| e.origin == Origin::Recorded)
	}

	/// Returns true if the contract's transaction was submitted by an
	/// earlier run.
	pub fn is_resumed(&self, contract: &str) -> bool {
		self.entries
			.get(contract)
			.is_some_and(|e| e.origin == Origin::Resumed)
	}

	pub fn mark_submitted(&mut self, contract: &str) -> Result<(), InvalidTransition> {
		self.transition(contract, ContractStatus::Submitted)
	}

	pub fn mark_confirmed(&mut self, contract: &str) -> Result<(), InvalidTransition> {
		self.transition(contract, ContractStatus::Confirmed)
	}

	pub fn mark_failed(&mut self, contract: &str) -> Result<(), InvalidTransition> {
		self.transition(contract, ContractStatus::Failed)
	}

	/// Contracts with their status, in plan order.
	pub fn statuses(&self) -> Vec<(String, ContractStatus)> {
		self.order
			.iter()
			.filter_map(|name| self.status(name).map(|s| (name.clone(), s)))
			.collect()
	}

	fn transition(
		&mut self,
		contract: &str,
		next: ContractStatus,
	) -> Result<(), InvalidTransition> {
		// Contracts outside the plan have no lifecycle; treat them as never started
		let Some(entry) = self.entries.get_mut(contract) else {
			return Err(InvalidTransition {
				from: ContractStatus::Pending,
				to: next,
			});
		};
		entry.status = entry.status.transition(next)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, B256};
	use deployer_planner::{plan, ContractNode};
	use deployer_types::{DeploymentRecord, PendingDeployment};

	fn plan_abc() -> DeploymentPlan {
		plan(&[
			ContractNode::new("A"),
			ContractNode::new("B").depends_on("A"),
			ContractNode::new("C").depends_on("B"),
		])
		.unwrap()
	}

	fn deployments() -> NetworkDeployments {
		let mut deployments = NetworkDeployments::default();
		deployments.contracts.insert(
			"A".into(),
			DeploymentRecord {
				contract: "A".into(),
				address: Address::repeat_byte(1),
				transaction_hash: B256::repeat_byte(1),
				block_number: Some(1),
				deployed_at: 0,
			},
		);
		deployments.pending.insert(
			"B".into(),
			PendingDeployment {
				contract: "B".into(),
				transaction_hash: B256::repeat_byte(2),
				submitted_at: 0,
			},
		);
		deployments
	}

	#[test]
	fn test_initial_statuses() {
		let run = DeploymentRun::new(&plan_abc(), &deployments());

		assert_eq!(
			run.statuses(),
			vec![
				("A".to_string(), ContractStatus::Confirmed),
				("B".to_string(), ContractStatus::Submitted),
				("C".to_string(), ContractStatus::Pending),
			]
		);
		assert!(run.is_reused("A"));
		assert!(run.is_resumed("B"));
		assert!(!run.is_reused("C"));
		assert!(!run.is_resumed("C"));
	}

	#[test]
	fn test_lifecycle() {
		let mut run = DeploymentRun::new(&plan_abc(), &deployments());

		run.mark_confirmed("B").unwrap();
		run.mark_submitted("C").unwrap();
		run.mark_confirmed("C").unwrap();
		assert!(run
			.statuses()
			.iter()
			.all(|(_, status)| *status == ContractStatus::Confirmed));
	}

	#[test]
	fn test_failure_is_terminal() {
		let mut run = DeploymentRun::new(&plan_abc(), &NetworkDeployments::default());

		run.mark_failed("A").unwrap();
		assert_eq!(run.status("A"), Some(ContractStatus::Failed));
		assert!(run.mark_submitted("A").is_err());
	}

	#[test]
	fn test_recorded_contract_cannot_be_resubmitted() {
		let mut run = DeploymentRun::new(&plan_abc(), &deployments());
		let err = run.mark_submitted("A").unwrap_err();
		assert_eq!(err.from, ContractStatus::Confirmed);
		assert_eq!(err.to, ContractStatus::Submitted);
	}

	#[test]
	fn test_unknown_contract() {
		let mut run = DeploymentRun::new(&plan_abc(), &NetworkDeployments::default());
		assert!(run.mark_submitted("Z").is_err());
		assert!(run.status("Z").is_none());
	}
}
