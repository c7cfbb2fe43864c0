//! Dependency planner for contract deployments.
//!
//! Turns a list of contract declarations into a [`DeploymentPlan`]: an order
//! in which every contract appears after all of its dependencies. Among
//! contracts that are ready at the same time, declaration order wins, so the
//! same configuration always yields the same plan.

use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while building a plan.
///
/// A plan is never returned partially: any error means nothing may be
/// deployed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
	/// The dependency graph contains a cycle. The first and last entries of
	/// `cycle` are the same contract.
	#[error("Cyclic dependency: {}", .cycle.join(" -> "))]
	CyclicDependency { cycle: Vec<String> },
	/// A contract depends on a name that is not declared.
	#[error("Contract '{contract}' depends on undeclared contract '{dependency}'")]
	UnknownDependency { contract: String, dependency: String },
	/// The same contract name is declared twice.
	#[error("Contract '{0}' is declared more than once")]
	DuplicateContract(String),
	/// A filter names a contract that is not declared.
	#[error("Unknown contract: {0}")]
	UnknownContract(String),
}

/// A contract declaration as seen by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractNode {
	pub name: String,
	pub dependencies: Vec<String>,
}

impl ContractNode {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			dependencies: Vec::new(),
		}
	}

	pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
		self.dependencies.push(dependency.into());
		self
	}
}

/// One contract in a plan together with its dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
	pub name: String,
	pub dependencies: Vec<String>,
}

/// Contracts in deployment order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentPlan {
	steps: Vec<PlanStep>,
}

impl DeploymentPlan {
	pub fn steps(&self) -> &[PlanStep] {
		&self.steps
	}

	/// Contract names in deployment order.
	pub fn names(&self) -> Vec<&str> {
		self.steps.iter().map(|s| s.name.as_str()).collect()
	}

	pub fn len(&self) -> usize {
		self.steps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}
}

impl<'a> IntoIterator for &'a DeploymentPlan {
	type Item = &'a PlanStep;
	type IntoIter = std::slice::Iter<'a, PlanStep>;

	fn into_iter(self) -> Self::IntoIter {
		self.steps.iter()
	}
}

/// Orders every declared contract.
pub fn plan(nodes: &[ContractNode]) -> Result<DeploymentPlan, PlanError> {
	let graph = Graph::build(nodes)?;
	let order = graph.topological_order()?;

	let steps = order
		.into_iter()
		.map(|i| PlanStep {
			name: nodes[i].name.clone(),
			dependencies: graph.deps[i].iter().map(|&d| nodes[d].name.clone()).collect(),
		})
		.collect::<Vec<_>>();

	debug!(
		order = ?steps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
		"Computed deployment plan"
	);
	Ok(DeploymentPlan { steps })
}

/// Orders the contracts named in `filter` and everything they depend on,
/// directly or transitively.
///
/// The whole declaration set is validated, so a cycle anywhere is reported
/// even if the filtered contracts are not part of it. An empty filter plans
/// every contract.
pub fn plan_filtered(
	nodes: &[ContractNode],
	filter: &[String],
) -> Result<DeploymentPlan, PlanError> {
	let full = plan(nodes)?;
	if filter.is_empty() {
		return Ok(full);
	}

	let by_name: HashMap<&str, &PlanStep> =
		full.steps.iter().map(|s| (s.name.as_str(), s)).collect();

	let mut included: HashSet<&str> = HashSet::new();
	let mut stack: Vec<&str> = Vec::new();
	for name in filter {
		if !by_name.contains_key(name.as_str()) {
			return Err(PlanError::UnknownContract(name.clone()));
		}
		stack.push(name);
	}

	while let Some(name) = stack.pop() {
		if !included.insert(name) {
			continue;
		}
		if let Some(step) = by_name.get(name) {
			stack.extend(step.dependencies.iter().map(String::as_str));
		}
	}

	// A subsequence of a topological order is still a topological order
	let steps = full
		.steps
		.iter()
		.filter(|s| included.contains(s.name.as_str()))
		.cloned()
		.collect();
	Ok(DeploymentPlan { steps })
}

/// Index-based adjacency built from declarations.
struct Graph<'a> {
	nodes: &'a [ContractNode],
	/// Dependencies of each node, deduplicated, in declared order.
	deps: Vec<Vec<usize>>,
	/// Nodes depending on each node.
	dependents: Vec<Vec<usize>>,
}

impl<'a> Graph<'a> {
	fn build(nodes: &'a [ContractNode]) -> Result<Self, PlanError> {
		let mut index: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
		for (i, node) in nodes.iter().enumerate() {
			if index.insert(node.name.as_str(), i).is_some() {
				return Err(PlanError::DuplicateContract(node.name.clone()));
			}
		}

		let mut deps = vec![Vec::new(); nodes.len()];
		let mut dependents = vec![Vec::new(); nodes.len()];
		for (i, node) in nodes.iter().enumerate() {
			for dependency in &node.dependencies {
				let &d = index.get(dependency.as_str()).ok_or_else(|| {
					PlanError::UnknownDependency {
						contract: node.name.clone(),
						dependency: dependency.clone(),
					}
				})?;
				if !deps[i].contains(&d) {
					deps[i].push(d);
					dependents[d].push(i);
				}
			}
		}

		Ok(Self {
			nodes,
			deps,
			dependents,
		})
	}

	/// Kahn's algorithm with the ready set ordered by declaration index.
	fn topological_order(&self) -> Result<Vec<usize>, PlanError> {
		let mut remaining: Vec<usize> = self.deps.iter().map(Vec::len).collect();
		let mut ready: BTreeSet<usize> = remaining
			.iter()
			.enumerate()
			.filter(|(_, &count)| count == 0)
			.map(|(i, _)| i)
			.collect();

		let mut order = Vec::with_capacity(self.nodes.len());
		while let Some(i) = ready.pop_first() {
			order.push(i);
			for &dependent in &self.dependents[i] {
				remaining[dependent] -= 1;
				if remaining[dependent] == 0 {
					ready.insert(dependent);
				}
			}
		}

		if order.len() < self.nodes.len() {
			return Err(PlanError::CyclicDependency {
				cycle: self.find_cycle(&remaining),
			});
		}
		Ok(order)
	}

	/// Extracts one cycle from the nodes Kahn's algorithm could not place.
	///
	/// Every unplaced node still waits on at least one unplaced dependency,
	/// so following those edges from any unplaced node must revisit a node.
	fn find_cycle(&self, remaining: &[usize]) -> Vec<String> {
		let blocked = |i: usize| remaining[i] > 0;
		let Some(start) = (0..self.nodes.len()).find(|&i| blocked(i)) else {
			return Vec::new();
		};

		let mut path: Vec<usize> = Vec::new();
		let mut current = start;
		loop {
			if let Some(pos) = path.iter().position(|&p| p == current) {
				let mut cycle: Vec<String> = path[pos..]
					.iter()
					.map(|&i| self.nodes[i].name.clone())
					.collect();
				cycle.push(self.nodes[current].name.clone());
				return cycle;
			}
			path.push(current);
			match self.deps[current].iter().copied().find(|&d| blocked(d)) {
				Some(next) => current = next,
				None => return Vec::new(),
			}
		}
	}
}
