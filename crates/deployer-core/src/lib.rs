//! Core engine of the contract deployer.
//!
//! Ties the artifact registry, the dependency planner, the deployment
//! executor and the record store together into a resumable deployment run.

pub mod args;
pub mod orchestrator;
pub mod state;

pub use args::{encode_constructor_args, validate_constructor_args, ArgumentError};
pub use orchestrator::{
	preview, ContractFailure, Orchestrator, OrchestratorError, RunOptions, RunOutcome, RunReport,
	StepPreview, StepState,
};
pub use state::DeploymentRun;
