//! Common types for the contract deployer.
//!
//! This crate defines the data model shared by every deployer component:
//! compiled contract artifacts, durable deployment records, the per-network
//! ledger persisted between runs, and the lifecycle status of a contract
//! within a single deployment run.

/// Compiled contract artifacts.
pub mod artifact;
/// Transaction handles returned by network clients.
pub mod handle;
/// Deployment records and the per-network ledger.
pub mod record;
/// Contract lifecycle status within a run.
pub mod status;
/// Small helpers shared across crates.
pub mod utils;

pub use artifact::ContractArtifact;
pub use handle::TransactionHandle;
pub use record::{DeploymentRecord, NetworkDeployments, PendingDeployment};
pub use status::{ContractStatus, InvalidTransition};
pub use utils::{current_timestamp, short_hash};
