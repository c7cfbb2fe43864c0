//! Configuration module for the contract deployer.
//!
//! Configuration is loaded from a TOML file that declares the target
//! networks, the contracts to deploy and their dependencies, and the retry
//! behaviour for transaction submission. String values may reference
//! environment variables as `${VAR}` or `${VAR:-default}`.
//!
//! ```toml
//! [deployer]
//! artifacts_dir = "build/contracts"
//! records_path = "deployments.json"
//!
//! [networks.development]
//! rpc_url = "http://127.0.0.1:7545"
//!
//! [[contracts]]
//! name = "WafLog"
//! ```

pub mod contracts;
pub mod secret;

pub use contracts::{ConstructorArg, ContractConfig};
pub use secret::SecretString;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level deployer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Locations of artifacts and persisted records.
	#[serde(default)]
	pub deployer: DeployerConfig,
	/// Target networks keyed by network name.
	pub networks: BTreeMap<String, NetworkConfig>,
	/// Retry behaviour for transaction submission.
	#[serde(default)]
	pub submission: SubmissionConfig,
	/// Contracts to deploy, in declaration order.
	#[serde(default)]
	pub contracts: Vec<ContractConfig>,
}

/// Filesystem locations used by the deployer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeployerConfig {
	/// Directory containing compiled contract artifacts.
	#[serde(default = "default_artifacts_dir")]
	pub artifacts_dir: PathBuf,
	/// JSON file holding deployment records for every network.
	#[serde(default = "default_records_path")]
	pub records_path: PathBuf,
}

impl Default for DeployerConfig {
	fn default() -> Self {
		Self {
			artifacts_dir: default_artifacts_dir(),
			records_path: default_records_path(),
		}
	}
}

/// Connection and confirmation settings for one network.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// HTTP JSON-RPC endpoint.
	pub rpc_url: String,
	/// Expected chain id; checked against the node when set.
	#[serde(default)]
	pub chain_id: Option<u64>,
	/// Key used to sign deployments. When absent, transactions are sent
	/// from the node's first unlocked account.
	#[serde(default)]
	pub private_key: Option<SecretString>,
	/// Upper bound for waiting on a deployment confirmation.
	#[serde(default = "default_confirmation_timeout_seconds")]
	pub confirmation_timeout_seconds: u64,
	/// Interval between receipt polls.
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// Blocks required on top of the inclusion block, inclusive.
	#[serde(default = "default_min_confirmations")]
	pub min_confirmations: u64,
}

impl NetworkConfig {
	/// Creates a network config with default timings.
	pub fn new(rpc_url: impl Into<String>) -> Self {
		Self {
			rpc_url: rpc_url.into(),
			chain_id: None,
			private_key: None,
			confirmation_timeout_seconds: default_confirmation_timeout_seconds(),
			poll_interval_ms: default_poll_interval_ms(),
			min_confirmations: default_min_confirmations(),
		}
	}

	/// Confirmation timeout as a `Duration`.
	pub fn confirmation_timeout(&self) -> Duration {
		Duration::from_secs(self.confirmation_timeout_seconds)
	}

	/// Receipt poll interval as a `Duration`.
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}

/// Retry settings for submitting deployment transactions.
///
/// Only submission is retried. A confirmation timeout is never retried
/// automatically because the transaction may still be mined.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmissionConfig {
	/// Total attempts including the first one.
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	/// Backoff before the second attempt; doubled after each failure.
	#[serde(default = "default_initial_backoff_ms")]
	pub initial_backoff_ms: u64,
	/// Cap for the backoff.
	#[serde(default = "default_max_backoff_ms")]
	pub max_backoff_ms: u64,
}

impl Default for SubmissionConfig {
	fn default() -> Self {
		Self {
			max_attempts: default_max_attempts(),
			initial_backoff_ms: default_initial_backoff_ms(),
			max_backoff_ms: default_max_backoff_ms(),
		}
	}
}

fn default_artifacts_dir() -> PathBuf {
	PathBuf::from("build/contracts")
}

fn default_records_path() -> PathBuf {
	PathBuf::from("deployments.json")
}

fn default_confirmation_timeout_seconds() -> u64 {
	120
}

fn default_poll_interval_ms() -> u64 {
	1000
}

fn default_min_confirmations() -> u64 {
	1
}

fn default_max_attempts() -> u32 {
	3
}

fn default_initial_backoff_ms() -> u64 {
	500
}

fn default_max_backoff_ms() -> u64 {
	8000
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable
/// `VAR_NAME`. Supports default values with `${VAR_NAME:-default_value}`.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {e}")))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{var_name}' not found"
					)))
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply in reverse so earlier offsets stay valid
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a TOML file.
	///
	/// Relative `artifacts_dir` and `records_path` values are resolved
	/// against the directory containing the configuration file.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Failed to read {}: {e}", path.display()),
			))
		})?;

		let mut config: Config = contents.parse()?;
		if let Some(base_dir) = path.parent() {
			config.resolve_paths(base_dir);
		}
		Ok(config)
	}

	/// Returns the configuration for a named network.
	pub fn network(&self, name: &str) -> Result<&NetworkConfig, ConfigError> {
		self.networks.get(name).ok_or_else(|| {
			let known = self.networks.keys().cloned().collect::<Vec<_>>().join(", ");
			ConfigError::Validation(format!("Unknown network '{name}' (configured: {known})"))
		})
	}

	fn resolve_paths(&mut self, base_dir: &Path) {
		if self.deployer.artifacts_dir.is_relative() {
			self.deployer.artifacts_dir = base_dir.join(&self.deployer.artifacts_dir);
		}
		if self.deployer.records_path.is_relative() {
			self.deployer.records_path = base_dir.join(&self.deployer.records_path);
		}
	}

	/// Validates the configuration.
	///
	/// Checks network settings, contract name uniqueness, that every
	/// dependency names a declared contract, and that literal arguments have
	/// an ABI representation. Dependency cycles are left to the planner.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"At least one network must be configured".into(),
			));
		}

		for (name, network) in &self.networks {
			if network.rpc_url.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network '{name}' must have an rpc_url"
				)));
			}
			if network.confirmation_timeout_seconds == 0 {
				return Err(ConfigError::Validation(format!(
					"Network '{name}': confirmation_timeout_seconds must be greater than 0"
				)));
			}
			if network.poll_interval_ms == 0 {
				return Err(ConfigError::Validation(format!(
					"Network '{name}': poll_interval_ms must be greater than 0"
				)));
			}
			if network.min_confirmations == 0 {
				return Err(ConfigError::Validation(format!(
					"Network '{name}': min_confirmations must be at least 1"
				)));
			}
			if network.private_key.as_ref().is_some_and(SecretString::is_empty) {
				return Err(ConfigError::Validation(format!(
					"Network '{name}': private_key is set but empty"
				)));
			}
		}

		if self.submission.max_attempts == 0 {
			return Err(ConfigError::Validation(
				"submission.max_attempts must be at least 1".into(),
			));
		}
		if self.submission.initial_backoff_ms > self.submission.max_backoff_ms {
			return Err(ConfigError::Validation(
				"submission.initial_backoff_ms cannot exceed submission.max_backoff_ms".into(),
			));
		}

		let mut names = HashSet::new();
		for contract in &self.contracts {
			if contract.name.trim().is_empty() {
				return Err(ConfigError::Validation("Contract name cannot be empty".into()));
			}
			if !names.insert(contract.name.as_str()) {
				return Err(ConfigError::Validation(format!(
					"Contract '{}' is declared more than once",
					contract.name
				)));
			}
		}

		for contract in &self.contracts {
			for dependency in contract.dependencies() {
				if !names.contains(dependency.as_str()) {
					return Err(ConfigError::Validation(format!(
						"Contract '{}' depends on undeclared contract '{}'",
						contract.name, dependency
					)));
				}
			}
			for (index, arg) in contract.args.iter().enumerate() {
				if arg.reference().is_none() && arg.literal().is_none() {
					return Err(ConfigError::Validation(format!(
						"Contract '{}': argument {} has no ABI representation",
						contract.name, index
					)));
				}
			}
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved before parsing and the result is
/// validated.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BASIC: &str = r#"
[networks.development]
rpc_url = "http://127.0.0.1:7545"

[[contracts]]
name = "WafLog"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("DEPLOYER_TEST_HOST", "localhost");
		std::env::set_var("DEPLOYER_TEST_PORT", "8545");

		let input = "rpc_url = \"http://${DEPLOYER_TEST_HOST}:${DEPLOYER_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "rpc_url = \"http://localhost:8545\"");

		std::env::remove_var("DEPLOYER_TEST_HOST");
		std::env::remove_var("DEPLOYER_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${DEPLOYER_MISSING_VAR:-fallback}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${DEPLOYER_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.unwrap_err().to_string().contains("DEPLOYER_MISSING_VAR"));
	}

	#[test]
	fn test_basic_config_defaults() {
		let config: Config = BASIC.parse().unwrap();

		assert_eq!(config.deployer.artifacts_dir, PathBuf::from("build/contracts"));
		assert_eq!(config.deployer.records_path, PathBuf::from("deployments.json"));
		assert_eq!(config.submission.max_attempts, 3);

		let network = config.network("development").unwrap();
		assert_eq!(network.confirmation_timeout(), Duration::from_secs(120));
		assert_eq!(network.poll_interval(), Duration::from_millis(1000));
		assert_eq!(network.min_confirmations, 1);
		assert!(network.private_key.is_none());

		assert_eq!(config.contracts.len(), 1);
		assert_eq!(config.contracts[0].name, "WafLog");
	}

	#[test]
	fn test_full_config() {
		std::env::set_var(
			"DEPLOYER_TEST_KEY",
			"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
		);

		let config: Config = r#"
[deployer]
artifacts_dir = "out"
records_path = "records/deployments.json"

[networks.sepolia]
rpc_url = "https://rpc.example.org"
chain_id = 11155111
private_key = "${DEPLOYER_TEST_KEY}"
confirmation_timeout_seconds = 600
min_confirmations = 3

[submission]
max_attempts = 5
initial_backoff_ms = 100
max_backoff_ms = 1000

[[contracts]]
name = "Token"
args = ["Test Token", "TST", 18]

[[contracts]]
name = "Vault"
depends_on = ["Token"]
args = [{ contract = "Token" }]
"#
		.parse()
		.unwrap();

		let network = config.network("sepolia").unwrap();
		assert_eq!(network.chain_id, Some(11155111));
		assert_eq!(network.min_confirmations, 3);
		assert!(network
			.private_key
			.as_ref()
			.unwrap()
			.with_exposed(|k| k.starts_with("0xac09")));
		assert_eq!(config.submission.max_attempts, 5);
		assert_eq!(config.contracts[1].name, "Vault");
		assert_eq!(config.contracts[1].dependencies(), vec!["Token"]);

		std::env::remove_var("DEPLOYER_TEST_KEY");
	}

	#[test]
	fn test_unknown_network() {
		let config: Config = BASIC.parse().unwrap();
		let err = config.network("mainnet").unwrap_err();
		assert!(err.to_string().contains("Unknown network 'mainnet'"));
		assert!(err.to_string().contains("development"));
	}

	#[test]
	fn test_no_networks_rejected() {
		let result = "[networks]\n".parse::<Config>();
		assert!(matches!(result, Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_duplicate_contract_rejected() {
		let input = format!("{BASIC}\n[[contracts]]\nname = \"WafLog\"\n");
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("declared more than once"));
	}

	#[test]
	fn test_undeclared_dependency_rejected() {
		let input = format!("{BASIC}\n[[contracts]]\nname = \"Registry\"\ndepends_on = [\"Missing\"]\n");
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("undeclared contract 'Missing'"));
	}

	#[test]
	fn test_undeclared_reference_rejected() {
		let input = format!(
			"{BASIC}\n[[contracts]]\nname = \"Registry\"\nargs = [{{ contract = \"Missing\" }}]\n"
		);
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("undeclared contract 'Missing'"));
	}

	#[test]
	fn test_table_argument_rejected() {
		let input = format!(
			"{BASIC}\n[[contracts]]\nname = \"Registry\"\nargs = [{{ owner = \"0x00\" }}]\n"
		);
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("no ABI representation"));
	}

	#[test]
	fn test_zero_timeout_rejected() {
		let input = r#"
[networks.development]
rpc_url = "http://127.0.0.1:7545"
confirmation_timeout_seconds = 0
"#;
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("confirmation_timeout_seconds"));
	}

	#[test]
	fn test_zero_attempts_rejected() {
		let input = format!("{BASIC}\n[submission]\nmax_attempts = 0\n");
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("max_attempts"));
	}

	#[tokio::test]
	async fn test_from_file_resolves_relative_paths() {
		let dir = tempfile::TempDir::new().unwrap();
		let path = dir.path().join("deployer.toml");
		tokio::fs::write(&path, BASIC).await.unwrap();

		let config = Config::from_file(&path).await.unwrap();
		assert_eq!(
			config.deployer.artifacts_dir,
			dir.path().join("build/contracts")
		);
		assert_eq!(config.deployer.records_path, dir.path().join("deployments.json"));
	}

	#[tokio::test]
	async fn test_from_file_missing() {
		let result = Config::from_file("/nonexistent/deployer.toml").await;
		assert!(matches!(result, Err(ConfigError::Io(_))));
	}
}
