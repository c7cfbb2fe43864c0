//! Command-line interface definitions and parsing.

pub mod output;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Deploys compiled contracts to a network in dependency order and records
/// their addresses.
#[derive(Parser, Debug)]
#[command(name = "deployer")]
#[command(about = "Contract deployment orchestrator")]
#[command(version)]
pub struct Cli {
	/// Configuration file
	#[arg(
		short,
		long,
		global = true,
		env = "DEPLOYER_CONFIG",
		default_value = "deployer.toml"
	)]
	pub config: PathBuf,

	/// Enable debug logging
	#[arg(short, long, global = true)]
	pub verbose: bool,

	#[command(subcommand)]
	pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Deploy contracts that are not recorded yet
	Deploy(DeployArgs),

	/// Show the deployment plan and the state of each step
	Plan(PlanArgs),

	/// Show network connection status and recorded deployments
	Status {
		/// Target network name
		network: String,
	},

	/// List loadable contract artifacts
	Artifacts,
}

#[derive(Args, Debug)]
pub struct DeployArgs {
	/// Target network name
	pub network: String,

	/// Deploy only these contracts and their dependencies
	#[arg(long = "only", value_name = "NAME")]
	pub only: Vec<String>,

	/// Simulate the deployment without sending transactions or writing records
	#[arg(long)]
	pub dry_run: bool,

	/// Drop pending transactions from earlier runs and submit again
	#[arg(long)]
	pub discard_pending: bool,

	/// Skip checking that recorded addresses still hold code
	#[arg(long)]
	pub no_verify: bool,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
	/// Target network name
	pub network: String,

	/// Plan only these contracts and their dependencies
	#[arg(long = "only", value_name = "NAME")]
	pub only: Vec<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_deploy() {
		let cli = Cli::try_parse_from([
			"deployer",
			"deploy",
			"development",
			"--only",
			"Vault",
			"--only",
			"Token",
			"--dry-run",
		])
		.unwrap();

		assert_eq!(cli.config, PathBuf::from("deployer.toml"));
		match cli.command {
			Commands::Deploy(args) => {
				assert_eq!(args.network, "development");
				assert_eq!(args.only, vec!["Vault", "Token"]);
				assert!(args.dry_run);
				assert!(!args.discard_pending);
				assert!(!args.no_verify);
			},
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn test_global_config_flag() {
		let cli = Cli::try_parse_from(["deployer", "status", "sepolia", "--config", "other.toml"])
			.unwrap();
		assert_eq!(cli.config, PathBuf::from("other.toml"));
		assert!(matches!(cli.command, Commands::Status { ref network } if network == "sepolia"));
	}

	#[test]
	fn test_network_is_required() {
		assert!(Cli::try_parse_from(["deployer", "deploy"]).is_err());
	}

	#[test]
	fn test_verify_cli() {
		use clap::CommandFactory;
		Cli::command().debug_assert();
	}
}
