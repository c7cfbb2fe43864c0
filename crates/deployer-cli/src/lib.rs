//! Command-line front end of the contract deployer.
//!
//! The `deployer` binary parses arguments with [`cli::Cli`], builds a
//! [`Context`] from the configuration file and dispatches to
//! [`CommandHandler`].

pub mod cli;
pub mod commands;
pub mod context;

pub use commands::CommandHandler;
pub use context::Context;
