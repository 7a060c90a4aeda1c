//! Command-line and action-input models for the dispatch binary.
//!
//! Every input can come from a flag or from the `INPUT_*` environment variables
//! GitHub Actions sets; validated inputs are turned into runtime configs here.

pub mod cli_args;
pub mod input_error;
pub mod runtime_configs;

pub use cli_args::{Cli, CliAssignArgs, CliCleanupReleasesArgs, CliCommand, CliGithubFlags};
pub use input_error::InputError;
pub use runtime_configs::*;
