//! Configuration for a certrunner invocation.
//!
//! Everything the orchestrator needs is resolved once at process start:
//! command line arguments, the declarative job config, the SSH
//! connection settings for the device under test, and the workspace
//! layout that maps declared asset names to concrete paths.

pub mod cli_args;
pub mod connection_config;
pub mod job_config;
pub mod layout;

pub use cli_args::{CliArgs, ExecutionMode};
pub use connection_config::ConnectionConfig;
pub use job_config::JobConfig;
pub use layout::WorkspaceLayout;
