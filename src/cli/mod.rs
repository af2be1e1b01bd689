//! # CLI Module
//!
//! Command-line entry points for the `tokengate` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Load the configuration, build the gateway and serve `POST /validate`
//! until SIGINT or SIGTERM:
//!
//! ```bash
//! tokengate serve --config tokengate.yaml --addr 0.0.0.0:8080
//! ```
//!
//! ### `check`
//!
//! Load and validate a configuration file, printing a summary with the
//! client secret redacted:
//!
//! ```bash
//! TOKENGATE_CLIENT_SECRET=... tokengate check --config tokengate.yaml
//! ```
//!
//! Both commands also read the config path from `TOKENGATE_CONFIG`.

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{run_cli, Cli, Commands};
