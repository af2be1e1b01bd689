//! # Runtime Configuration
//!
//! Coroutine runtime settings read from the environment at startup.
//!
//! ### `TOKENGATE_STACK_SIZE`
//!
//! Stack size for request coroutines, decimal (`16384`) or hex (`0x4000`).
//! Default: `0x4000` (16 KB). Introspection runs a blocking HTTP client on the
//! request coroutine; raise this if stack overflows show up under load.
//!
//! ```rust
//! use tokengate::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! may::config().set_stack_size(config.stack_size);
//! ```

use std::env;

const DEFAULT_STACK_SIZE: usize = 0x4000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        RuntimeConfig {
            stack_size: env::var("TOKENGATE_STACK_SIZE")
                .ok()
                .map_or(DEFAULT_STACK_SIZE, |v| parse_stack_size(&v)),
        }
    }
}

fn parse_stack_size(val: &str) -> usize {
    let parsed = match val.trim().strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.trim().parse().ok(),
    };
    parsed.filter(|&n| n > 0).unwrap_or(DEFAULT_STACK_SIZE)
}
