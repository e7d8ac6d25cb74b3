//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for trellis runtime behavior.
//!
//! ## Environment Variables
//!
//! ### `TRELLIS_STACK_SIZE`
//!
//! Stack size for watchdog and worker coroutines. Accepts values in:
//! - Decimal: `16384` (16 KB)
//! - Hexadecimal: `0x4000` (16 KB)
//!
//! Default: `0x4000` (16 KB)
//!
//! ### `TRELLIS_POOL_SIZE`
//!
//! Maximum number of idle request contexts retained by the context pool.
//! Contexts above this bound are dropped on release instead of recycled.
//!
//! Default: `256`
//!
//! ### `TRELLIS_TIMEOUT_MS`
//!
//! Request-wide deadline in milliseconds. `0` or unset disables the deadline
//! watchdog entirely.
//!
//! ## Usage
//!
//! ```rust
//! use trellis::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```

use std::env;

/// Runtime configuration loaded from environment variables.
///
/// Load this at startup using [`RuntimeConfig::from_env()`].
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for spawned coroutines in bytes (default: 16 KB / 0x4000)
    pub stack_size: usize,
    /// Maximum idle contexts retained by the pool (default: 256)
    pub pool_size: usize,
    /// Request-wide deadline in milliseconds; `None` disables the watchdog
    pub timeout_ms: Option<u64>,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let stack_size = match env::var("TRELLIS_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(0x4000)
                } else {
                    val.parse().unwrap_or(0x4000)
                }
            }
            Err(_) => 0x4000,
        };

        let pool_size = env::var("TRELLIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256);

        let timeout_ms = env::var("TRELLIS_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&ms| ms > 0);

        RuntimeConfig {
            stack_size,
            pool_size,
            timeout_ms,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            stack_size: 0x4000,
            pool_size: 256,
            timeout_ms: None,
        }
    }
}
