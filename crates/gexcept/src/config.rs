//! Environment-driven configuration
//!
//! All knobs are read from `GEX_*` environment variables with typed
//! defaults, via the `env_get` family.
//!
//! | Variable           | Default | Effect |
//! |--------------------|---------|--------|
//! | `GEX_LOG_LEVEL`    | `info`  | `off`, `fatal`, `error`, `warn`, `info`, `debug`, `trace` (or 0..6) |
//! | `GEX_FLUSH_EPRINT` | off     | Flush stderr after every log record |
//! | `GEX_BACKTRACE`    | on      | Capture call stacks when exceptions are constructed |

use std::str::FromStr;

use crate::kprint::LogLevel;

pub const ENV_LOG_LEVEL: &str = "GEX_LOG_LEVEL";
pub const ENV_FLUSH_EPRINT: &str = "GEX_FLUSH_EPRINT";
pub const ENV_BACKTRACE: &str = "GEX_BACKTRACE";

/// Snapshot of the `GEX_*` environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub log_level: LogLevel,
    pub flush_eprint: bool,
    pub backtrace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            flush_eprint: false,
            backtrace: true,
        }
    }
}

impl Config {
    /// Read the configuration from the process environment.
    /// Unset or unparsable variables fall back to `Config::default()`.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            log_level: env_get_opt(ENV_LOG_LEVEL).unwrap_or(d.log_level),
            flush_eprint: env_get_bool(ENV_FLUSH_EPRINT, d.flush_eprint),
            backtrace: env_get_bool(ENV_BACKTRACE, d.backtrace),
        }
    }
}

/// Get environment variable parsed as type T, or return default
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get environment variable as boolean
///
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true. Any other
/// value is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Get environment variable parsed as type T, or `None` if unset or unparsable
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Is the variable set at all, whatever its value?
#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var_os(key).is_some()
}
