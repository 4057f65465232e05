// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Bus configuration - single source of truth for every tunable.
//!
//! **NEVER hardcode a timeout elsewhere!** All defaults live here, every one
//! of them overridable through an environment variable read once at
//! construction. The get/set RPC timeouts additionally honor a runtime file
//! override checked on EVERY call, so a field engineer can stretch them on a
//! live box without restarting components.
//!
//! # Levels
//!
//! - **Level 1 (Static)**: compile-time defaults below
//! - **Level 2 (Env)**: `DMBUS_*` variables, applied by [`Config::from_env`]
//! - **Level 3 (Runtime)**: `<tmp_dir>/dmbus_timeout_{get,set}` override
//!   files, value in whole seconds

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

// =======================================================================
// Compile-time defaults
// =======================================================================

/// Scratch directory for runtime override files
pub const DEFAULT_TMP_DIR: &str = "/tmp";

/// Max time to keep retrying an event subscription (ms)
pub const DEFAULT_SUBSCRIBE_TIMEOUT_MS: u32 = 600_000;

/// Max single wait between subscription retries (ms)
pub const DEFAULT_SUBSCRIBE_MAXWAIT_MS: u32 = 60_000;

/// Period between value-change polling sweeps (ms)
pub const DEFAULT_VALUECHANGE_PERIOD_MS: u32 = 2_000;

/// Default get RPC timeout (ms)
pub const DEFAULT_GET_TIMEOUT_MS: u32 = 60_000;

/// Default set RPC timeout (ms)
pub const DEFAULT_SET_TIMEOUT_MS: u32 = 60_000;

// =======================================================================
// Environment variable names (Level 2)
// =======================================================================

pub const ENV_TMP_DIRECTORY: &str = "DMBUS_TMP_DIRECTORY";
pub const ENV_SUBSCRIBE_TIMEOUT: &str = "DMBUS_SUBSCRIBE_TIMEOUT";
pub const ENV_SUBSCRIBE_MAXWAIT: &str = "DMBUS_SUBSCRIBE_MAXWAIT";
pub const ENV_VALUECHANGE_PERIOD: &str = "DMBUS_VALUECHANGE_PERIOD";
pub const ENV_GET_TIMEOUT: &str = "DMBUS_GET_DEFAULT_TIMEOUT";
pub const ENV_SET_TIMEOUT: &str = "DMBUS_SET_DEFAULT_TIMEOUT";

// =======================================================================
// Runtime override files (Level 3)
// =======================================================================

/// File under `tmp_dir` overriding the get timeout (content: seconds)
pub const GET_TIMEOUT_OVERRIDE_FILE: &str = "dmbus_timeout_get";

/// File under `tmp_dir` overriding the set timeout (content: seconds)
pub const SET_TIMEOUT_OVERRIDE_FILE: &str = "dmbus_timeout_set";

/// Resolved bus configuration.
///
/// Cheap to clone; the bus keeps it behind an `ArcSwap` so a whole new
/// configuration can be swapped in atomically at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub tmp_dir: PathBuf,
    pub subscribe_timeout_ms: u32,
    pub subscribe_maxwait_ms: u32,
    pub value_change_period_ms: u32,
    pub get_timeout_ms: u32,
    pub set_timeout_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tmp_dir: PathBuf::from(DEFAULT_TMP_DIR),
            subscribe_timeout_ms: DEFAULT_SUBSCRIBE_TIMEOUT_MS,
            subscribe_maxwait_ms: DEFAULT_SUBSCRIBE_MAXWAIT_MS,
            value_change_period_ms: DEFAULT_VALUECHANGE_PERIOD_MS,
            get_timeout_ms: DEFAULT_GET_TIMEOUT_MS,
            set_timeout_ms: DEFAULT_SET_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Build a configuration from the environment.
    ///
    /// Unset variables take the compile-time default; values that do not
    /// parse as an unsigned integer are logged and fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            tmp_dir: std::env::var(ENV_TMP_DIRECTORY)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TMP_DIR)),
            subscribe_timeout_ms: env_u32(ENV_SUBSCRIBE_TIMEOUT, DEFAULT_SUBSCRIBE_TIMEOUT_MS),
            subscribe_maxwait_ms: env_u32(ENV_SUBSCRIBE_MAXWAIT, DEFAULT_SUBSCRIBE_MAXWAIT_MS),
            value_change_period_ms: env_u32(ENV_VALUECHANGE_PERIOD, DEFAULT_VALUECHANGE_PERIOD_MS),
            get_timeout_ms: env_u32(ENV_GET_TIMEOUT, DEFAULT_GET_TIMEOUT_MS),
            set_timeout_ms: env_u32(ENV_SET_TIMEOUT, DEFAULT_SET_TIMEOUT_MS),
        }
    }

    /// Effective get RPC timeout, honoring the runtime override file.
    ///
    /// Called on every get so the override takes effect immediately.
    #[must_use]
    pub fn read_get_timeout(&self) -> Duration {
        self.read_timeout_override(GET_TIMEOUT_OVERRIDE_FILE, self.get_timeout_ms)
    }

    /// Effective set RPC timeout, honoring the runtime override file.
    #[must_use]
    pub fn read_set_timeout(&self) -> Duration {
        self.read_timeout_override(SET_TIMEOUT_OVERRIDE_FILE, self.set_timeout_ms)
    }

    /// Subscription retry budget as a [`Duration`].
    #[must_use]
    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.subscribe_timeout_ms))
    }

    /// Value-change polling period as a [`Duration`], never zero.
    #[must_use]
    pub fn value_change_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.value_change_period_ms.max(1)))
    }

    fn read_timeout_override(&self, file: &str, default_ms: u32) -> Duration {
        let path = self.tmp_dir.join(file);
        if let Ok(text) = fs::read_to_string(&path) {
            match text.trim().parse::<u32>() {
                Ok(secs) if secs > 0 => {
                    return Duration::from_millis(u64::from(secs) * 1000);
                }
                _ => {
                    log::warn!(
                        "[config] ignoring invalid timeout override in {}",
                        path.display()
                    );
                }
            }
        }
        Duration::from_millis(u64::from(default_ms))
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    match std::env::var(name) {
        Ok(text) => text.trim().parse().unwrap_or_else(|_| {
            log::warn!("[config] {name}={text:?} is not a number, using {default}");
            default
        }),
        Err(_) => default,
    }
}
