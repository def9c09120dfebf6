// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-scope module configuration, resolved by the host before the first
//! request. The host's own configuration system is the usual source; the
//! `LOG2UDP_*` environment variables are the standalone fallback.

use std::env;
use std::time::Duration;

use serde::Deserialize;

/// Fallback receive timeout, in microseconds, when the configured value is
/// unset or non-positive.
pub const DEFAULT_TIMEOUT_US: u64 = 5000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether the module ships records at all for this scope.
    pub enabled: bool,
    /// Collector hostname or address. Required; validated at session setup.
    pub collector_host: String,
    /// Collector UDP port. Required, non-zero; validated at session setup.
    pub collector_port: u16,
    /// How long one delivery round waits for the collector's echo, in
    /// microseconds.
    pub timeout_us: u64,
    /// Echo every assembled record to the log stream after delivery.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            enabled: false,
            collector_host: String::new(),
            collector_port: 0,
            timeout_us: DEFAULT_TIMEOUT_US,
            debug: false,
        }
    }
}

impl Config {
    /// Read the scope configuration from `LOG2UDP_ENABLED`,
    /// `LOG2UDP_SERVER`, `LOG2UDP_PORT`, `LOG2UDP_TIMEOUT_US`, and
    /// `LOG2UDP_DEBUG`. Unset or unparseable values fall back to defaults;
    /// destination validation happens later, at session setup.
    pub fn from_env() -> Config {
        Config {
            enabled: env_flag("LOG2UDP_ENABLED"),
            collector_host: env::var("LOG2UDP_SERVER").unwrap_or_default(),
            collector_port: env::var("LOG2UDP_PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(0),
            timeout_us: env::var("LOG2UDP_TIMEOUT_US")
                .ok()
                .and_then(|timeout| timeout.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_US),
            debug: env_flag("LOG2UDP_DEBUG"),
        }
    }

    /// The receive timeout as a duration, with the non-positive fallback
    /// applied.
    pub fn timeout(&self) -> Duration {
        if self.timeout_us > 0 {
            Duration::from_micros(self.timeout_us)
        } else {
            Duration::from_micros(DEFAULT_TIMEOUT_US)
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|value| {
            let value = value.to_lowercase();
            value == "1" || value == "true" || value == "on"
        })
        .unwrap_or(false)
}
