//! Session configuration parsed from environment variables.
//!
//! Every knob has a default; a missing or unparsable value falls back to it.
//!
//! - `COLLAB_RELAY_URL`: relay websocket URL, default a local
//!   `scenesync relay`
//! - `COLLAB_HANDSHAKE_TIMEOUT_MS`: default 5000
//! - `COLLAB_FULL_SYNC_INTERVAL_MS`: default 20000
//! - `COLLAB_IDLE_THRESHOLD_MS`: default 60000

use std::time::Duration;

pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:3002";
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_FULL_SYNC_INTERVAL_MS: u64 = 20_000;
pub const DEFAULT_IDLE_THRESHOLD_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub relay_url: String,
    /// How long a joiner waits for `SCENE_INIT` before starting empty.
    pub handshake_timeout: Duration,
    /// Minimum spacing of full-scene resyncs.
    pub full_sync_interval: Duration,
    /// Pointer inactivity before the user reports as idle.
    pub idle_threshold: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_owned(),
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
            full_sync_interval: Duration::from_millis(DEFAULT_FULL_SYNC_INTERVAL_MS),
            idle_threshold: Duration::from_millis(DEFAULT_IDLE_THRESHOLD_MS),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |key: &str, default: u64| {
            Duration::from_millis(lookup(key).and_then(|v| v.trim().parse::<u64>().ok()).unwrap_or(default))
        };
        let relay_url = lookup("COLLAB_RELAY_URL")
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_RELAY_URL.to_owned());

        Self {
            relay_url,
            handshake_timeout: millis("COLLAB_HANDSHAKE_TIMEOUT_MS", DEFAULT_HANDSHAKE_TIMEOUT_MS),
            full_sync_interval: millis("COLLAB_FULL_SYNC_INTERVAL_MS", DEFAULT_FULL_SYNC_INTERVAL_MS),
            idle_threshold: millis("COLLAB_IDLE_THRESHOLD_MS", DEFAULT_IDLE_THRESHOLD_MS),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
