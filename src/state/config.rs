//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::state::timer::{DEFAULT_ROUND_SECONDS, DEFAULT_TICK_SECONDS};

/// Default server endpoint for local development.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:9999/ws";

/// Tunables for a [`Session`](crate::state::session::Session).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use codecrack_client::SessionConfig;
///
/// let config = SessionConfig::from_json(r#"{"url": "ws://example.com/ws"}"#).unwrap();
/// assert_eq!(config.url, "ws://example.com/ws");
/// assert_eq!(config.round_seconds, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Game server WebSocket endpoint
    pub url: String,

    /// Length of each round's countdown
    pub round_seconds: u32,

    /// Countdown display tick interval
    pub tick_seconds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            round_seconds: DEFAULT_ROUND_SECONDS,
            tick_seconds: DEFAULT_TICK_SECONDS,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint served by `host` at the standard `/ws` path.
    pub fn for_host(host: &str) -> Self {
        Self::default().with_url(format!("ws://{}/ws", host))
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub fn with_round_seconds(mut self, seconds: u32) -> Self {
        self.round_seconds = seconds;
        self
    }

    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_tick_seconds(mut self, seconds: u32) -> Self {
        self.tick_seconds = seconds.max(1);
        self
    }
}
