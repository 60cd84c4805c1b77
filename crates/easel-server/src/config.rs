//! Server configuration.

use std::time::Duration;

/// Tunables for the realtime server, fixed at process start (no hot reload).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the websocket/HTTP listener binds to.
    pub bind_address: String,

    /// Base URL of the external document store. `None` keeps documents in
    /// memory for the process lifetime.
    pub persistence_url: Option<String>,

    /// Allowed websocket origins. Empty allows any origin.
    pub allowed_origins: Vec<String>,

    /// Maximum retained history frames per room.
    pub history_cap: usize,

    /// Interval between persistence ticks.
    pub save_interval: Duration,

    /// Outbound queue capacity per session. A session whose queue overflows
    /// is disconnected rather than stalling its room.
    pub outbound_queue: usize,

    /// Sustained inbound message rate per session, in messages per second.
    pub rate_limit: u32,

    /// Cold-load timeout. A timed-out load counts as a load failure.
    pub load_timeout: Duration,

    /// Per-attempt save timeout.
    pub save_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8787".to_string(),
            persistence_url: None,
            allowed_origins: Vec::new(),
            history_cap: easel_core::history::DEFAULT_HISTORY_CAP,
            save_interval: Duration::from_secs(1),
            outbound_queue: 256,
            rate_limit: 20,
            load_timeout: Duration::from_secs(5),
            save_timeout: Duration::from_secs(10),
        }
    }
}
