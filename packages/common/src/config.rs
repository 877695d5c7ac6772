use serde::Deserialize;

/// Queue store configuration shared by the server and anything that talks to the judge queue.
#[derive(Debug, Deserialize, Clone)]
pub struct QueueAppConfig {
    /// Whether to connect to Redis. When false an in-process store is used. Default: true.
    #[serde(default = "default_queue_enabled")]
    pub enabled: bool,
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_queue_url")]
    pub url: String,
    /// Prefix for every key the judge protocol touches. Default: "judge".
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Seconds to wait for a readiness PING before reporting the store as down. Default: 2.
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

fn default_queue_enabled() -> bool {
    true
}
fn default_queue_url() -> String {
    "redis://localhost:6379".into()
}
fn default_key_prefix() -> String {
    "judge".into()
}
fn default_ready_timeout_secs() -> u64 {
    2
}

impl Default for QueueAppConfig {
    fn default() -> Self {
        Self {
            enabled: default_queue_enabled(),
            url: default_queue_url(),
            key_prefix: default_key_prefix(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}
