//! TOML file configuration structures.
//!
//! These structs directly map to the `innsync-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub property: PropertyConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// The property this instance manages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyConfig {
    pub id: Uuid,
    /// Prefix of issued booking references, `PREFIX-YYYY-NNNN`.
    #[serde(default = "default_ref_prefix")]
    pub booking_ref_prefix: String,
}

fn default_ref_prefix() -> String {
    "BK".to_string()
}

/// Channel synchronization tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between calendar feed polling passes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Delivery attempts before an outbound job is marked failed for good.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_max_attempts() -> i32 {
    8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[property]
id = "5f0c37ab-6b47-4a2c-9f2e-2f1e3c4d5e6f"
booking_ref_prefix = "HTL"

[sync]
poll_interval_secs = 120
max_attempts = 5
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.property.booking_ref_prefix, "HTL");
        assert_eq!(config.sync.poll_interval_secs, 120);
        assert_eq!(config.sync.max_attempts, 5);
    }

    #[test]
    fn sync_section_is_optional_with_defaults() {
        let toml_str = r#"
[server]

[property]
id = "5f0c37ab-6b47-4a2c-9f2e-2f1e3c4d5e6f"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.property.booking_ref_prefix, "BK");
        assert_eq!(config.sync.poll_interval_secs, 300);
        assert_eq!(config.sync.max_attempts, 8);
    }
}
