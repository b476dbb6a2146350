use std::time::Duration;

use serde::{Deserialize, Serialize};

use rtdb_types::normalize_path;

use crate::error::{ClientError, ClientResult};
use crate::DEFAULT_READ_PATH;

/// Configuration for [`RealtimeDb`](crate::RealtimeDb).
///
/// Every field has a default, so a TOML document only needs to name what
/// it overrides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Quiet period before a listener is registered. Reads of the same path
    /// inside this window share one registration.
    pub debounce_ms: u64,
    /// How long a read waits for its first snapshot.
    pub read_timeout_ms: u64,
    /// Path used by [`RealtimeDb::read_public`](crate::RealtimeDb::read_public).
    pub default_read_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 250,
            read_timeout_ms: 8_000,
            default_read_path: DEFAULT_READ_PATH.into(),
        }
    }
}

impl ClientConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> ClientResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.read_timeout_ms == 0 {
            return Err(ClientError::Config("read_timeout_ms must be positive".into()));
        }
        normalize_path(&self.default_read_path)
            .map_err(|e| ClientError::Config(format!("default_read_path: {e}")))?;
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ClientConfig::default();
        assert_eq!(c.read_timeout(), Duration::from_secs(8));
        assert_eq!(c.debounce(), Duration::from_millis(250));
        assert_eq!(c.default_read_path, "public/");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn toml_overrides_are_partial() {
        let c = ClientConfig::from_toml_str("debounce_ms = 10\n").unwrap();
        assert_eq!(c.debounce_ms, 10);
        assert_eq!(c.read_timeout_ms, 8_000);
    }

    #[test]
    fn toml_rejects_bad_values() {
        assert!(matches!(
            ClientConfig::from_toml_str("read_timeout_ms = 0"),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("default_read_path = \"/\""),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("debounce_ms = \"soon\""),
            Err(ClientError::Config(_))
        ));
    }
}
