use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for [`UsernameValidator`](crate::UsernameValidator).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Quiet period before an availability probe, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

impl ValidatorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Parse from TOML. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}
