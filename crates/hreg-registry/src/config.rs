use serde::{Deserialize, Serialize};

use hreg_types::Handle;

use crate::error::{RegistryError, RegistryResult};

/// Configuration for machine-generated handles.
///
/// Generated handles look like `{prefix}_{suffix}` where the suffix is
/// `suffix_len` random lowercase letters and digits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub prefixes: Vec<String>,
    pub suffix_len: usize,
    /// Store probes before giving up with `GenerationExhausted`.
    pub max_attempts: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            prefixes: ["user", "member", "friend", "buddy", "pal", "player"]
                .into_iter()
                .map(String::from)
                .collect(),
            suffix_len: 6,
            max_attempts: 10,
        }
    }
}

impl GeneratorConfig {
    /// Check that every prefix yields format-valid handles.
    pub fn validate(&self) -> RegistryResult<()> {
        if self.prefixes.is_empty() {
            return Err(RegistryError::Config("generator needs at least one prefix".into()));
        }
        if self.suffix_len == 0 {
            return Err(RegistryError::Config("suffix_len must be positive".into()));
        }
        if self.max_attempts == 0 {
            return Err(RegistryError::Config("max_attempts must be positive".into()));
        }
        let sample_suffix = "0".repeat(self.suffix_len);
        for prefix in &self.prefixes {
            let sample = format!("{prefix}_{sample_suffix}");
            if let Err(violation) = Handle::parse(&sample) {
                return Err(RegistryError::Config(format!(
                    "prefix {prefix:?} produces invalid handles ({violation})"
                )));
            }
        }
        Ok(())
    }
}

/// Top-level registry configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub generator: GeneratorConfig,
    /// How many generated handles `reserve_generated` tries before failing.
    pub reserve_attempts: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            reserve_attempts: 3,
        }
    }
}

impl RegistryConfig {
    /// Parse from TOML. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> RegistryResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| RegistryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RegistryResult<()> {
        if self.reserve_attempts == 0 {
            return Err(RegistryError::Config("reserve_attempts must be positive".into()));
        }
        self.generator.validate()
    }
}
