//! Machine-generated handles.
//!
//! The generator only *finds* a free handle. Reservation is the caller's job
//! (through `create_and_reserve`), and the store's create-only write is what
//! actually guarantees uniqueness. The attempt bound is headroom against an
//! unlucky streak, not a correctness property.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use hreg_store::DocumentStore;
use hreg_types::Handle;

use crate::config::GeneratorConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::schema::handle_key;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Samples `{prefix}_{suffix}` handles and probes the store for a free one.
#[derive(Clone, Debug)]
pub struct HandleGenerator {
    config: GeneratorConfig,
}

impl HandleGenerator {
    pub fn new(config: GeneratorConfig) -> RegistryResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Draw one random candidate. Does not touch the store.
    pub fn candidate(&self) -> RegistryResult<Handle> {
        let mut rng = rand::thread_rng();
        let prefix = self
            .config
            .prefixes
            .choose(&mut rng)
            .ok_or_else(|| RegistryError::Config("generator has no prefixes".into()))?;
        let suffix: String = (0..self.config.suffix_len)
            .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        Ok(Handle::parse(&format!("{prefix}_{suffix}"))?)
    }

    /// Find a handle with no index record, probing at most `max_attempts`
    /// times.
    pub async fn generate<S>(&self, store: &S) -> RegistryResult<Handle>
    where
        S: DocumentStore + ?Sized,
    {
        for attempt in 1..=self.config.max_attempts {
            let candidate = self.candidate()?;
            if !store.exists(&handle_key(&candidate)).await? {
                debug!(handle = %candidate, attempt, "generated free handle");
                return Ok(candidate);
            }
            debug!(handle = %candidate, attempt, "generated handle collides");
        }

        warn!(
            attempts = self.config.max_attempts,
            prefixes = self.config.prefixes.len(),
            suffix_len = self.config.suffix_len,
            "handle generation exhausted; prefix/suffix space under pressure"
        );
        Err(RegistryError::GenerationExhausted {
            attempts: self.config.max_attempts,
        })
    }
}

impl Default for HandleGenerator {
    fn default() -> Self {
        Self {
            config: GeneratorConfig::default(),
        }
    }
}
