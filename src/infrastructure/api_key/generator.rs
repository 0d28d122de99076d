//! API Key generation
//!
//! Generates hex-encoded keys from the operating system CSPRNG and derives
//! the short public prefix used for candidate lookup.

use rand::rngs::OsRng;
use rand::RngCore;

/// Result of generating a new API key
#[derive(Clone)]
pub struct GeneratedApiKey {
    /// The full API key (only shown once at creation)
    pub key: String,
    /// The key prefix for identification
    pub prefix: String,
}

impl std::fmt::Debug for GeneratedApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedApiKey")
            .field("key", &"[hidden]")
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Generator for secure API keys
#[derive(Debug, Clone)]
pub struct ApiKeyGenerator {
    /// Length of the generated key in hex characters (must be even)
    key_length: usize,
    /// Number of leading characters stored as the lookup prefix
    prefix_length: usize,
}

impl ApiKeyGenerator {
    pub const DEFAULT_KEY_LENGTH: usize = 64;
    pub const DEFAULT_PREFIX_LENGTH: usize = 8;

    /// Create a new API key generator
    pub fn new(key_length: usize, prefix_length: usize) -> Self {
        Self {
            key_length,
            prefix_length: prefix_length.min(key_length),
        }
    }

    pub fn key_length(&self) -> usize {
        self.key_length
    }

    pub fn prefix_length(&self) -> usize {
        self.prefix_length
    }

    /// Generate a new API key
    pub fn generate(&self) -> GeneratedApiKey {
        let mut random_bytes = vec![0u8; self.key_length / 2];
        OsRng.fill_bytes(&mut random_bytes);

        let key = hex::encode(&random_bytes);
        let prefix = self.prefix_of(&key).to_string();

        GeneratedApiKey { key, prefix }
    }

    /// First `prefix_length` characters of a presented key
    ///
    /// Shorter input yields the whole input. Never splits a character.
    pub fn prefix_of<'a>(&self, key: &'a str) -> &'a str {
        match key.char_indices().nth(self.prefix_length) {
            Some((end, _)) => &key[..end],
            None => key,
        }
    }

    /// Whether a presented key has the shape of a generated one
    pub fn is_well_formed(&self, key: &str) -> bool {
        key.len() == self.key_length && key.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl Default for ApiKeyGenerator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_KEY_LENGTH, Self::DEFAULT_PREFIX_LENGTH)
    }
}
