//! Store configuration and the explicit context bundle threaded through the
//! core.
//!
//! Nothing in the core reads process-wide state: the credential, the release
//! tag and the bitrot algorithm travel together in a [`CoreContext`] built
//! once at startup.

use std::path::PathBuf;

use serde::Deserialize;

use crate::bitrot::{default_bitrot_algo, HashAlgo};
use crate::credential::{is_access_key_valid, is_secret_key_valid, Credential, CredentialError};
use crate::manifest::BLOCK_SIZE_V1;

/// Build identifier stamped into newly written manifests.
pub const RELEASE_TAG: &str = env!("CARGO_PKG_VERSION");

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unparseable store config: {0}")]
    Malformed(#[from] toml::de::Error),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("disk count must equal data plus parity blocks, with at least one data block")]
    InvalidErasureLayout,
}

/// Deployment description loaded at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Root directories of the ordered disk set, one per shard position.
    pub disks: Vec<PathBuf>,
    pub data_blocks: usize,
    pub parity_blocks: usize,
    #[serde(default = "default_block_size")]
    pub block_size: u64,
    pub access_key: String,
    pub secret_key: String,
}

fn default_block_size() -> u64 {
    BLOCK_SIZE_V1
}

impl StoreConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_blocks < 1
            || self.block_size == 0
            || self.disks.len() != self.data_blocks + self.parity_blocks
        {
            return Err(ConfigError::InvalidErasureLayout);
        }
        if !is_access_key_valid(&self.access_key) {
            return Err(CredentialError::InvalidAccessKeyLength.into());
        }
        if !is_secret_key_valid(&self.secret_key) {
            return Err(CredentialError::InvalidSecretKeyLength.into());
        }
        Ok(())
    }
}

/// The explicit dependency bundle handed to signature validation and
/// manifest construction.
#[derive(Debug, Clone)]
pub struct CoreContext {
    pub credential: Credential,
    pub release: String,
    pub bitrot_algo: HashAlgo,
}

impl CoreContext {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            release: RELEASE_TAG.to_string(),
            bitrot_algo: default_bitrot_algo(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let credential = Credential::new(&config.access_key, &config.secret_key)?;
        Ok(Self::new(credential))
    }
}
