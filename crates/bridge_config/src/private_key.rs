#[cfg(test)]
#[path = "private_key_test.rs"]
mod private_key_test;

use std::fmt;
use std::path::PathBuf;

use alloy::signers::local::PrivateKeySigner;
use serde::Deserialize;

use crate::loading::ConfigError;

/// Where the validator key comes from: either inline raw hex, or an encrypted
/// keystore plus a file holding its password.
#[derive(Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PrivateKeySource {
    Raw(String),
    Keystore { keystore_path: PathBuf, keystore_password_path: PathBuf },
}

// The raw variant holds key material; never echo it.
impl fmt::Debug for PrivateKeySource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivateKeySource::Raw(_) => formatter.write_str("PrivateKeySource::Raw(<redacted>)"),
            PrivateKeySource::Keystore { keystore_path, .. } => formatter
                .debug_struct("PrivateKeySource::Keystore")
                .field("keystore_path", keystore_path)
                .finish_non_exhaustive(),
        }
    }
}

impl PrivateKeySource {
    pub fn resolve(&self) -> Result<PrivateKeySigner, ConfigError> {
        match self {
            PrivateKeySource::Raw(hex_key) => {
                let stripped = hex_key.strip_prefix("0x").unwrap_or(hex_key);
                let bytes = hex::decode(stripped)
                    .map_err(|error| ConfigError::PrivateKey(error.to_string()))?;
                PrivateKeySigner::from_slice(&bytes)
                    .map_err(|error| ConfigError::PrivateKey(error.to_string()))
            }
            PrivateKeySource::Keystore { keystore_path, keystore_password_path } => {
                let password = std::fs::read_to_string(keystore_password_path).map_err(|error| {
                    ConfigError::Keystore {
                        path: keystore_password_path.clone(),
                        reason: error.to_string(),
                    }
                })?;
                PrivateKeySigner::decrypt_keystore(keystore_path, password.trim()).map_err(
                    |error| ConfigError::Keystore {
                        path: keystore_path.clone(),
                        reason: error.to_string(),
                    },
                )
            }
        }
    }
}
