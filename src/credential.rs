//! Access-key/secret-key credential value object.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use pbkdf2::password_hash::rand_core::OsRng as SaltRng;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Minimum length of an access key.
pub const ACCESS_KEY_MIN_LEN: usize = 5;

/// Maximum length of an access key; also the generated length.
pub const ACCESS_KEY_MAX_LEN: usize = 20;

/// Minimum length of a secret key.
pub const SECRET_KEY_MIN_LEN: usize = 8;

/// Maximum secret key length accepted on the ingress boundary.
pub const SECRET_KEY_MAX_LEN: usize = 100;

/// Length of auto-generated secret keys.
const SECRET_KEY_GEN_LEN: usize = 40;

/// Alphabet used for generated access keys.
const ALPHA_NUMERIC_TABLE: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Credential validation errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("invalid access key, access key should be 5 to 20 characters in length")]
    InvalidAccessKeyLength,
    #[error("invalid secret key, secret key should be 8 to 100 characters in length")]
    InvalidSecretKeyLength,
}

/// Validates an access key for the right length.
pub fn is_access_key_valid(access_key: &str) -> bool {
    (ACCESS_KEY_MIN_LEN..=ACCESS_KEY_MAX_LEN).contains(&access_key.len())
}

/// Validates a secret key for the right length.
pub fn is_secret_key_valid(secret_key: &str) -> bool {
    (SECRET_KEY_MIN_LEN..=SECRET_KEY_MAX_LEN).contains(&secret_key.len())
}

/// Container for access and secret keys.
///
/// The password hash of the secret key is kept alongside for comparisons and
/// is never serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "accessKey")]
    pub access_key: String,
    #[serde(rename = "secretKey")]
    pub secret_key: String,
    #[serde(skip)]
    secret_key_hash: Option<String>,
}

fn hash_secret_key(secret_key: &str) -> Option<String> {
    let salt = SaltString::generate(&mut SaltRng);
    match Pbkdf2.hash_password(secret_key.as_bytes(), &salt) {
        Ok(hash) => Some(hash.to_string()),
        Err(err) => {
            tracing::error!(%err, "unable to generate hash of secret key");
            None
        }
    }
}

impl Credential {
    /// Creates a credential, validating both key lengths before any other
    /// work. The secret-key hash is computed eagerly.
    pub fn new(access_key: &str, secret_key: &str) -> Result<Self, CredentialError> {
        if !is_access_key_valid(access_key) {
            return Err(CredentialError::InvalidAccessKeyLength);
        }
        if !is_secret_key_valid(secret_key) {
            return Err(CredentialError::InvalidSecretKeyLength);
        }
        Ok(Self {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            secret_key_hash: hash_secret_key(secret_key),
        })
    }

    /// Generates a fresh credential from the OS cryptographic RNG: a 20-char
    /// access key over `0-9A-Z` and a 40-char base64 secret key. RNG failure
    /// aborts the process; there is no recovering from a dry entropy source
    /// at startup.
    pub fn generate() -> Self {
        let mut key_bytes = [0u8; ACCESS_KEY_MAX_LEN];
        OsRng.fill_bytes(&mut key_bytes);
        let access_key: String = key_bytes
            .iter()
            .map(|&b| ALPHA_NUMERIC_TABLE[(b % ALPHA_NUMERIC_TABLE.len() as u8) as usize] as char)
            .collect();

        let mut key_bytes = [0u8; SECRET_KEY_GEN_LEN];
        OsRng.fill_bytes(&mut key_bytes);
        let mut secret_key = BASE64.encode(key_bytes);
        secret_key.truncate(SECRET_KEY_GEN_LEN);

        Self::new(&access_key, &secret_key).expect("generated keys satisfy the length rules")
    }

    /// Whether both keys satisfy their length predicates.
    pub fn is_valid(&self) -> bool {
        is_access_key_valid(&self.access_key) && is_secret_key_valid(&self.secret_key)
    }

    /// Compares two credentials. An invalid `other` never matches. The access
    /// key is compared exactly; `other`'s secret key is verified against the
    /// password hash of this credential's secret, in constant time.
    ///
    /// A credential built without [`Credential::new`] carries no hash, so the
    /// hash is recomputed here on every call and the result is not retained.
    pub fn equal(&self, other: &Credential) -> bool {
        if !other.is_valid() {
            return false;
        }
        if self.access_key != other.access_key {
            return false;
        }
        let recomputed;
        let hash = match &self.secret_key_hash {
            Some(hash) => hash,
            None => match hash_secret_key(&self.secret_key) {
                Some(hash) => {
                    recomputed = hash;
                    &recomputed
                }
                None => return false,
            },
        };
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Pbkdf2
            .verify_password(other.secret_key.as_bytes(), &parsed)
            .is_ok()
    }
}
