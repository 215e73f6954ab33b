//! Credential vault for secrets stored in the configuration file
//!
//! Passwords and key passphrases are kept in the configuration as
//! `base64(IV || AES-256-CTR(plaintext))`. The 16-byte IV is drawn fresh for
//! every encryption, so encrypting the same text twice yields different
//! ciphertexts.
//!
//! The ciphertext is **not authenticated**: flipping bits in a stored value
//! produces garbage on decryption rather than an error. Callers must treat a
//! successful decryption as "well-formed", not as "untampered".

use std::path::{Path, PathBuf};

use aes::Aes256;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use zeroize::Zeroizing;

/// AES-256 in counter mode with a 128-bit big-endian counter
type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Required key length in bytes
pub const KEY_LEN: usize = 32;

/// Cipher block length, which is also the IV length
pub const BLOCK_LEN: usize = 16;

/// Key used when no key file is configured or the file does not exist.
///
/// This is a deliberately weak default kept for compatibility with existing
/// deployments; provision a real key with `promrelay secret`.
const FALLBACK_KEY: &[u8; KEY_LEN] = b"agg3mmaa3ama13mm3maaaama12222agm";

/// Default key file location: `<config dir>/promrelay/secret.key`
#[must_use]
pub fn default_key_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("promrelay").join("secret.key"))
}

/// Errors produced by the vault
#[derive(Debug, Error)]
pub enum VaultError {
    /// The key is not exactly [`KEY_LEN`] bytes long
    #[error("Secret key must be {KEY_LEN} bytes, got {len}")]
    InvalidKeyLength {
        /// Actual length of the supplied key
        len: usize,
    },

    /// The key file could not be read or written
    #[error("Cannot access secret key file '{path}': {source}")]
    KeyFile {
        /// Path of the key file
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The ciphertext is not valid base64
    #[error("Ciphertext is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The decoded ciphertext cannot even hold an IV
    #[error("Ciphertext is too short ({len} bytes, need at least {BLOCK_LEN})")]
    ShortCiphertext {
        /// Decoded length in bytes
        len: usize,
    },

    /// The system random number generator failed
    #[error("Failed to generate initialization vector")]
    Random,
}

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Symmetric encryption of secret strings with a process-wide key
pub struct Vault {
    key: Zeroizing<[u8; KEY_LEN]>,
    fallback: bool,
    rng: SystemRandom,
}

impl Vault {
    /// Creates a vault from raw key bytes
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidKeyLength` unless `key` is exactly
    /// [`KEY_LEN`] bytes.
    pub fn from_key_bytes(key: &[u8]) -> VaultResult<Self> {
        let key: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| VaultError::InvalidKeyLength { len: key.len() })?;
        Ok(Self {
            key: Zeroizing::new(key),
            fallback: false,
            rng: SystemRandom::new(),
        })
    }

    /// Creates a vault that uses the built-in fallback key
    #[must_use]
    pub fn with_fallback_key() -> Self {
        Self {
            key: Zeroizing::new(*FALLBACK_KEY),
            fallback: true,
            rng: SystemRandom::new(),
        }
    }

    /// Loads the key from `key_file`, verbatim.
    ///
    /// When no path is given, or the file does not exist, the fallback key is
    /// used and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::KeyFile` if the file exists but cannot be read,
    /// and `VaultError::InvalidKeyLength` if its contents are not a 32-byte key.
    pub fn load(key_file: Option<&Path>) -> VaultResult<Self> {
        let Some(path) = key_file else {
            tracing::warn!("No secret key file configured, using built-in fallback key");
            return Ok(Self::with_fallback_key());
        };

        match std::fs::read(path) {
            Ok(contents) => {
                let contents = Zeroizing::new(contents);
                let vault = Self::from_key_bytes(&contents)?;
                tracing::debug!(path = %path.display(), "Loaded secret key");
                Ok(vault)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %path.display(),
                    "Secret key file not found, using built-in fallback key"
                );
                Ok(Self::with_fallback_key())
            }
            Err(source) => Err(VaultError::KeyFile {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Writes a new key file, creating parent directories as needed
    ///
    /// On Unix the file is created with mode `0600`.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidKeyLength` if `key` is not [`KEY_LEN`]
    /// bytes, and `VaultError::KeyFile` if the file cannot be written.
    pub fn write_key_file(path: &Path, key: &[u8]) -> VaultResult<()> {
        if key.len() != KEY_LEN {
            return Err(VaultError::InvalidKeyLength { len: key.len() });
        }

        let io_error = |source: std::io::Error| VaultError::KeyFile {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path).map_err(io_error)?;
        std::io::Write::write_all(&mut file, key).map_err(io_error)?;
        tracing::info!(path = %path.display(), "Secret key written");
        Ok(())
    }

    /// Returns true if the built-in fallback key is in use
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Encrypts `plaintext` and returns `base64(IV || ciphertext)`
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Random` if no IV could be generated.
    pub fn encrypt(&self, plaintext: &str) -> VaultResult<String> {
        let mut iv = [0u8; BLOCK_LEN];
        self.rng.fill(&mut iv).map_err(|_| VaultError::Random)?;

        let mut payload = Vec::with_capacity(BLOCK_LEN + plaintext.len());
        payload.extend_from_slice(&iv);
        payload.extend_from_slice(plaintext.as_bytes());
        self.apply_keystream(&iv, &mut payload[BLOCK_LEN..]);

        Ok(STANDARD.encode(&payload))
    }

    /// Decrypts a value produced by [`Vault::encrypt`] into raw bytes
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Decode` for invalid base64 and
    /// `VaultError::ShortCiphertext` when the payload has no room for an IV.
    pub fn decrypt_bytes(&self, ciphertext: &str) -> VaultResult<Vec<u8>> {
        let mut payload = STANDARD.decode(ciphertext.trim())?;
        let len = payload.len();
        let (iv, body) = payload
            .split_first_chunk_mut::<BLOCK_LEN>()
            .ok_or(VaultError::ShortCiphertext { len })?;

        let iv = *iv;
        self.apply_keystream(&iv, body);
        Ok(payload.split_off(BLOCK_LEN))
    }

    /// Decrypts a value produced by [`Vault::encrypt`]
    ///
    /// Bytes that are not valid UTF-8 (e.g. from tampered input) are replaced
    /// rather than rejected.
    ///
    /// # Errors
    ///
    /// Same as [`Vault::decrypt_bytes`].
    pub fn decrypt(&self, ciphertext: &str) -> VaultResult<String> {
        let plaintext = Zeroizing::new(self.decrypt_bytes(ciphertext)?);
        Ok(String::from_utf8_lossy(&plaintext).into_owned())
    }

    fn apply_keystream(&self, iv: &[u8; BLOCK_LEN], data: &mut [u8]) {
        let key: &[u8; KEY_LEN] = &self.key;
        let mut cipher = Aes256Ctr::new(key.into(), iv.into());
        cipher.apply_keystream(data);
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}
