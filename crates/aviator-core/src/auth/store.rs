//! Encrypted persistence for the refresh token.
//!
//! The token lives in a small JSON preferences file as two base64 strings:
//! the ChaCha20-Poly1305 ciphertext and its nonce. Anything that prevents the
//! token from being read back (missing keys, bad base64, a rotated key, a
//! tampered file) is reported as "no token" so the caller falls back to the
//! logged-out state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::rngs::OsRng;
use tracing::{debug, warn};

use super::key::KeySource;

/// Preferences namespace file name in the data directory
pub const PREFS_FILE: &str = "secure_prefs.json";

const TOKEN_ENCRYPTED: &str = "token_encrypted";
const TOKEN_IV: &str = "token_iv";

/// ChaCha20-Poly1305 nonce length in bytes
const NONCE_LEN: usize = 12;

/// Storage for the single refresh-token credential.
///
/// Implementations may block on file I/O and on the OS keychain. Async
/// callers should run `load` through `spawn_blocking`.
pub trait TokenStore: Send + Sync {
    /// Persist `token`, replacing any previous one.
    fn save(&self, token: &str) -> Result<()>;

    /// The stored token, or `None` if absent or unreadable.
    fn load(&self) -> Option<String>;

    /// Remove the stored token. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;
}

type Prefs = BTreeMap<String, String>;

pub struct EncryptedTokenStore<K: KeySource> {
    prefs_path: PathBuf,
    keys: K,
}

impl<K: KeySource> EncryptedTokenStore<K> {
    /// Store backed by `<data_dir>/secure_prefs.json`.
    pub fn new(data_dir: &Path, keys: K) -> Self {
        Self::at_path(data_dir.join(PREFS_FILE), keys)
    }

    pub fn at_path(prefs_path: PathBuf, keys: K) -> Self {
        Self { prefs_path, keys }
    }

    pub fn path(&self) -> &Path {
        &self.prefs_path
    }

    fn read_prefs(&self) -> Result<Prefs> {
        if !self.prefs_path.exists() {
            return Ok(Prefs::new());
        }
        let contents = std::fs::read_to_string(&self.prefs_path)
            .context("Failed to read preferences file")?;
        serde_json::from_str(&contents).context("Failed to parse preferences file")
    }

    fn write_prefs(&self, prefs: &Prefs) -> Result<()> {
        if prefs.is_empty() {
            if self.prefs_path.exists() {
                std::fs::remove_file(&self.prefs_path)
                    .context("Failed to remove preferences file")?;
            }
            return Ok(());
        }
        if let Some(parent) = self.prefs_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.prefs_path, contents).context("Failed to write preferences file")?;
        Ok(())
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305> {
        let key = self.keys.key()?;
        Ok(ChaCha20Poly1305::new(&key))
    }

    fn decrypt(&self, encrypted: &str, iv: &str) -> Result<String> {
        let ciphertext = STANDARD
            .decode(encrypted)
            .context("Stored token is not valid base64")?;
        let nonce = STANDARD
            .decode(iv)
            .context("Stored token nonce is not valid base64")?;
        if nonce.len() != NONCE_LEN {
            return Err(anyhow!("Stored token nonce has {} bytes", nonce.len()));
        }

        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| anyhow!("Failed to decrypt stored token"))?;
        String::from_utf8(plaintext).context("Stored token is not valid UTF-8")
    }
}

impl<K: KeySource> TokenStore for EncryptedTokenStore<K> {
    fn save(&self, token: &str) -> Result<()> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher()?
            .encrypt(&nonce, token.as_bytes())
            .map_err(|_| anyhow!("Failed to encrypt token"))?;

        // A corrupt preferences file is replaced rather than blocking login
        let mut prefs = self.read_prefs().unwrap_or_else(|e| {
            warn!(error = %e, "Discarding unreadable preferences file");
            Prefs::new()
        });
        prefs.insert(TOKEN_ENCRYPTED.to_string(), STANDARD.encode(ciphertext));
        prefs.insert(TOKEN_IV.to_string(), STANDARD.encode(nonce));
        self.write_prefs(&prefs)?;

        debug!(path = %self.prefs_path.display(), "Saved refresh token");
        Ok(())
    }

    fn load(&self) -> Option<String> {
        let prefs = match self.read_prefs() {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(error = %e, "Treating unreadable preferences as no token");
                return None;
            }
        };

        let (encrypted, iv) = match (prefs.get(TOKEN_ENCRYPTED), prefs.get(TOKEN_IV)) {
            (Some(encrypted), Some(iv)) => (encrypted, iv),
            _ => return None,
        };

        match self.decrypt(encrypted, iv) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(error = %e, "Treating undecryptable token as no token");
                None
            }
        }
    }

    fn clear(&self) -> Result<()> {
        let mut prefs = match self.read_prefs() {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(error = %e, "Removing unreadable preferences file");
                Prefs::new()
            }
        };
        let had_token = prefs.remove(TOKEN_ENCRYPTED).is_some() | prefs.remove(TOKEN_IV).is_some();
        self.write_prefs(&prefs)?;

        if had_token {
            debug!(path = %self.prefs_path.display(), "Cleared refresh token");
        }
        Ok(())
    }
}

/// Token store that keeps the token in process memory only.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, token: &str) -> Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn load(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) -> Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
