use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{aead::KeyInit, ChaCha20Poly1305, Key};
use keyring::Entry;
use rand::rngs::OsRng;
use tracing::info;

const SERVICE_NAME: &str = "aviator";
const KEY_ACCOUNT: &str = "token-key";

/// Source of the symmetric key protecting the stored refresh token.
pub trait KeySource: Send + Sync {
    fn key(&self) -> Result<Key>;
}

/// Device-bound key kept in the OS keychain, created on first use.
pub struct KeyringKeySource {
    service: String,
    account: String,
}

impl KeyringKeySource {
    pub fn new() -> Self {
        Self::with_names(SERVICE_NAME, KEY_ACCOUNT)
    }

    pub fn with_names(service: &str, account: &str) -> Self {
        Self {
            service: service.to_string(),
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.account).context("Failed to create keyring entry")
    }
}

impl Default for KeyringKeySource {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for KeyringKeySource {
    fn key(&self) -> Result<Key> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(encoded) => decode_key(&encoded),
            Err(keyring::Error::NoEntry) => {
                info!(service = %self.service, "Generating token encryption key");
                let key = ChaCha20Poly1305::generate_key(&mut OsRng);
                entry
                    .set_password(&STANDARD.encode(key.as_slice()))
                    .context("Failed to store encryption key in keychain")?;
                Ok(key)
            }
            Err(e) => Err(e).context("Failed to read encryption key from keychain"),
        }
    }
}

fn decode_key(encoded: &str) -> Result<Key> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("Stored encryption key is not valid base64")?;
    if bytes.len() != 32 {
        return Err(anyhow!(
            "Stored encryption key has {} bytes, expected 32",
            bytes.len()
        ));
    }
    Ok(*Key::from_slice(&bytes))
}

/// Fixed in-memory key, for tests and sessions that must not touch the keychain.
pub struct StaticKeySource {
    key: Key,
}

impl StaticKeySource {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self {
            key: Key::from(bytes),
        }
    }
}

impl KeySource for StaticKeySource {
    fn key(&self) -> Result<Key> {
        Ok(self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_key_rejects_wrong_length() {
        let short = STANDARD.encode([7u8; 16]);
        assert!(decode_key(&short).is_err());
        assert!(decode_key("***").is_err());

        let ok = STANDARD.encode([7u8; 32]);
        let key = decode_key(&ok).expect("32 byte key decodes");
        assert_eq!(key.as_slice(), &[7u8; 32]);
    }

    #[test]
    #[ignore = "needs an unlocked OS keychain"]
    fn test_keychain_key_is_stable_across_instances() {
        let first = KeyringKeySource::with_names("aviator-test", "stable-key");
        let second = KeyringKeySource::with_names("aviator-test", "stable-key");

        let key = first.key().expect("keychain key created");
        assert_eq!(second.key().expect("keychain key read back"), key);

        first
            .entry()
            .unwrap()
            .delete_credential()
            .expect("test key removed");
    }
}
