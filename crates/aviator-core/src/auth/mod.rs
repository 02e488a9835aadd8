//! Authentication module for managing the user session and its credential.
//!
//! This module provides:
//! - `TokenStore`: Encrypted on-disk storage for the refresh token
//! - `KeySource`: The symmetric key behind that storage, kept in the OS keychain
//! - `SessionController`: The loading/unauthenticated/authenticated state machine
//!
//! The refresh token is long-lived and exchanged for a session token on every
//! start.

pub mod controller;
pub mod key;
pub mod state;
pub mod store;

pub use controller::{PostLoginSession, SessionController, MIN_REFRESH_TOKEN_LEN};
pub use key::{KeySource, KeyringKeySource, StaticKeySource};
pub use state::AuthState;
pub use store::{EncryptedTokenStore, MemoryTokenStore, TokenStore};
