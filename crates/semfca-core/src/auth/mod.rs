//! Authentication module for session artifacts and credentials.
//!
//! This module provides:
//! - `SessionStore`: reads and atomically writes the session artifact,
//!   optionally sealed under a passphrase
//! - `CredentialProvider`: pluggable credential sources (environment, keychain)
//! - `CredentialStore`: OS-level credential storage via keyring

pub mod credentials;
pub mod session;

pub use credentials::{
    CredentialError, CredentialProvider, CredentialStore, Credentials, EnvCredentials,
    KeyringCredentials, PLACEHOLDER_IDENTIFIER,
};
pub use session::{SessionData, SessionStore, StoreError, SESSION_FILE};
