use std::fmt;

use keyring::Entry;
use thiserror::Error;

/// Keychain service name
const SERVICE_NAME: &str = "semfca";

/// Identifier the environment provider falls back to when `FB_EMAIL` is unset
pub const PLACEHOLDER_IDENTIFIER: &str = "your-email@example.com";

/// Secret the environment provider falls back to when `FB_PASSWORD` is unset
pub const PLACEHOLDER_SECRET: &str = "your-password";

pub const IDENTIFIER_VAR: &str = "FB_EMAIL";
pub const SECRET_VAR: &str = "FB_PASSWORD";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("{0}")]
    Missing(String),

    #[error("Keychain error")]
    Keyring(#[from] keyring::Error),

    #[error("Failed to read credentials")]
    Io(#[from] std::io::Error),
}

/// Login identifier and secret. Held in memory only for the login call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    /// True when the identifier was never configured
    pub fn is_placeholder(&self) -> bool {
        self.identifier == PLACEHOLDER_IDENTIFIER
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A source of login credentials.
pub trait CredentialProvider: Send + Sync {
    fn fetch_credentials(&self) -> Result<Credentials, CredentialError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads `FB_EMAIL` / `FB_PASSWORD`, substituting the placeholders when unset.
pub struct EnvCredentials {
    lookup: Lookup,
}

impl EnvCredentials {
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var_or(&self, key: &str, default: &str) -> String {
        (self.lookup)(key)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialProvider for EnvCredentials {
    fn fetch_credentials(&self) -> Result<Credentials, CredentialError> {
        Ok(Credentials::new(
            self.var_or(IDENTIFIER_VAR, PLACEHOLDER_IDENTIFIER),
            self.var_or(SECRET_VAR, PLACEHOLDER_SECRET),
        ))
    }

    fn name(&self) -> &'static str {
        "env"
    }
}

/// Reads the secret for a known identifier from the OS keychain.
pub struct KeyringCredentials {
    identifier: Option<String>,
}

impl KeyringCredentials {
    pub fn new(identifier: Option<String>) -> Self {
        Self { identifier }
    }
}

impl CredentialProvider for KeyringCredentials {
    fn fetch_credentials(&self) -> Result<Credentials, CredentialError> {
        let identifier = self.identifier.clone().ok_or_else(|| {
            CredentialError::Missing(
                "No identifier known for keychain lookup; run `semfca --save-credentials` first"
                    .to_string(),
            )
        })?;
        let secret = CredentialStore::get_password(&identifier)?;
        Ok(Credentials::new(identifier, secret))
    }

    fn name(&self) -> &'static str {
        "keyring"
    }
}

pub struct CredentialStore;

impl CredentialStore {
    /// Store identifier and secret in the OS keychain
    pub fn store(identifier: &str, secret: &str) -> Result<(), CredentialError> {
        Entry::new(SERVICE_NAME, identifier)?.set_password(secret)?;
        Ok(())
    }

    pub fn get_password(identifier: &str) -> Result<String, CredentialError> {
        Ok(Entry::new(SERVICE_NAME, identifier)?.get_password()?)
    }

    pub fn delete(identifier: &str) -> Result<(), CredentialError> {
        Entry::new(SERVICE_NAME, identifier)?.delete_credential()?;
        Ok(())
    }

    pub fn has_credentials(identifier: &str) -> bool {
        Entry::new(SERVICE_NAME, identifier)
            .and_then(|entry| entry.get_password())
            .is_ok()
    }
}
