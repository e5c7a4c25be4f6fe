use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Session file name, resolved against the working directory
pub const SESSION_FILE: &str = "session.json";

/// Argon2 salt length for sealed artifacts
const SALT_LEN: usize = 16;

/// ChaCha20-Poly1305 nonce length
const NONCE_LEN: usize = 12;

const KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error")]
    Io(#[from] io::Error),

    #[error("Malformed session file")]
    Parse(#[from] serde_json::Error),

    #[error("Session file is sealed; set SEMFCA_SESSION_PASSPHRASE to open it")]
    PassphraseRequired,

    #[error("Could not open sealed session (wrong passphrase or corrupt file)")]
    Unseal,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Failed to seal session")]
    Seal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionData {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: None,
            cookies: BTreeMap::new(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Sessions without an expiry stay valid until the platform revokes them
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Utc::now() >= at).unwrap_or(false)
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.created_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    /// Render stored cookies as a `Cookie` request header value
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        Some(pairs.join("; "))
    }
}

/// On-disk envelope. Plain artifacts hold the session as JSON, sealed ones
/// hold it encrypted under a passphrase-derived key.
#[derive(Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
enum Artifact {
    Plain {
        session: SessionData,
    },
    Sealed {
        salt: Vec<u8>,
        nonce: Vec<u8>,
        ciphertext: Vec<u8>,
    },
}

/// Reads and writes one session artifact.
pub struct SessionStore {
    path: PathBuf,
    passphrase: Option<String>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            passphrase: None,
        }
    }

    /// Seal saved artifacts (and open sealed ones) with this passphrase
    pub fn with_passphrase(mut self, passphrase: Option<String>) -> Self {
        self.passphrase = passphrase.filter(|p| !p.is_empty());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> io::Result<bool> {
        self.path.try_exists()
    }

    /// Load the session from disk. Returns `None` when no artifact exists.
    pub fn load(&self) -> Result<Option<SessionData>, StoreError> {
        if !self.exists()? {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        let artifact: Artifact = serde_json::from_str(&contents)?;

        let data = match artifact {
            Artifact::Plain { session } => {
                if self.passphrase.is_some() {
                    debug!(path = %self.path.display(), "Plain session loaded; next save will seal it");
                }
                session
            }
            Artifact::Sealed {
                salt,
                nonce,
                ciphertext,
            } => {
                let passphrase = self
                    .passphrase
                    .as_deref()
                    .ok_or(StoreError::PassphraseRequired)?;
                unseal(passphrase, &salt, &nonce, &ciphertext)?
            }
        };

        Ok(Some(data))
    }

    /// Overwrite the artifact with `data`
    pub fn save(&self, data: &SessionData) -> Result<(), StoreError> {
        let artifact = match self.passphrase.as_deref() {
            Some(passphrase) => seal(passphrase, data)?,
            None => Artifact::Plain {
                session: data.clone(),
            },
        };
        let contents = serde_json::to_string_pretty(&artifact)?;
        write_atomic(&self.path, contents.as_bytes())?;
        debug!(path = %self.path.display(), sealed = self.passphrase.is_some(), "Session saved");
        Ok(())
    }

    /// Delete the artifact. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool, StoreError> {
        if !self.exists()? {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        Ok(true)
    }
}

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], StoreError> {
    let mut key = [0u8; KEY_LEN];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| StoreError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

fn seal(passphrase: &str, data: &SessionData) -> Result<Artifact, StoreError> {
    let salt: [u8; SALT_LEN] = rand::random();
    let nonce: [u8; NONCE_LEN] = rand::random();

    let key = derive_key(passphrase, &salt)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let plaintext = serde_json::to_vec(data)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|_| StoreError::Seal)?;

    Ok(Artifact::Sealed {
        salt: salt.to_vec(),
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

fn unseal(
    passphrase: &str,
    salt: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<SessionData, StoreError> {
    if nonce.len() != NONCE_LEN {
        return Err(StoreError::Unseal);
    }

    let key = derive_key(passphrase, salt)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| StoreError::Unseal)?;

    Ok(serde_json::from_slice(&plaintext)?)
}

/// Write to a sibling temp file, then rename over the target
fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = path.with_extension("json.tmp");
    // A leftover temp file would keep its old mode
    match fs::remove_file(&tmp) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    // Session cookies are bearer secrets, never readable by others
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let written = options.open(&tmp).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn sample_session() -> SessionData {
        let mut data = SessionData::new("100004");
        data.access_token = Some("token-abc".to_string());
        data.cookies.insert("c_user".to_string(), "100004".to_string());
        data.cookies.insert("xs".to_string(), "secret".to_string());
        data
    }

    #[test]
    fn test_missing_artifact_loads_none() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().join(SESSION_FILE));
        assert!(!store.exists().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_plain_save_and_load() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().join(SESSION_FILE));
        let data = sample_session();

        store.save(&data).unwrap();
        assert_eq!(store.load().unwrap(), Some(data));

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"format\": \"plain\""));
        // The temp file is renamed away
        assert!(!dir.path().join("session.json.tmp").exists());
    }

    #[test]
    fn test_sealed_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        let store = SessionStore::new(&path).with_passphrase(Some("hunter2".to_string()));
        let data = sample_session();

        store.save(&data).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"format\": \"sealed\""));
        assert!(!raw.contains("token-abc"));

        assert_eq!(store.load().unwrap(), Some(data));
    }

    #[test]
    fn test_sealed_wrong_passphrase() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        SessionStore::new(&path)
            .with_passphrase(Some("right".to_string()))
            .save(&sample_session())
            .unwrap();

        let wrong = SessionStore::new(&path).with_passphrase(Some("wrong".to_string()));
        assert!(matches!(wrong.load(), Err(StoreError::Unseal)));

        let none = SessionStore::new(&path);
        assert!(matches!(none.load(), Err(StoreError::PassphraseRequired)));
    }

    #[test]
    fn test_empty_passphrase_means_plain() {
        let store = SessionStore::new("session.json").with_passphrase(Some(String::new()));
        assert!(store.passphrase.is_none());
    }

    #[test]
    fn test_corrupt_artifact_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(SessionStore::new(&path).load(), Err(StoreError::Parse(_))));
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().join(SESSION_FILE));
        assert!(!store.clear().unwrap());
        store.save(&sample_session()).unwrap();
        assert!(store.clear().unwrap());
        assert!(!store.exists().unwrap());
    }

    #[test]
    fn test_is_expired() {
        let mut data = sample_session();
        assert!(!data.is_expired());
        data.expires_at = Some(Utc::now() - Duration::minutes(1));
        assert!(data.is_expired());
        data.expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(!data.is_expired());
    }

    #[test]
    fn test_age_display() {
        let mut data = sample_session();
        assert_eq!(data.age_display(), "just now");

        data.created_at = Utc::now() - Duration::minutes(5);
        assert_eq!(data.age_display(), "5m ago");

        data.created_at = Utc::now() - Duration::minutes(95);
        assert_eq!(data.age_display(), "2h ago");

        data.created_at = Utc::now() - Duration::days(3);
        assert_eq!(data.age_display(), "3d ago");
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_artifact_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        // A stale temp file with open permissions must not leak its mode
        let stale = dir.path().join("session.json.tmp");
        fs::write(&stale, b"stale").unwrap();
        fs::set_permissions(&stale, fs::Permissions::from_mode(0o644)).unwrap();

        SessionStore::new(&path).save(&sample_session()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!stale.exists());
    }

    #[test]
    fn test_cookie_header() {
        let data = sample_session();
        assert_eq!(data.cookie_header().as_deref(), Some("c_user=100004; xs=secret"));
        assert!(SessionData::new("1").cookie_header().is_none());
    }
}
