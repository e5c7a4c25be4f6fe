//! Client seam between the session orchestrator and the platform.
//!
//! `PlatformClient` is the capability set the orchestrator needs. The HTTP
//! implementation talks to a token endpoint and keeps exactly one session
//! in memory, persisting it through `SessionStore`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::{SessionData, SessionStore};

use super::ClientError;

// ============================================================================
// Constants
// ============================================================================

/// Login endpoint, relative to the base URL
const LOGIN_PATH: &str = "/auth/login";

/// Session check endpoint, relative to the base URL
const VERIFY_PATH: &str = "/auth/me";

/// Cookie that carries the user id when the login body omits it
const USER_COOKIE: &str = "c_user";

/// Operations the session orchestrator needs from a platform client.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Authenticate with an identifier and secret, replacing any held session
    async fn login(&mut self, identifier: &str, secret: &str) -> Result<(), ClientError>;

    /// Load and validate a previously saved session from `path`
    async fn restore_session(&mut self, path: &Path) -> Result<(), ClientError>;

    /// Write the held session to `path`
    async fn save_session(&self, path: &Path) -> Result<(), ClientError>;

    /// Id of the authenticated user, once logged in or restored
    fn user_id(&self) -> Option<&str>;
}

/// Login body. Deployments name the user id differently, and some send
/// more than one of the spellings.
#[derive(Debug, Default, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    user_id: Option<serde_json::Value>,
    #[serde(default, rename = "userID")]
    user_id_camel: Option<serde_json::Value>,
    #[serde(default)]
    uid: Option<serde_json::Value>,
    #[serde(default)]
    access_token: Option<String>,
    /// Seconds until the token expires
    #[serde(default)]
    expires_in: Option<i64>,
}

/// HTTP client for a token-issuing auth endpoint.
pub struct HttpPlatformClient {
    client: Client,
    base_url: String,
    passphrase: Option<String>,
    session: Option<SessionData>,
}

impl HttpPlatformClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            passphrase: None,
            session: None,
        })
    }

    /// Seal saved sessions with a passphrase
    pub fn with_passphrase(mut self, passphrase: Option<String>) -> Self {
        self.passphrase = passphrase;
        self
    }

    pub fn session(&self) -> Option<&SessionData> {
        self.session.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn store(&self, path: &Path) -> SessionStore {
        SessionStore::new(path).with_passphrase(self.passphrase.clone())
    }

    async fn check_response(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(%status, body_len = body.len(), "Request failed");
        Err(ClientError::from_status(status, &body))
    }

    /// Extract `name=value` from a `Set-Cookie` header value
    fn parse_set_cookie(value: &str) -> Option<(String, String)> {
        let pair = value.split(';').next()?;
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), value.trim().to_string()))
    }

    fn collect_cookies(headers: &header::HeaderMap) -> BTreeMap<String, String> {
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(Self::parse_set_cookie)
            .collect()
    }

    fn id_to_string(value: &serde_json::Value) -> Option<String> {
        match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn session_from_login(
        body: LoginResponse,
        cookies: BTreeMap<String, String>,
    ) -> Result<SessionData, ClientError> {
        let user_id = [&body.user_id, &body.user_id_camel, &body.uid]
            .into_iter()
            .flatten()
            .find_map(Self::id_to_string)
            .or_else(|| cookies.get(USER_COOKIE).cloned())
            .ok_or_else(|| {
                ClientError::InvalidResponse("login response carried no user id".to_string())
            })?;

        let mut data = SessionData::new(user_id);
        data.access_token = body.access_token;
        data.cookies = cookies;
        data.expires_at = body
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));
        Ok(data)
    }

    /// Ask the platform whether a restored session is still accepted
    async fn verify(&self, data: &SessionData) -> Result<(), ClientError> {
        let url = format!("{}{}", self.base_url, VERIFY_PATH);

        let mut request = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json");
        if let Some(ref token) = data.access_token {
            request = request.bearer_auth(token);
        }
        if let Some(cookie) = data.cookie_header() {
            request = request.header(header::COOKIE, cookie);
        }

        let response = request.send().await?;
        Self::check_response(response).await?;
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn login(&mut self, identifier: &str, secret: &str) -> Result<(), ClientError> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        debug!(%url, "Sending login request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .form(&[("email", identifier), ("password", secret)])
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let cookies = Self::collect_cookies(response.headers());

        let text = response.text().await?;
        let body: LoginResponse = if text.trim().is_empty() {
            LoginResponse::default()
        } else {
            serde_json::from_str(&text).map_err(|e| {
                ClientError::InvalidResponse(format!("Failed to parse login response: {}", e))
            })?
        };

        let data = Self::session_from_login(body, cookies)?;
        info!(user_id = %data.user_id, "Logged in");
        self.session = Some(data);
        Ok(())
    }

    async fn restore_session(&mut self, path: &Path) -> Result<(), ClientError> {
        let data = self
            .store(path)
            .load()?
            .ok_or_else(|| ClientError::SessionNotFound(path.display().to_string()))?;

        if data.is_expired() {
            return Err(ClientError::SessionExpired);
        }
        if data.user_id.is_empty() {
            return Err(ClientError::InvalidResponse(
                "session file carries no user id".to_string(),
            ));
        }

        self.verify(&data).await?;
        info!(user_id = %data.user_id, age = %data.age_display(), "Session restored");
        self.session = Some(data);
        Ok(())
    }

    async fn save_session(&self, path: &Path) -> Result<(), ClientError> {
        let data = self.session.as_ref().ok_or(ClientError::NotAuthenticated)?;
        self.store(path).save(data)?;
        Ok(())
    }

    fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|d| d.user_id.as_str())
    }
}
