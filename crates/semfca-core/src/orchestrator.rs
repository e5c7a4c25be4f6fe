//! Session lifecycle orchestration.
//!
//! `SessionOrchestrator` decides between restoring the persisted session
//! artifact and a fresh login, persists new sessions, and reports each step.
//! It never exits the process; failures come back as `SessionError`.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{ClientError, PlatformClient};
use crate::auth::{CredentialProvider, SESSION_FILE};
use crate::error::SessionError;
use crate::status::{StatusKind, StatusReporter};

/// Shown when the identifier is still the placeholder
const UNCONFIGURED_MESSAGE: &str = "Please set FB_EMAIL and FB_PASSWORD environment variables";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Start,
    CheckingArtifact,
    Restoring,
    CollectingCredentials,
    Authenticating,
    Persisting,
    Ready,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Failed)
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (*self, next) {
            (Ready | Failed, _) => false,
            (_, Failed) => true,
            (Start, CheckingArtifact)
            | (CheckingArtifact, Restoring)
            | (CheckingArtifact, CollectingCredentials)
            | (CollectingCredentials, Authenticating)
            | (Authenticating, Persisting)
            | (Restoring, Ready)
            | (Persisting, Ready) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Start => "start",
            SessionState::CheckingArtifact => "checking-artifact",
            SessionState::Restoring => "restoring",
            SessionState::CollectingCredentials => "collecting-credentials",
            SessionState::Authenticating => "authenticating",
            SessionState::Persisting => "persisting",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How the ready session was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPath {
    Restored,
    LoggedIn,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub session_path: PathBuf,
}

impl OrchestratorConfig {
    pub fn new(session_path: impl Into<PathBuf>) -> Self {
        Self {
            session_path: session_path.into(),
        }
    }

    /// `session.json` in the current working directory
    pub fn from_current_dir() -> io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?.join(SESSION_FILE)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadySession {
    pub user_id: String,
    pub auth_path: AuthPath,
    pub session_path: PathBuf,
}

pub struct SessionOrchestrator<C> {
    config: OrchestratorConfig,
    client: C,
    credentials: Box<dyn CredentialProvider>,
    reporter: Arc<dyn StatusReporter>,
    state: SessionState,
    history: Vec<SessionState>,
}

impl<C: PlatformClient> SessionOrchestrator<C> {
    pub fn new(
        config: OrchestratorConfig,
        client: C,
        credentials: Box<dyn CredentialProvider>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            config,
            client,
            credentials,
            reporter,
            state: SessionState::Start,
            history: vec![SessionState::Start],
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state visited so far, starting with `Start`
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }

    /// Restore or create the session. May only be called once.
    pub async fn run(&mut self) -> Result<ReadySession, SessionError> {
        let result = self.drive().await;
        if let Err(ref e) = result {
            if !self.state.is_terminal() {
                debug!(state = %self.state, error = %e, "Session setup failed");
                self.state = SessionState::Failed;
                self.history.push(SessionState::Failed);
            }
        }
        result
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = %self.state, to = %next, "Session state transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    async fn drive(&mut self) -> Result<ReadySession, SessionError> {
        self.transition(SessionState::CheckingArtifact)?;

        let path = self.config.session_path.clone();
        let exists = path
            .try_exists()
            .map_err(|source| SessionError::ArtifactCheck {
                path: path.clone(),
                source,
            })?;

        let (auth_path, user_id) = if exists {
            let user_id = self.restore(&path).await?;
            (AuthPath::Restored, user_id)
        } else {
            let user_id = self.fresh_login(&path).await?;
            (AuthPath::LoggedIn, user_id)
        };

        self.transition(SessionState::Ready)?;
        self.reporter.report(
            "Ready",
            &format!("Logged in as {}", user_id),
            StatusKind::Bot,
        );
        info!(%user_id, ?auth_path, "Session ready");

        Ok(ReadySession {
            user_id,
            auth_path,
            session_path: path,
        })
    }

    /// The artifact is authoritative: no fallback to login if it is rejected
    async fn restore(&mut self, path: &Path) -> Result<String, SessionError> {
        self.transition(SessionState::Restoring)?;
        self.reporter
            .report("Session Found", "Restoring from file...", StatusKind::Loaded);

        let restore_error = |source| SessionError::Restore {
            path: path.to_path_buf(),
            source,
        };

        self.client
            .restore_session(path)
            .await
            .map_err(restore_error)?;
        self.authenticated_user().map_err(restore_error)
    }

    async fn fresh_login(&mut self, path: &Path) -> Result<String, SessionError> {
        self.transition(SessionState::CollectingCredentials)?;
        self.reporter.report(
            "First Login",
            "Enter your Facebook credentials",
            StatusKind::Setup,
        );

        let credentials = self.credentials.fetch_credentials()?;
        debug!(provider = self.credentials.name(), identifier = %credentials.identifier, "Credentials collected");
        if credentials.is_placeholder() {
            return Err(SessionError::Configuration(UNCONFIGURED_MESSAGE.to_string()));
        }

        self.transition(SessionState::Authenticating)?;
        self.client
            .login(&credentials.identifier, &credentials.secret)
            .await
            .map_err(SessionError::Login)?;
        drop(credentials);
        let user_id = self.authenticated_user().map_err(SessionError::Login)?;

        self.transition(SessionState::Persisting)?;
        self.client
            .save_session(path)
            .await
            .map_err(|source| SessionError::Persist {
                path: path.to_path_buf(),
                source,
            })?;
        self.reporter.report(
            "Session Saved",
            &path.display().to_string(),
            StatusKind::Loaded,
        );

        Ok(user_id)
    }

    fn authenticated_user(&self) -> Result<String, ClientError> {
        self.client
            .user_id()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or(ClientError::NotAuthenticated)
    }
}
