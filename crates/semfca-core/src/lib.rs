//! semfca core - session lifecycle for a credential-bearing platform client.
//!
//! On startup the `SessionOrchestrator` either restores the persisted
//! `session.json` artifact or collects credentials, logs in, and persists the
//! new session. The platform itself sits behind the `PlatformClient` trait.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod status;
pub mod utils;

pub use api::{ClientError, HttpPlatformClient, PlatformClient};
pub use auth::{
    CredentialError, CredentialProvider, CredentialStore, Credentials, EnvCredentials,
    KeyringCredentials, SessionData, SessionStore, SESSION_FILE,
};
pub use config::{Config, CredentialSource};
pub use error::SessionError;
pub use orchestrator::{AuthPath, OrchestratorConfig, ReadySession, SessionOrchestrator, SessionState};
pub use status::{ConsoleReporter, StatusKind, StatusReporter, STATUS_TARGET};
