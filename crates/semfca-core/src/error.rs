use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::api::ClientError;
use crate::auth::CredentialError;
use crate::orchestrator::SessionState;

/// Everything that can stop the session lifecycle. All variants are fatal.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0}")]
    Configuration(String),

    #[error("Could not obtain credentials")]
    Credentials(#[from] CredentialError),

    #[error("Failed to check for session file {}", path.display())]
    ArtifactCheck {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to restore session from {}", path.display())]
    Restore {
        path: PathBuf,
        #[source]
        source: ClientError,
    },

    #[error("Login failed")]
    Login(#[source] ClientError),

    #[error("Failed to save session to {}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: ClientError,
    },

    #[error("Invalid session state transition: {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },
}
