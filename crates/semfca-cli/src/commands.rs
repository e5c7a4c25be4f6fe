//! Command-line commands.
//!
//! With no arguments `semfca` restores or creates the session. The flags
//! manage the artifact and the keychain entry without touching the network.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use semfca_core::auth::credentials::IDENTIFIER_VAR;
use semfca_core::{
    Config, CredentialProvider, CredentialSource, CredentialStore,
    EnvCredentials, HttpPlatformClient, KeyringCredentials, OrchestratorConfig,
    SessionOrchestrator, SessionStore, StatusKind, StatusReporter,
};

use crate::prompt::PromptCredentials;

pub const USAGE: &str = "\
Usage: semfca [OPTION]

Restores ./session.json if present, otherwise logs in with FB_EMAIL and
FB_PASSWORD and saves the new session there.

Options:
  --status               Describe the saved session without contacting the server
  --logout               Delete ./session.json
  --save-credentials     Prompt for credentials and store them in the OS keychain
  --forget-credentials   Remove the stored keychain entry
  -h, --help             Show this message

Environment:
  FB_EMAIL, FB_PASSWORD        Login credentials
  SEMFCA_CREDENTIALS           env | keyring | prompt (default: env)
  SEMFCA_API_URL               Auth endpoint base URL
  SEMFCA_TIMEOUT_SECS          HTTP timeout in seconds (default: 30)
  SEMFCA_SESSION_PASSPHRASE    Encrypt session.json with this passphrase
  SEMFCA_LOG_DIR               Also write daily log files here
  RUST_LOG                     Log filter (default: warn)";

const READY_BANNER: &str = "\n✓ semfca is ready to use!\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Run,
    Status,
    Logout,
    SaveCredentials,
    ForgetCredentials,
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        match args {
            [] => Ok(Command::Run),
            [flag] => match flag.as_str() {
                "--status" => Ok(Command::Status),
                "--logout" => Ok(Command::Logout),
                "--save-credentials" => Ok(Command::SaveCredentials),
                "--forget-credentials" => Ok(Command::ForgetCredentials),
                "-h" | "--help" => Ok(Command::Help),
                other => bail!("Unknown argument: {}\n\n{}", other, USAGE),
            },
            _ => bail!("Expected at most one argument\n\n{}", USAGE),
        }
    }
}

pub async fn execute(
    command: Command,
    config: &Config,
    reporter: Arc<dyn StatusReporter>,
) -> Result<()> {
    match command {
        Command::Run => run(config, reporter).await,
        Command::Status => status(config, reporter.as_ref()),
        Command::Logout => logout(reporter.as_ref()),
        Command::SaveCredentials => save_credentials(config, reporter.as_ref()),
        Command::ForgetCredentials => forget_credentials(config, reporter.as_ref()),
        Command::Help => {
            println!("{}", USAGE);
            Ok(())
        }
    }
}

fn credential_provider(config: &Config) -> Box<dyn CredentialProvider> {
    match config.credential_source() {
        CredentialSource::Env => Box::new(EnvCredentials::new()),
        CredentialSource::Keyring => {
            let identifier = config
                .last_identifier
                .clone()
                .or_else(|| std::env::var(IDENTIFIER_VAR).ok());
            Box::new(KeyringCredentials::new(identifier))
        }
        CredentialSource::Prompt => Box::new(PromptCredentials::new(config.last_identifier.clone())),
    }
}

fn session_store(config: &Config) -> Result<SessionStore> {
    let session = OrchestratorConfig::from_current_dir()
        .context("Could not resolve the working directory")?;
    Ok(SessionStore::new(session.session_path).with_passphrase(config.session_passphrase.clone()))
}

async fn run(config: &Config, reporter: Arc<dyn StatusReporter>) -> Result<()> {
    let session = OrchestratorConfig::from_current_dir()
        .context("Could not resolve the working directory")?;
    run_session(config, session, reporter).await
}

async fn run_session(
    config: &Config,
    session: OrchestratorConfig,
    reporter: Arc<dyn StatusReporter>,
) -> Result<()> {
    let client = HttpPlatformClient::new(config.api_base_url(), config.request_timeout())
        .context("Failed to build HTTP client")?
        .with_passphrase(config.session_passphrase.clone());

    let mut orchestrator = SessionOrchestrator::new(
        session,
        client,
        credential_provider(config),
        reporter,
    );
    let ready = orchestrator.run().await?;
    info!(user_id = %ready.user_id, auth_path = ?ready.auth_path, "Session ready");

    println!("{}", READY_BANNER);
    Ok(())
}

fn status(config: &Config, reporter: &dyn StatusReporter) -> Result<()> {
    let store = session_store(config)?;
    match store.load().context("Failed to read the saved session")? {
        Some(data) => {
            let expiry = match data.expires_at {
                Some(_) if data.is_expired() => "expired".to_string(),
                Some(at) => format!("expires {}", at.format("%Y-%m-%d %H:%M UTC")),
                None => "no expiry".to_string(),
            };
            reporter.report(
                "Session Found",
                &format!(
                    "User {}\nSaved {} ({})\n{}",
                    data.user_id,
                    data.age_display(),
                    expiry,
                    store.path().display()
                ),
                StatusKind::Loaded,
            );
        }
        None => reporter.report(
            "No Session",
            "Run `semfca` to log in and create session.json",
            StatusKind::Setup,
        ),
    }
    Ok(())
}

fn logout(reporter: &dyn StatusReporter) -> Result<()> {
    let session = OrchestratorConfig::from_current_dir()
        .context("Could not resolve the working directory")?;
    let store = SessionStore::new(session.session_path);
    if store.clear().context("Failed to delete session file")? {
        reporter.report("Logged Out", &store.path().display().to_string(), StatusKind::Loaded);
    } else {
        reporter.report("Logged Out", "No session file to remove", StatusKind::Setup);
    }
    Ok(())
}

fn save_credentials(config: &Config, reporter: &dyn StatusReporter) -> Result<()> {
    let credentials = PromptCredentials::new(config.last_identifier.clone())
        .fetch_credentials()
        .context("Failed to read credentials")?;
    CredentialStore::store(&credentials.identifier, &credentials.secret)
        .context("Failed to store password in keychain")?;

    // Persist only what the config file held, never env overrides
    let mut stored = Config::load().context("Failed to load config")?;
    stored.last_identifier = Some(credentials.identifier.clone());
    stored.save().context("Failed to save config")?;

    reporter.report(
        "Credentials Saved",
        &format!(
            "Stored in the keychain for {}. Set SEMFCA_CREDENTIALS=keyring to use them.",
            credentials.identifier
        ),
        StatusKind::Loaded,
    );
    Ok(())
}

fn forget_credentials(config: &Config, reporter: &dyn StatusReporter) -> Result<()> {
    let Some(identifier) = config.last_identifier.clone() else {
        bail!("No stored identifier; nothing to forget");
    };
    if CredentialStore::has_credentials(&identifier) {
        CredentialStore::delete(&identifier)
            .context("Failed to delete credential from keychain")?;
    }

    let mut stored = Config::load().context("Failed to load config")?;
    stored.last_identifier = None;
    stored.save().context("Failed to save config")?;

    reporter.report("Credentials Removed", &identifier, StatusKind::Loaded);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use semfca_core::{SessionData, SESSION_FILE};

    #[derive(Default)]
    struct RecordingReporter {
        titles: Mutex<Vec<String>>,
    }

    impl StatusReporter for RecordingReporter {
        fn report(&self, title: &str, _message: &str, _kind: StatusKind) {
            self.titles.lock().unwrap().push(title.to_string());
        }
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(&args(&[])).unwrap(), Command::Run);
        assert_eq!(Command::parse(&args(&["--status"])).unwrap(), Command::Status);
        assert_eq!(Command::parse(&args(&["--logout"])).unwrap(), Command::Logout);
        assert_eq!(
            Command::parse(&args(&["--save-credentials"])).unwrap(),
            Command::SaveCredentials
        );
        assert_eq!(
            Command::parse(&args(&["--forget-credentials"])).unwrap(),
            Command::ForgetCredentials
        );
        assert_eq!(Command::parse(&args(&["-h"])).unwrap(), Command::Help);
    }

    #[test]
    fn test_parse_rejects_unknown_and_extra_arguments() {
        let err = Command::parse(&args(&["--session", "other.json"])).unwrap_err();
        assert!(err.to_string().contains("at most one argument"));

        let err = Command::parse(&args(&["--verbose"])).unwrap_err();
        assert!(err.to_string().contains("Unknown argument: --verbose"));
    }

    #[test]
    fn test_credential_provider_selection() {
        let mut config = Config::default();
        assert_eq!(credential_provider(&config).name(), "env");

        config.credential_source = Some(CredentialSource::Keyring);
        assert_eq!(credential_provider(&config).name(), "keyring");

        config.credential_source = Some(CredentialSource::Prompt);
        assert_eq!(credential_provider(&config).name(), "prompt");
    }

    #[tokio::test]
    async fn test_run_reports_through_given_reporter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        SessionStore::new(&path).save(&SessionData::new("4242")).unwrap();

        let config = Config {
            api_base_url: Some("http://127.0.0.1:9".to_string()),
            request_timeout_secs: Some(2),
            ..Config::default()
        };
        let reporter = Arc::new(RecordingReporter::default());

        let result = run_session(&config, OrchestratorConfig::new(&path), reporter.clone()).await;

        assert!(result.is_err());
        assert_eq!(*reporter.titles.lock().unwrap(), vec!["Session Found".to_string()]);
    }
}
