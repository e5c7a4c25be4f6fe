use std::io::{self, BufRead, Write};

use semfca_core::{CredentialError, CredentialProvider, Credentials};

/// Asks for the identifier on stdin and the secret with echo disabled.
pub struct PromptCredentials {
    default_identifier: Option<String>,
}

impl PromptCredentials {
    pub fn new(default_identifier: Option<String>) -> Self {
        Self { default_identifier }
    }

    fn prompt_identifier(&self) -> io::Result<String> {
        match self.default_identifier {
            Some(ref last) => print!("Email [{}]: ", last),
            None => print!("Email: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        Ok(resolve_identifier(&input, self.default_identifier.as_deref()))
    }
}

/// Blank input falls back to the remembered identifier
fn resolve_identifier(input: &str, default: Option<&str>) -> String {
    let input = input.trim();
    match (input.is_empty(), default) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    }
}

impl CredentialProvider for PromptCredentials {
    fn fetch_credentials(&self) -> Result<Credentials, CredentialError> {
        let identifier = self.prompt_identifier()?;
        if identifier.is_empty() {
            return Err(CredentialError::Missing("Email is required".to_string()));
        }
        let secret = rpassword::prompt_password("Password: ")?;
        Ok(Credentials::new(identifier, secret))
    }

    fn name(&self) -> &'static str {
        "prompt"
    }
}
