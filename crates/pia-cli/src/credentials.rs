//! Minimal `CredentialSource` (spec.md 6, 9): an environment-variable pair,
//! falling back to a plaintext `user\npassword` file named on the command
//! line. Explicitly not a secret-store integration - that non-goal stays
//! unimplemented by design.

use pia_controller::{CredentialError, CredentialSource};
use std::path::PathBuf;

const USERNAME_VAR: &str = "PIA_USERNAME";
const PASSWORD_VAR: &str = "PIA_PASSWORD";

pub enum EnvOrFileCredentialSource {
    Env,
    File(PathBuf),
}

impl EnvOrFileCredentialSource {
    pub fn env() -> Self {
        Self::Env
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }
}

impl CredentialSource for EnvOrFileCredentialSource {
    fn get(&self) -> Result<(String, String), CredentialError> {
        match self {
            Self::Env => {
                let username =
                    std::env::var(USERNAME_VAR).map_err(|_| CredentialError::NotConfigured)?;
                let password =
                    std::env::var(PASSWORD_VAR).map_err(|_| CredentialError::NotConfigured)?;
                Ok((username, password))
            }
            Self::File(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|_| CredentialError::NotConfigured)?;
                let mut lines = content.lines();
                let username = lines.next().ok_or(CredentialError::NotConfigured)?;
                let password = lines.next().ok_or(CredentialError::NotConfigured)?;
                Ok((username.to_string(), password.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_source_reads_two_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.txt");
        std::fs::write(&path, "someuser\nsomepass\n").unwrap();

        let source = EnvOrFileCredentialSource::file(&path);
        let (user, pass) = source.get().unwrap();
        assert_eq!(user, "someuser");
        assert_eq!(pass, "somepass");
    }

    #[test]
    fn missing_file_is_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let source = EnvOrFileCredentialSource::file(dir.path().join("missing.txt"));
        assert!(matches!(source.get(), Err(CredentialError::NotConfigured)));
    }
}
