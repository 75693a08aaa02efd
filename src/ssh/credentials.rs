// ABOUTME: Credential negotiation for a connection attempt.
// ABOUTME: Resolves password or key authentication, plus elevation secrets, from env overrides or prompts.

use super::error::{Error, Result};
use super::keys::KeyManager;
use crate::prompt;
use russh::keys::PrivateKey;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Per-host password override: `GUARDIAN_PASSWORD_<HOST>`.
pub const PASSWORD_ENV_PREFIX: &str = "GUARDIAN_PASSWORD_";
/// Per-host elevation password override: `GUARDIAN_SUDO_PASSWORD_<HOST>`.
pub const SUDO_PASSWORD_ENV_PREFIX: &str = "GUARDIAN_SUDO_PASSWORD_";
/// Passphrase for the operator private key. Unset means unencrypted.
pub const KEY_PASSPHRASE_ENV: &str = "GUARDIAN_KEY_PASSPHRASE";

/// Which kind of credential to negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Password,
    Key,
}

/// A credential ready for one authentication attempt.
pub enum AuthMethod {
    Password(Zeroizing<String>),
    Key(Arc<PrivateKey>),
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Password(_) => f.write_str("Password(<redacted>)"),
            AuthMethod::Key(key) => write!(f, "Key({})", key.algorithm().as_str()),
        }
    }
}

/// Whether the resolver may fall back to asking the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interactivity {
    Prompt,
    Disabled,
}

impl Interactivity {
    /// Prompt only when stdin is a terminal.
    pub fn detect() -> Self {
        if prompt::is_interactive() {
            Interactivity::Prompt
        } else {
            Interactivity::Disabled
        }
    }
}

pub struct CredentialResolver {
    keys: KeyManager,
    interactivity: Interactivity,
}

impl CredentialResolver {
    pub fn new(keys: KeyManager, interactivity: Interactivity) -> Self {
        Self {
            keys,
            interactivity,
        }
    }

    pub fn resolve(&self, host: &str, mode: AuthMode) -> Result<AuthMethod> {
        match mode {
            AuthMode::Password => {
                let password = self.secret(
                    host,
                    &password_env(host),
                    &format!("Password for {host}: "),
                )?;
                Ok(AuthMethod::Password(password))
            }
            AuthMode::Key => {
                let passphrase = std::env::var(KEY_PASSPHRASE_ENV).ok().map(Zeroizing::new);
                let key = self
                    .keys
                    .load_private_key(passphrase.as_deref().map(String::as_str))?;
                Ok(AuthMethod::Key(Arc::new(key)))
            }
        }
    }

    /// Password answering the remote elevation prompt.
    pub fn elevation_password(&self, host: &str) -> Result<Zeroizing<String>> {
        self.secret(
            host,
            &sudo_password_env(host),
            &format!("Elevation (sudo) password for {host}: "),
        )
    }

    fn secret(&self, host: &str, env_key: &str, label: &str) -> Result<Zeroizing<String>> {
        if let Ok(value) = std::env::var(env_key) {
            tracing::debug!(host, env = env_key, "using credential override from environment");
            return Ok(Zeroizing::new(value));
        }

        if self.interactivity == Interactivity::Disabled {
            return Err(Error::CredentialUnavailable(host.to_string()));
        }

        prompt::masked(label).map_err(|e| {
            tracing::warn!(host, error = %e, "reading credential from terminal failed");
            Error::CredentialUnavailable(host.to_string())
        })
    }
}

pub fn password_env(host: &str) -> String {
    format!("{PASSWORD_ENV_PREFIX}{}", env_suffix(host))
}

pub fn sudo_password_env(host: &str) -> String {
    format!("{SUDO_PASSWORD_ENV_PREFIX}{}", env_suffix(host))
}

/// Upper-case the host name and replace anything outside `[A-Z0-9]` with `_`.
fn env_suffix(host: &str) -> String {
    host.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
