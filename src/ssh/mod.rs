// ABOUTME: Remote execution and trust subsystem.
// ABOUTME: Key pair lifecycle, TOFU host verification, credentials, sessions, command relay, and SFTP upload.

mod client;
mod command;
mod credentials;
mod error;
mod keys;
pub mod relay;
mod transfer;
mod trust;

pub use client::{Session, SessionConfig, with_session};
pub use command::{CommandOutput, join_commands};
pub use credentials::{
    AuthMethod, AuthMode, CredentialResolver, Interactivity, KEY_PASSPHRASE_ENV,
    PASSWORD_ENV_PREFIX, SUDO_PASSWORD_ENV_PREFIX, password_env, sudo_password_env,
};
pub use error::{Error, Result};
pub use keys::{KeyAlgorithm, KeyManager, KeyPairPaths, install_key_command};
pub use relay::Prompt;
pub use transfer::{
    FileTransfer, RemoteFs, TransferEntry, TransferSummary, plan_dir, remote_join,
};
pub use trust::{AUTO_ACCEPT_ENV, HostKeyPolicy, TrustStore, fingerprint, ledger_hostname};
