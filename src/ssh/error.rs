// ABOUTME: SSH-specific error types.
// ABOUTME: Covers key lifecycle, host trust, authentication, remote commands, and transfers.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("failed to write key file {path}: {source}")]
    KeyPersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("host key for {host} (fingerprint {fingerprint}) was not accepted")]
    UntrustedHost { host: String, fingerprint: String },

    #[error("authentication failed for {user}@{host}")]
    AuthenticationFailed { user: String, host: String },

    #[error("no credential available for {0}: not running on a terminal and no override set")]
    CredentialUnavailable(String),

    #[error("connection to {addr} failed: {reason}")]
    Dial { addr: String, reason: String },

    #[error("remote command exited with status {exit_code}")]
    RemoteCommand { exit_code: u32, output: String },

    #[error("transfer of {path} failed: {cause}")]
    Transfer { path: PathBuf, cause: String },

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("command timed out after {0:?}")]
    CommandTimeout(Duration),

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Exit status of a remote command that ran but failed.
    pub fn remote_exit_code(&self) -> Option<u32> {
        match self {
            Error::RemoteCommand { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
