// ABOUTME: Application-wide error types for guardian.
// ABOUTME: Uses thiserror for ergonomic error handling and maps errors to exit codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("host '{0}' is not configured; add it first")]
    HostNotFound(String),

    #[error("host with name '{0}' already exists, did you mean to update it?")]
    HostExists(String),

    #[error("no target selected; pass --host or run `guardian select <name>`")]
    NoTargetSelected,

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Ssh(#[from] crate::ssh::Error),

    #[error(transparent)]
    Backup(#[from] crate::backup::BackupError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code: the remote status for failed remote commands, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Ssh(e) => e
                .remote_exit_code()
                .map(|code| code.clamp(1, 255) as i32)
                .unwrap_or(1),
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
