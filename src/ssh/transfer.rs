// ABOUTME: File and directory upload over SFTP on an authenticated session.
// ABOUTME: Walks local trees parent-before-child and replays them against a RemoteFs.

use super::client::Session;
use super::error::{Error, Result};
use async_trait::async_trait;
use russh_sftp::client::SftpSession;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use walkdir::WalkDir;

/// The remote filesystem operations an upload needs.
#[async_trait]
pub trait RemoteFs: Send + Sync {
    type Writer: AsyncWrite + Unpin + Send;

    /// Create or truncate a file for writing.
    async fn create_file(&self, path: &str) -> io::Result<Self::Writer>;

    /// Create a single directory. Failing because it already exists is allowed.
    async fn create_dir(&self, path: &str) -> io::Result<()>;

    async fn is_dir(&self, path: &str) -> io::Result<bool>;
}

#[async_trait]
impl RemoteFs for SftpSession {
    type Writer = russh_sftp::client::fs::File;

    async fn create_file(&self, path: &str) -> io::Result<Self::Writer> {
        self.create(path).await.map_err(io::Error::other)
    }

    async fn create_dir(&self, path: &str) -> io::Result<()> {
        SftpSession::create_dir(self, path)
            .await
            .map_err(io::Error::other)
    }

    async fn is_dir(&self, path: &str) -> io::Result<bool> {
        match self.metadata(path).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(_) => Ok(false),
        }
    }
}

/// One step of a directory upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEntry {
    /// Path relative to the source root; empty for the root itself.
    pub relative: PathBuf,
    pub is_dir: bool,
}

/// Totals for a finished upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

/// List a local tree in parent-before-child order.
///
/// Symbolic links and special files are skipped with a warning.
pub fn plan_dir(src: &Path) -> Result<Vec<TransferEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Transfer {
            path: e.path().unwrap_or(src).to_path_buf(),
            cause: e.to_string(),
        })?;
        let file_type = entry.file_type();
        if !file_type.is_dir() && !file_type.is_file() {
            tracing::warn!(path = %entry.path().display(), "skipping symlink or special file");
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(src)
            .unwrap_or(entry.path())
            .to_path_buf();
        entries.push(TransferEntry {
            relative,
            is_dir: file_type.is_dir(),
        });
    }
    Ok(entries)
}

/// Join a relative local path onto a remote directory with `/` separators.
pub fn remote_join(base: &str, relative: &Path) -> String {
    let mut path = base.trim_end_matches('/').to_string();
    for component in relative.components() {
        path.push('/');
        path.push_str(&component.as_os_str().to_string_lossy());
    }
    if path.is_empty() { "/".to_string() } else { path }
}

/// Proper ancestors of a remote path, outermost first, excluding the root.
fn remote_ancestors(path: &str) -> Vec<String> {
    let trimmed = path.trim_end_matches('/');
    trimmed
        .match_indices('/')
        .map(|(i, _)| &trimmed[..i])
        .filter(|prefix| !prefix.is_empty() && !prefix.ends_with('/'))
        .map(str::to_string)
        .collect()
}

/// Uploads files and trees through a [`RemoteFs`].
pub struct FileTransfer<F> {
    fs: F,
}

impl<F: RemoteFs> FileTransfer<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    pub fn remote(&self) -> &F {
        &self.fs
    }

    /// Upload `src` to `dst`, as a tree when `src` is a directory.
    ///
    /// Missing parent directories of `dst` are created first.
    pub async fn put(&self, src: &Path, dst: &str) -> Result<TransferSummary> {
        let metadata = tokio::fs::metadata(src).await.map_err(|e| Error::Transfer {
            path: src.to_path_buf(),
            cause: e.to_string(),
        })?;
        for parent in remote_ancestors(dst) {
            self.ensure_dir(src, &parent).await?;
        }
        if metadata.is_dir() {
            self.put_dir(src, dst).await
        } else {
            let bytes = self.put_file(src, dst).await?;
            Ok(TransferSummary {
                files: 1,
                directories: 0,
                bytes,
            })
        }
    }

    /// Copy one file, truncating the destination if it exists.
    pub async fn put_file(&self, src: &Path, dst: &str) -> Result<u64> {
        let fail = |cause: String| Error::Transfer {
            path: src.to_path_buf(),
            cause,
        };

        let mut local = tokio::fs::File::open(src)
            .await
            .map_err(|e| fail(format!("cannot open local file: {e}")))?;
        let mut remote = self
            .fs
            .create_file(dst)
            .await
            .map_err(|e| fail(format!("cannot create {dst}: {e}")))?;

        let copied = tokio::io::copy(&mut local, &mut remote).await;
        // Close the remote handle even when the copy failed.
        let closed = remote.shutdown().await;

        let bytes = copied.map_err(|e| fail(format!("write to {dst} failed: {e}")))?;
        closed.map_err(|e| fail(format!("closing {dst} failed: {e}")))?;

        tracing::debug!(src = %src.display(), dst, bytes, "uploaded file");
        Ok(bytes)
    }

    /// Recreate the tree under `dst`, creating each directory before its contents.
    ///
    /// Stops at the first failing entry; earlier entries stay on the remote.
    pub async fn put_dir(&self, src: &Path, dst: &str) -> Result<TransferSummary> {
        let mut summary = TransferSummary::default();

        for entry in plan_dir(src)? {
            let local = src.join(&entry.relative);
            let remote = remote_join(dst, &entry.relative);

            if entry.is_dir {
                self.ensure_dir(&local, &remote).await?;
                summary.directories += 1;
            } else {
                summary.bytes += self.put_file(&local, &remote).await?;
                summary.files += 1;
            }
        }

        tracing::info!(
            src = %src.display(),
            dst,
            files = summary.files,
            directories = summary.directories,
            "uploaded directory"
        );
        Ok(summary)
    }

    async fn ensure_dir(&self, local: &Path, remote: &str) -> Result<()> {
        match self.fs.create_dir(remote).await {
            Ok(()) => Ok(()),
            Err(e) => match self.fs.is_dir(remote).await {
                Ok(true) => Ok(()),
                _ => Err(Error::Transfer {
                    path: local.to_path_buf(),
                    cause: format!("cannot create directory {remote}: {e}"),
                }),
            },
        }
    }
}

impl FileTransfer<SftpSession> {
    pub async fn close(self) -> Result<()> {
        self.fs.close().await.map_err(|e| Error::CommandFailed(e.to_string()))
    }
}

impl Session {
    /// Start the SFTP subsystem on this session.
    pub async fn sftp(&self) -> Result<FileTransfer<SftpSession>> {
        let channel = self
            .handle()
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to request sftp subsystem: {}", e)))?;

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to start SFTP session: {}", e)))?;

        Ok(FileTransfer::new(sftp))
    }
}
