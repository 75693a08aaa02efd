// ABOUTME: Workspace backup and restore as a gzip-compressed tar archive.
// ABOUTME: Captures keys, the host ledger, the registry, and per-host data under the workspace root.

use crate::workspace::WorkspacePaths;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("cannot write archive {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("cannot read archive {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot archive {path}: {cause}")]
    Walk { path: PathBuf, cause: String },
}

/// Totals for an export or import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: usize,
    pub directories: usize,
}

/// Write the whole workspace to `dest` as `.tar.gz`.
///
/// Entries are stored relative to the root. The archive holds the private key,
/// so it is created owner-only. An archive written inside the workspace is
/// never included in itself.
pub fn export(paths: &WorkspacePaths, dest: &Path) -> Result<ArchiveSummary, BackupError> {
    let write_err = |source| BackupError::Write {
        path: dest.to_path_buf(),
        source,
    };

    let file = create_private_file(dest).map_err(write_err)?;
    let skip = fs::canonicalize(dest).ok();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.mode(tar::HeaderMode::Complete);

    let mut summary = ArchiveSummary::default();
    let root = paths.root();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| BackupError::Walk {
            path: e.path().unwrap_or(root).to_path_buf(),
            cause: e.to_string(),
        })?;
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if relative.as_os_str().is_empty() {
            continue;
        }
        if skip.is_some() && fs::canonicalize(entry.path()).ok() == skip {
            continue;
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            builder
                .append_dir(relative, entry.path())
                .map_err(write_err)?;
            summary.directories += 1;
        } else if file_type.is_file() {
            builder
                .append_path_with_name(entry.path(), relative)
                .map_err(write_err)?;
            summary.files += 1;
        } else {
            tracing::warn!(path = %entry.path().display(), "skipping symlink or special file");
        }
    }

    let encoder = builder.into_inner().map_err(write_err)?;
    encoder.finish().map_err(write_err)?;

    tracing::info!(
        dest = %dest.display(),
        files = summary.files,
        directories = summary.directories,
        "workspace exported"
    );
    Ok(summary)
}

/// Unpack an archive made by [`export`] over the workspace root.
///
/// Files in the archive replace their local counterparts; anything else in the
/// workspace is left alone. Entries that would land outside the root are refused.
pub fn import(paths: &WorkspacePaths, src: &Path) -> Result<ArchiveSummary, BackupError> {
    let read_err = |source| BackupError::Read {
        path: src.to_path_buf(),
        source,
    };

    let file = File::open(src).map_err(read_err)?;
    let root = paths.root();
    fs::create_dir_all(root).map_err(read_err)?;

    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    let mut summary = ArchiveSummary::default();
    for entry in archive.entries().map_err(read_err)? {
        let mut entry = entry.map_err(read_err)?;
        let is_dir = entry.header().entry_type().is_dir();
        // unpack_in refuses absolute paths and `..` components.
        if !entry.unpack_in(root).map_err(read_err)? {
            let path = entry.path().map(|p| p.into_owned()).unwrap_or_default();
            return Err(read_err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("entry {} escapes the workspace", path.display()),
            )));
        }
        if is_dir {
            summary.directories += 1;
        } else {
            summary.files += 1;
        }
    }

    tracing::info!(
        src = %src.display(),
        files = summary.files,
        directories = summary.directories,
        "workspace imported"
    );
    Ok(summary)
}

#[cfg(unix)]
fn create_private_file(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
