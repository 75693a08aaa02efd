// ABOUTME: On-disk layout of the local guardian workspace.
// ABOUTME: Resolved once from GUARDIAN_HOME or ~/.guardian and passed to every component.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable overriding the workspace root.
pub const HOME_ENV: &str = "GUARDIAN_HOME";

const DEFAULT_DIR: &str = ".guardian";
const SSH_KEYS_DIR: &str = "ssh-keys";
const KNOWN_HOSTS_FILE: &str = "known_hosts";
const REGISTRY_FILE: &str = "config.json";
const TARGET_FILE: &str = ".target";
const HOST_DATA_DIR: &str = "host_data";

/// Every path the tool reads or writes, derived from a single root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    root: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the root from `GUARDIAN_HOME`, falling back to `~/.guardian`.
    pub fn from_env() -> io::Result<Self> {
        if let Some(root) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(root));
        }
        let home = dirs::home_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("cannot locate home directory; set {HOME_ENV}"),
            )
        })?;
        Ok(Self::new(home.join(DEFAULT_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ssh_keys_dir(&self) -> PathBuf {
        self.root.join(SSH_KEYS_DIR)
    }

    /// The TOFU ledger of accepted host keys.
    pub fn known_hosts(&self) -> PathBuf {
        self.ssh_keys_dir().join(KNOWN_HOSTS_FILE)
    }

    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    pub fn target_file(&self) -> PathBuf {
        self.root.join(TARGET_FILE)
    }

    pub fn host_data_dir(&self, name: &str) -> PathBuf {
        self.root.join(HOST_DATA_DIR).join(name)
    }

    /// Create the workspace directories and an empty ledger if missing.
    pub fn init(&self) -> io::Result<()> {
        fs::create_dir_all(self.root.join(HOST_DATA_DIR))?;
        create_private_dir(&self.ssh_keys_dir())?;

        let ledger = self.known_hosts();
        if !ledger.exists() {
            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&ledger)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    if path.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new().recursive(true).mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}
