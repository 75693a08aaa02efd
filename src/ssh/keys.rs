// ABOUTME: Local operator key pair lifecycle.
// ABOUTME: Generates the pair once, persists it both-or-neither, and builds the remote install command.

use super::error::{Error, Result};
use crate::workspace::WorkspacePaths;
use russh::keys::ssh_key::{Algorithm, LineEnding, PrivateKey};
use russh::keys::load_secret_key;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Key algorithm for newly generated pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyAlgorithm {
    /// 4096-bit RSA.
    #[default]
    Rsa4096,
    Ed25519,
}

impl KeyAlgorithm {
    fn file_stem(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa4096 => "id_rsa",
            KeyAlgorithm::Ed25519 => "id_ed25519",
        }
    }

    fn ssh_algorithm(&self) -> Algorithm {
        match self {
            // ssh-key sizes random RSA keys at 4096 bits.
            KeyAlgorithm::Rsa4096 => Algorithm::Rsa { hash: None },
            KeyAlgorithm::Ed25519 => Algorithm::Ed25519,
        }
    }
}

/// Locations of the persisted key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairPaths {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

/// Owns the single operator key pair of a workspace.
#[derive(Debug, Clone)]
pub struct KeyManager {
    dir: PathBuf,
    algorithm: KeyAlgorithm,
}

impl KeyManager {
    pub fn new(paths: &WorkspacePaths) -> Self {
        Self {
            dir: paths.ssh_keys_dir(),
            algorithm: KeyAlgorithm::default(),
        }
    }

    pub fn algorithm(mut self, algorithm: KeyAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn paths(&self) -> KeyPairPaths {
        let private_key = self.dir.join(self.algorithm.file_stem());
        let public_key = self.dir.join(format!("{}.pub", self.algorithm.file_stem()));
        KeyPairPaths {
            private_key,
            public_key,
        }
    }

    /// Return the key pair paths, generating the pair if either file is missing.
    pub fn ensure_key_pair(&self) -> Result<KeyPairPaths> {
        let paths = self.paths();
        if paths.private_key.is_file() && paths.public_key.is_file() {
            return Ok(paths);
        }

        tracing::info!(
            dir = %self.dir.display(),
            "SSH key pair not present, generating a new one"
        );

        let (private_text, public_text) = self.generate()?;
        self.persist(&paths, &private_text, &public_text)?;
        Ok(paths)
    }

    fn generate(&self) -> Result<(zeroize::Zeroizing<String>, String)> {
        let mut key = PrivateKey::random(&mut rand::rngs::OsRng, self.algorithm.ssh_algorithm())
            .map_err(|e| Error::KeyGeneration(e.to_string()))?;
        key.set_comment(key_comment());

        let private_text = key
            .to_openssh(LineEnding::LF)
            .map_err(|e| Error::KeyGeneration(e.to_string()))?;
        let public_text = key
            .public_key()
            .to_openssh()
            .map_err(|e| Error::KeyGeneration(e.to_string()))?;
        Ok((private_text, public_text))
    }

    /// Write both halves to temporary files, then rename them into place.
    ///
    /// The pair only counts as present once both renames have landed, so an
    /// interrupted write is regenerated by the next call.
    fn persist(&self, paths: &KeyPairPaths, private_text: &str, public_text: &str) -> Result<()> {
        create_keys_dir(&self.dir).map_err(|source| Error::KeyPersist {
            path: self.dir.clone(),
            source,
        })?;

        let private_tmp = tmp_path(&paths.private_key);
        let public_tmp = tmp_path(&paths.public_key);

        write_owner_only(&private_tmp, private_text.as_bytes()).map_err(|source| {
            Error::KeyPersist {
                path: private_tmp.clone(),
                source,
            }
        })?;
        write_owner_only(&public_tmp, format!("{public_text}\n").as_bytes()).map_err(|source| {
            let _ = fs::remove_file(&private_tmp);
            Error::KeyPersist {
                path: public_tmp.clone(),
                source,
            }
        })?;

        // Drop any stale half before the new pair lands.
        let _ = fs::remove_file(&paths.public_key);
        fs::rename(&private_tmp, &paths.private_key).map_err(|source| Error::KeyPersist {
            path: paths.private_key.clone(),
            source,
        })?;
        fs::rename(&public_tmp, &paths.public_key).map_err(|source| Error::KeyPersist {
            path: paths.public_key.clone(),
            source,
        })?;
        Ok(())
    }

    /// The public key as a single `keytype base64 comment` line.
    pub fn public_key_line(&self) -> Result<String> {
        let path = self.paths().public_key;
        let text = fs::read_to_string(&path).map_err(|e| Error::KeyLoadFailed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(text.trim().to_string())
    }

    /// Load the private key, decrypting it when a non-empty passphrase is given.
    pub fn load_private_key(&self, passphrase: Option<&str>) -> Result<PrivateKey> {
        let path = self.paths().private_key;
        let passphrase = passphrase.filter(|p| !p.is_empty());
        load_secret_key(&path, passphrase).map_err(|e| Error::KeyLoadFailed {
            path,
            reason: e.to_string(),
        })
    }

    /// Delete the keys directory, including the host ledger.
    pub fn reset(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Error::KeyPersist {
                path: self.dir.clone(),
                source,
            }),
        }
    }
}

/// Remote shell command that appends `key_line` to `~/.ssh/authorized_keys`
/// unless an identical line is already there.
pub fn install_key_command(key_line: &str) -> String {
    let quoted = shell_quote(key_line.trim());
    [
        "umask 077".to_string(),
        "mkdir -p \"$HOME/.ssh\"".to_string(),
        "touch \"$HOME/.ssh/authorized_keys\"".to_string(),
        format!(
            "(grep -qxF {quoted} \"$HOME/.ssh/authorized_keys\" || printf '%s\\n' {quoted} >> \"$HOME/.ssh/authorized_keys\")"
        ),
    ]
    .join(" && ")
}

/// Single-quote a string for a POSIX shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn key_comment() -> String {
    format!("guardian@{}", gethostname::gethostname().to_string_lossy())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(unix)]
fn create_keys_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    if dir.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_keys_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

fn write_owner_only(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
