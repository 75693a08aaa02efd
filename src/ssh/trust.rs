// ABOUTME: Trust-on-first-use ledger of accepted host keys.
// ABOUTME: Verifies presented keys, consults a HostKeyPolicy for unknown ones, and appends accepted entries.

use super::error::{Error, Result};
use crate::prompt;
use parking_lot::Mutex;
use russh::keys::{PublicKey, PublicKeyBase64};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Environment flag that auto-accepts unknown host keys for automation.
pub const AUTO_ACCEPT_ENV: &str = "GUARDIAN_AUTO_ACCEPT_HOST_KEYS";

/// How to decide about a host key that is not in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept and record every unknown key.
    AutoAccept,
    /// Show the fingerprint and ask the operator.
    InteractivePrompt,
    /// Accept only the listed fingerprints.
    Static { accept: HashSet<String> },
}

impl HostKeyPolicy {
    /// AutoAccept when forced or when the automation flag is set, otherwise prompt.
    pub fn from_env(force_accept: bool) -> Self {
        let flag = std::env::var(AUTO_ACCEPT_ENV)
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        if force_accept || flag {
            HostKeyPolicy::AutoAccept
        } else {
            HostKeyPolicy::InteractivePrompt
        }
    }

    pub fn accept_only<I, S>(fingerprints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HostKeyPolicy::Static {
            accept: fingerprints.into_iter().map(Into::into).collect(),
        }
    }

    fn decide(&self, host: &str, fingerprint: &str) -> bool {
        match self {
            HostKeyPolicy::AutoAccept => {
                tracing::warn!(host, fingerprint, "Trust-On-First-Use: accepting unknown host key");
                true
            }
            HostKeyPolicy::Static { accept } => accept.contains(fingerprint),
            HostKeyPolicy::InteractivePrompt => {
                if !prompt::is_interactive() {
                    tracing::warn!(
                        host,
                        "cannot prompt for host key acceptance without a terminal; set {AUTO_ACCEPT_ENV}=1 to trust automatically"
                    );
                    return false;
                }
                eprintln!("Remote target '{host}' sent public key with fingerprint: {fingerprint}");
                prompt::confirm("Do you wish to accept this key and continue?")
            }
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// The append-only ledger of accepted host identities.
#[derive(Debug)]
pub struct TrustStore {
    path: PathBuf,
    policy: HostKeyPolicy,
    append_lock: Mutex<()>,
}

impl TrustStore {
    pub fn new(path: impl Into<PathBuf>, policy: HostKeyPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            append_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept the key if the ledger already has it, otherwise ask the policy.
    ///
    /// Accepted unknown keys are appended; rejected ones leave the ledger untouched.
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> Result<()> {
        let entry = LedgerEntry::new(host, port, key);

        let lines = self.read_lines()?;
        if lines.iter().any(|line| entry.matches(line)) {
            tracing::debug!(host = %entry.hostname, "host key found in ledger");
            return Ok(());
        }

        let fingerprint = fingerprint(key);
        if lines.iter().any(|line| entry.same_host(line)) {
            tracing::warn!(
                host = %entry.hostname,
                fingerprint = %fingerprint,
                "host key differs from the recorded one; treating it as unverified"
            );
        }

        if !self.policy.decide(&entry.hostname, &fingerprint) {
            return Err(Error::UntrustedHost {
                host: entry.hostname,
                fingerprint,
            });
        }

        if self.record(&entry)? {
            tracing::info!(host = %entry.hostname, fingerprint = %fingerprint, "recorded new host key");
        }
        Ok(())
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append `entry` unless a concurrent verification already did.
    /// Returns whether a line was written.
    fn record(&self, entry: &LedgerEntry) -> Result<bool> {
        let _guard = self.append_lock.lock();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Advisory lock against other guardian processes appending at once.
        file.lock()?;
        let written = self.read_lines().and_then(|lines| {
            if lines.iter().any(|line| entry.matches(line)) {
                return Ok(false);
            }
            writeln!(file, "{}", entry.line())?;
            file.flush()?;
            Ok(true)
        });
        let _ = file.unlock();
        written
    }
}

/// One `hostname keytype base64key` ledger line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LedgerEntry {
    hostname: String,
    key_type: String,
    key_data: String,
}

impl LedgerEntry {
    fn new(host: &str, port: u16, key: &PublicKey) -> Self {
        Self {
            hostname: ledger_hostname(host, port),
            key_type: key.algorithm().as_str().to_string(),
            key_data: key.public_key_base64(),
        }
    }

    fn line(&self) -> String {
        format!("{} {} {}", self.hostname, self.key_type, self.key_data)
    }

    fn fields<'a>(line: &'a str) -> Option<(&'a str, &'a str, &'a str)> {
        let mut parts = line.split_whitespace();
        Some((parts.next()?, parts.next()?, parts.next()?))
    }

    fn matches(&self, line: &str) -> bool {
        Self::fields(line).is_some_and(|(host, kind, data)| {
            host == self.hostname && kind == self.key_type && data == self.key_data
        })
    }

    fn same_host(&self, line: &str) -> bool {
        Self::fields(line).is_some_and(|(host, _, _)| host == self.hostname)
    }
}

/// Ledger host field: the bare address on port 22, `[address]:port` otherwise.
pub fn ledger_hostname(host: &str, port: u16) -> String {
    if port == 22 {
        host.to_string()
    } else {
        format!("[{host}]:{port}")
    }
}

/// SHA-256 of the key blob as colon-separated hex pairs.
pub fn fingerprint(key: &PublicKey) -> String {
    let digest = Sha256::digest(key.public_key_bytes());
    digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}
