// ABOUTME: Local host registry stored as config.json in the workspace.
// ABOUTME: Handles loading, saving, host CRUD, and the selected-target file.

mod host;

pub use host::{HostConfig, Target};

use crate::error::{Error, Result};
use crate::workspace::WorkspacePaths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// Every configured target host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Registry {
    #[serde(default, deserialize_with = "deserialize_hosts")]
    pub hosts: Vec<HostConfig>,
}

impl Registry {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::from)
    }

    /// Load the registry; a missing file is an empty registry.
    pub fn load(paths: &WorkspacePaths) -> Result<Self> {
        match fs::read_to_string(paths.registry_file()) {
            Ok(content) => Self::from_json(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, paths: &WorkspacePaths) -> Result<()> {
        fs::create_dir_all(paths.root())?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(paths.registry_file(), json)?;
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&HostConfig> {
        self.hosts.iter().find(|h| h.name == name)
    }

    pub fn get(&self, name: &str) -> Result<&HostConfig> {
        self.find(name)
            .ok_or_else(|| Error::HostNotFound(name.to_string()))
    }

    pub fn add(&mut self, host: HostConfig) -> Result<()> {
        if self.find(&host.name).is_some() {
            return Err(Error::HostExists(host.name));
        }
        self.hosts.push(host);
        Ok(())
    }

    /// Replace the entry called `name`, keeping its position.
    pub fn update(&mut self, name: &str, host: HostConfig) -> Result<()> {
        let slot = self
            .hosts
            .iter_mut()
            .find(|h| h.name == name)
            .ok_or_else(|| Error::HostNotFound(name.to_string()))?;
        *slot = host;
        Ok(())
    }

    /// Remove the entry called `name`. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.hosts.len();
        self.hosts.retain(|h| h.name != name);
        self.hosts.len() != before
    }
}

/// Earlier guardian-cli releases wrote `"Hosts": null` for an empty roster.
fn deserialize_hosts<'de, D>(deserializer: D) -> std::result::Result<Vec<HostConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let hosts: Option<Vec<HostConfig>> = Option::deserialize(deserializer)?;
    Ok(hosts.unwrap_or_default())
}

/// Record `name` as the default target for host-scoped commands.
pub fn select_target(paths: &WorkspacePaths, name: &str) -> Result<()> {
    fs::create_dir_all(paths.root())?;
    fs::write(paths.target_file(), name)?;
    Ok(())
}

/// The selected target, if any.
pub fn selected_target(paths: &WorkspacePaths) -> Result<Option<String>> {
    match fs::read_to_string(paths.target_file()) {
        Ok(name) => {
            let name = name.trim();
            Ok((!name.is_empty()).then(|| name.to_string()))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Forget the selected target. Returns whether one was selected.
pub fn clear_target(paths: &WorkspacePaths) -> Result<bool> {
    match fs::remove_file(paths.target_file()) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Pick the explicit host name, else the selected target.
pub fn resolve_host_name(paths: &WorkspacePaths, explicit: Option<&str>) -> Result<String> {
    match explicit {
        Some(name) => Ok(name.to_string()),
        None => selected_target(paths)?.ok_or(Error::NoTargetSelected),
    }
}
