// ABOUTME: Command handlers for the guardian CLI.
// ABOUTME: Shares the workspace, output, and trust store between subcommands through Context.

mod backup;
mod exec;
mod host;
mod put;
mod reset;
mod select;

pub use backup::{export, import};
pub use exec::exec_command;
pub use host::{add_host, delete_host, list_hosts, update_host};
pub use put::put;
pub use reset::reset;
pub use select::select;
pub use test::test_host;

use guardian::config::{self, HostConfig, Registry};
use guardian::error::Result;
use guardian::output::Output;
use guardian::ssh::{CredentialResolver, HostKeyPolicy, Interactivity, KeyManager, TrustStore};
use guardian::workspace::WorkspacePaths;
use std::sync::Arc;

/// Everything a command needs from the local workspace.
pub struct Context {
    pub paths: WorkspacePaths,
    pub output: Output,
    trust: Arc<TrustStore>,
}

impl Context {
    pub fn new(paths: WorkspacePaths, output: Output, accept_host_keys: bool) -> Self {
        let trust = TrustStore::new(
            paths.known_hosts(),
            HostKeyPolicy::from_env(accept_host_keys),
        );
        Self {
            paths,
            output,
            trust: Arc::new(trust),
        }
    }

    pub fn trust(&self) -> Arc<TrustStore> {
        Arc::clone(&self.trust)
    }

    pub fn keys(&self) -> KeyManager {
        KeyManager::new(&self.paths)
    }

    pub fn credentials(&self) -> CredentialResolver {
        CredentialResolver::new(self.keys(), Interactivity::detect())
    }

    /// Look up `--host`, or the selected target when it is omitted.
    pub fn target_host(&self, explicit: Option<&str>) -> Result<HostConfig> {
        let name = config::resolve_host_name(&self.paths, explicit)?;
        let registry = Registry::load(&self.paths)?;
        Ok(registry.get(&name)?.clone())
    }
}
