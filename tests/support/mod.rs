// ABOUTME: Test support utilities.
// ABOUTME: Provides the SSH container and in-process server helpers, tracing setup, and fixed host keys.

use guardian::ssh::TrustStore;
use russh::keys::PublicKey;
use std::sync::Once;

// Each test binary only uses some of these modules, so allow dead_code.
#[allow(dead_code)]
pub mod ssh_container;
#[allow(dead_code)]
pub mod ssh_server;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("guardian=debug".parse().unwrap())
            .add_directive("russh=info".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A fixed ed25519 host key.
#[allow(dead_code)]
pub const HOST_KEY_A: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAICytdlvwzdo1/iZtz1tHuyF8HDVzm1h/6OqNYMTLxmwv host-a";

/// A second, different ed25519 host key.
#[allow(dead_code)]
pub const HOST_KEY_B: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAINvYN/UKWEPJLqIyIDvFbKDL+z9qL3BWEWl8AU4rl8nz host-b";

#[allow(dead_code)]
pub fn host_key(openssh: &str) -> PublicKey {
    PublicKey::from_openssh(openssh).expect("fixture key should parse")
}

/// Lines of the ledger behind `store`, empty when it does not exist yet.
#[allow(dead_code)]
pub fn ledger_lines(store: &TrustStore) -> Vec<String> {
    std::fs::read_to_string(store.path())
        .map(|text| text.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
