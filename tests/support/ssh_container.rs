// ABOUTME: SSH container helper for integration tests.
// ABOUTME: Uses bollard to run a shared openssh-server with sudo, password, and key access.

use bollard::Docker;
use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, RemoveContainerOptions, StopContainerOptions,
};
use futures::StreamExt;
use guardian::ssh::{AuthMethod, HostKeyPolicy, KeyAlgorithm, KeyManager, SessionConfig, TrustStore};
use guardian::workspace::WorkspacePaths;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use zeroize::Zeroizing;

const IMAGE: &str = "lscr.io/linuxserver/openssh-server:latest";
const SSH_PORT: u16 = 2222;
pub const TEST_USER: &str = "testuser";
pub const TEST_PASSWORD: &str = "guardian-test-pw";

/// Container info needed for cleanup.
struct ContainerInfo {
    container_id: String,
}

/// Shared container info for cleanup.
static CONTAINER_INFO: OnceLock<ContainerInfo> = OnceLock::new();

/// Cleanup on process exit.
#[ctor::dtor]
fn cleanup_on_exit() {
    let Some(info) = CONTAINER_INFO.get() else {
        return;
    };
    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return;
    };
    rt.block_on(async {
        if let Ok(docker) = Docker::connect_with_local_defaults() {
            let _ = docker
                .stop_container(&info.container_id, None::<StopContainerOptions>)
                .await;
            let _ = docker
                .remove_container(
                    &info.container_id,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await;
        }
    });
}

/// Shared SSH container for all tests.
static SHARED_CONTAINER: tokio::sync::OnceCell<SshContainer> = tokio::sync::OnceCell::const_new();

/// Get the shared SSH container, starting it if needed.
pub async fn shared_container() -> &'static SshContainer {
    SHARED_CONTAINER
        .get_or_init(|| async {
            SshContainer::start()
                .await
                .expect("failed to start SSH container")
        })
        .await
}

/// Running SSH container plus the workspace holding the key it trusts.
pub struct SshContainer {
    port: u16,
    workspace: tempfile::TempDir,
}

impl SshContainer {
    async fn start() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let docker = Docker::connect_with_local_defaults()?;

        // Operator key the container authorizes up front.
        let workspace = tempfile::tempdir()?;
        let paths = WorkspacePaths::new(workspace.path());
        paths.init()?;
        let keys = KeyManager::new(&paths).algorithm(KeyAlgorithm::Ed25519);
        keys.ensure_key_pair()?;
        let public_key = keys.public_key_line()?;

        // Pull image if needed
        let mut pull_stream = docker.create_image(
            Some(CreateImageOptions {
                from_image: Some(IMAGE.to_string()),
                ..Default::default()
            }),
            None,
            None,
        );
        while let Some(result) = pull_stream.next().await {
            result?;
        }

        let port = Self::find_available_port().await?;

        let container_name = format!("guardian-ssh-test-{}", std::process::id());
        let env = vec![
            "PUID=1000".to_string(),
            "PGID=1000".to_string(),
            format!("USER_NAME={TEST_USER}"),
            format!("PUBLIC_KEY={public_key}"),
            "PASSWORD_ACCESS=true".to_string(),
            format!("USER_PASSWORD={TEST_PASSWORD}"),
            "SUDO_ACCESS=true".to_string(),
        ];

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            format!("{}/tcp", SSH_PORT),
            Some(vec![bollard::models::PortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: Some(port.to_string()),
            }]),
        );

        let host_config = bollard::models::HostConfig {
            port_bindings: Some(port_bindings),
            ..Default::default()
        };

        let config = ContainerCreateBody {
            image: Some(IMAGE.to_string()),
            env: Some(env),
            host_config: Some(host_config),
            ..Default::default()
        };

        let container = docker
            .create_container(
                Some(CreateContainerOptions {
                    name: Some(container_name),
                    ..Default::default()
                }),
                config,
            )
            .await?;

        let _ = CONTAINER_INFO.set(ContainerInfo {
            container_id: container.id.clone(),
        });

        docker
            .start_container(
                &container.id,
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await?;

        Self::wait_for_ssh(port).await?;

        Ok(Self { port, workspace })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn paths(&self) -> WorkspacePaths {
        WorkspacePaths::new(self.workspace.path())
    }

    pub fn keys(&self) -> KeyManager {
        KeyManager::new(&self.paths()).algorithm(KeyAlgorithm::Ed25519)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new("127.0.0.1", TEST_USER)
            .name("test-container")
            .port(self.port)
    }

    pub fn key_auth(&self) -> AuthMethod {
        let key = self
            .keys()
            .load_private_key(None)
            .expect("container key should load");
        AuthMethod::Key(Arc::new(key))
    }

    pub fn password_auth(&self) -> AuthMethod {
        AuthMethod::Password(Zeroizing::new(TEST_PASSWORD.to_string()))
    }

    /// Ledger shared by the container tests; unknown keys are accepted.
    pub fn trust(&self) -> Arc<TrustStore> {
        Arc::new(TrustStore::new(
            self.paths().known_hosts(),
            HostKeyPolicy::AutoAccept,
        ))
    }

    async fn find_available_port() -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        drop(listener);
        Ok(port)
    }

    async fn wait_for_ssh(port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        use tokio::io::AsyncReadExt;

        let addr = format!("127.0.0.1:{}", port);
        for _ in 0..60 {
            if let Ok(mut stream) = tokio::net::TcpStream::connect(&addr).await {
                let mut buf = [0u8; 32];
                match tokio::time::timeout(std::time::Duration::from_secs(2), stream.read(&mut buf))
                    .await
                {
                    Ok(Ok(n)) if n > 0 => {
                        let banner = String::from_utf8_lossy(&buf[..n]);
                        if banner.starts_with("SSH-") {
                            // User setup finishes shortly after sshd starts.
                            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                            return Ok(());
                        }
                    }
                    _ => {}
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        }
        Err("SSH container did not become ready in time".into())
    }
}
