// ABOUTME: In-process SSH server with a scripted shell for session tests.
// ABOUTME: Runs on the test's own runtime, so connection tests need neither docker nor sshd.

use guardian::ssh::{AuthMethod, SessionConfig, fingerprint};
use rand::rngs::OsRng;
use russh::keys::ssh_key::{Algorithm, PrivateKey, PublicKey};
use russh::server::{self, Auth, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec, Pty};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use zeroize::Zeroizing;

pub const USER: &str = "tester";
pub const PASSWORD: &str = "scripted-pw";

/// Command that prompts like sudo and prints `0` once the password is typed.
pub const SUDO_COMMAND: &str = "sudo id -u";

/// Understands `true`, `false`, `echo TEXT`, `exit N` joined by ` && `,
/// `sleep N` (silent, then `done`), and [`SUDO_COMMAND`].
#[derive(Clone)]
struct ScriptedShell {
    client_key: PublicKey,
    sudo_channel: Option<ChannelId>,
    typed: Vec<u8>,
}

fn run_sequence(command: &str) -> (String, u32) {
    let mut output = String::new();
    for step in command.split(" && ") {
        let status = match step.trim() {
            "true" => 0,
            "false" => 1,
            step if step.starts_with("echo ") => {
                output.push_str(&step["echo ".len()..]);
                output.push('\n');
                0
            }
            step if step.starts_with("exit ") => step["exit ".len()..].parse().unwrap_or(2),
            step => {
                output.push_str(&format!("sh: {step}: not found\n"));
                127
            }
        };
        if status != 0 {
            return (output, status);
        }
    }
    (output, 0)
}

fn finish(
    session: &mut Session,
    channel: ChannelId,
    output: &str,
    status: u32,
) -> Result<(), russh::Error> {
    if !output.is_empty() {
        session.data(channel, CryptoVec::from(output.to_string()))?;
    }
    session.exit_status_request(channel, status)?;
    session.eof(channel)?;
    session.close(channel)
}

impl server::Handler for ScriptedShell {
    type Error = russh::Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        if user == USER && password == PASSWORD {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::reject())
        }
    }

    async fn auth_publickey(&mut self, user: &str, key: &PublicKey) -> Result<Auth, Self::Error> {
        if user == USER && key.key_data() == self.client_key.key_data() {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::reject())
        }
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_success(channel)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_success(channel)?;
        let command = String::from_utf8_lossy(data).into_owned();

        if command == SUDO_COMMAND {
            self.sudo_channel = Some(channel);
            self.typed.clear();
            return session.data(
                channel,
                CryptoVec::from(format!("[sudo] password for {USER}: ")),
            );
        }

        if let Some(secs) = command
            .strip_prefix("sleep ")
            .and_then(|s| s.parse::<u64>().ok())
        {
            let handle = session.handle();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                let _ = handle
                    .data(channel, CryptoVec::from("done\n".to_string()))
                    .await;
                let _ = handle.exit_status_request(channel, 0).await;
                let _ = handle.eof(channel).await;
                let _ = handle.close(channel).await;
            });
            return Ok(());
        }

        let (output, status) = run_sequence(&command);
        finish(session, channel, &output, status)
    }

    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if self.sudo_channel != Some(channel) {
            return Ok(());
        }
        self.typed.extend_from_slice(data);
        let Some(end) = self.typed.iter().position(|b| *b == b'\n') else {
            return Ok(());
        };
        let answer = String::from_utf8_lossy(&self.typed[..end])
            .trim_end_matches('\r')
            .to_string();
        self.typed.clear();
        self.sudo_channel = None;

        if answer == PASSWORD {
            finish(session, channel, "\r\n0\r\n", 0)
        } else {
            finish(session, channel, "\r\nSorry, try again.\r\n", 1)
        }
    }
}

/// A listening scripted server; it stops with the test's runtime.
pub struct ScriptedServer {
    port: u16,
    host_key: PublicKey,
    client_key: Arc<PrivateKey>,
}

impl ScriptedServer {
    pub async fn start() -> Self {
        let host_key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        let client_key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        let public_host_key = host_key.public_key().clone();

        let shell = ScriptedShell {
            client_key: client_key.public_key().clone(),
            sudo_channel: None,
            typed: Vec::new(),
        };
        let config = Arc::new(server::Config {
            inactivity_timeout: None,
            auth_rejection_time: Duration::ZERO,
            auth_rejection_time_initial: Some(Duration::ZERO),
            keys: vec![host_key],
            ..Default::default()
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let config = Arc::clone(&config);
                let shell = shell.clone();
                tokio::spawn(async move {
                    if let Ok(running) = server::run_stream(config, socket, shell).await {
                        let _ = running.await;
                    }
                });
            }
        });

        Self {
            port,
            host_key: public_host_key,
            client_key: Arc::new(client_key),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new("127.0.0.1", USER)
            .port(self.port)
            .connect_timeout(Duration::from_secs(5))
    }

    pub fn key_auth(&self) -> AuthMethod {
        AuthMethod::Key(Arc::clone(&self.client_key))
    }

    pub fn password_auth(&self) -> AuthMethod {
        AuthMethod::Password(Zeroizing::new(PASSWORD.to_string()))
    }

    pub fn host_fingerprint(&self) -> String {
        fingerprint(&self.host_key)
    }
}
