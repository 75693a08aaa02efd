// ABOUTME: SSH session management using russh.
// ABOUTME: Dials, verifies the host through the TrustStore, authenticates, and scopes session lifetime.

use super::credentials::AuthMethod;
use super::error::{Error, Result};
use super::trust::{TrustStore, fingerprint, ledger_hostname};
use parking_lot::Mutex;
use russh::client::{self, Config, Handle};
use russh::keys::{PrivateKeyWithHashAlg, ssh_key};
use russh::Disconnect;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;

/// Unanswered keepalives tolerated before the transport is dropped.
const KEEPALIVE_MAX: usize = 3;

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Registry name of the host, used for logging.
    pub name: String,
    /// Remote address to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Bound on the TCP dial, and separately on the key exchange minus any
    /// time spent waiting for the operator's host key decision (default: 30 seconds).
    pub connect_timeout: Duration,
    /// Bound on each command, batch or interactive (default: 5 minutes).
    pub command_timeout: Duration,
    /// Idle time before a keepalive is sent (default: 15 seconds).
    pub keepalive_interval: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            name: host.clone(),
            host,
            port: 22,
            user: user.into(),
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(300), // 5 minutes
            keepalive_interval: Duration::from_secs(15),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Transport settings. Silence from a busy remote command is not a failure:
    /// liveness comes from keepalives and commands are bounded by `command_timeout`.
    fn transport(&self) -> Config {
        Config {
            inactivity_timeout: None,
            keepalive_interval: Some(self.keepalive_interval),
            keepalive_max: KEEPALIVE_MAX,
            ..Default::default()
        }
    }
}

/// SSH client handler for russh.
pub(crate) struct ClientHandler {
    host: String,
    port: u16,
    trust: Arc<TrustStore>,
    /// Set when the TrustStore refused the presented key.
    rejection: Arc<Mutex<Option<Error>>>,
    /// Raised while the host key policy is deciding.
    deciding: Arc<AtomicBool>,
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let trust = Arc::clone(&self.trust);
        let host = self.host.clone();
        let port = self.port;
        let key = server_public_key.clone();

        // The policy may block on the operator's answer.
        self.deciding.store(true, Ordering::SeqCst);
        let verdict = tokio::task::spawn_blocking(move || trust.verify(&host, port, &key))
            .await
            .unwrap_or_else(|e| Err(Error::Io(std::io::Error::other(e))));
        self.deciding.store(false, Ordering::SeqCst);

        match verdict {
            Ok(()) => Ok(true),
            Err(e) => {
                let e = match e {
                    e @ Error::UntrustedHost { .. } => e,
                    other => {
                        tracing::warn!(host = %self.host, error = %other, "host key verification failed");
                        Error::UntrustedHost {
                            host: ledger_hostname(&self.host, self.port),
                            fingerprint: fingerprint(server_public_key),
                        }
                    }
                };
                *self.rejection.lock() = Some(e);
                Ok(false)
            }
        }
    }
}

/// An established, authenticated SSH session.
pub struct Session {
    config: SessionConfig,
    handle: Handle<ClientHandler>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    /// Dial, verify the host key, and authenticate. One attempt, no retry.
    pub async fn open(
        config: SessionConfig,
        auth: AuthMethod,
        trust: Arc<TrustStore>,
    ) -> Result<Self> {
        let rejection = Arc::new(Mutex::new(None));
        let deciding = Arc::new(AtomicBool::new(false));
        let handler = ClientHandler {
            host: config.host.clone(),
            port: config.port,
            trust,
            rejection: Arc::clone(&rejection),
            deciding: Arc::clone(&deciding),
        };

        tracing::debug!(host = %config.name, addr = %config.addr(), "connecting");

        let dial = TcpStream::connect((config.host.as_str(), config.port));
        let stream = match tokio::time::timeout(config.connect_timeout, dial).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(Error::Dial {
                    addr: config.addr(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(Error::Dial {
                    addr: config.addr(),
                    reason: format!("timed out after {:?}", config.connect_timeout),
                });
            }
        };

        let handshake = client::connect_stream(Arc::new(config.transport()), stream, handler);
        let mut handle = match handshake_within(config.connect_timeout, &deciding, handshake).await
        {
            Some(Ok(handle)) => handle,
            Some(Err(e)) => {
                if let Some(untrusted) = rejection.lock().take() {
                    return Err(untrusted);
                }
                return Err(Error::Dial {
                    addr: config.addr(),
                    reason: e.to_string(),
                });
            }
            None => {
                return Err(Error::Dial {
                    addr: config.addr(),
                    reason: format!("handshake timed out after {:?}", config.connect_timeout),
                });
            }
        };

        let authenticated = Self::authenticate(&mut handle, &config, auth).await?;
        if !authenticated {
            // Best effort: the handle drop closes the transport regardless.
            let _ = handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await;
            return Err(Error::AuthenticationFailed {
                user: config.user.clone(),
                host: config.name.clone(),
            });
        }

        tracing::debug!(host = %config.name, user = %config.user, "authenticated");
        Ok(Self { config, handle })
    }

    /// Authenticate the session.
    async fn authenticate(
        handle: &mut Handle<ClientHandler>,
        config: &SessionConfig,
        auth: AuthMethod,
    ) -> Result<bool> {
        match auth {
            AuthMethod::Password(password) => {
                let result = handle
                    .authenticate_password(&config.user, password.as_str())
                    .await
                    .map_err(Error::Protocol)?;
                Ok(result.success())
            }
            AuthMethod::Key(key) => {
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(Error::Protocol)?
                    .flatten();

                let result = handle
                    .authenticate_publickey(&config.user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await
                    .map_err(Error::Protocol)?;

                Ok(result.success())
            }
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn handle(&self) -> &Handle<ClientHandler> {
        &self.handle
    }

    /// Disconnect the session.
    pub async fn close(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        tracing::debug!(host = %self.config.name, "disconnected");
        Ok(())
    }
}

/// Drive `handshake` until it finishes or `timeout` elapses with no host key
/// decision in progress. The clock restarts once a pending decision is made,
/// so an operator reading a fingerprint is never cut off mid-answer.
async fn handshake_within<F: Future>(
    timeout: Duration,
    deciding: &AtomicBool,
    handshake: F,
) -> Option<F::Output> {
    tokio::pin!(handshake);
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            output = &mut handshake => return Some(output),
            () = &mut deadline => {
                if !deciding.load(Ordering::SeqCst) {
                    return None;
                }
                deadline.as_mut().reset(tokio::time::Instant::now() + timeout);
            }
        }
    }
}

/// Open a session, run `op` against it, and close it on every path.
///
/// A close failure after `op` is only logged so it never masks the operation's
/// own result. If `op` panics, dropping the handle tears the connection down.
pub async fn with_session<T, E, F>(
    config: SessionConfig,
    auth: AuthMethod,
    trust: Arc<TrustStore>,
    op: F,
) -> std::result::Result<T, E>
where
    F: AsyncFnOnce(&Session) -> std::result::Result<T, E>,
    E: From<Error>,
{
    let session = Session::open(config, auth, trust).await?;
    let result = op(&session).await;

    let host = session.config.name.clone();
    if let Err(e) = session.close().await {
        tracing::warn!(host = %host, error = %e, "SSH disconnect failed");
    }
    result
}
