// ABOUTME: Remote command execution over an established session.
// ABOUTME: Batch mode captures combined output; interactive mode relays a PTY and answers secret prompts.

use super::client::{ClientHandler, Session};
use super::error::{Error, Result};
use super::relay::{self, InputSink, Prompt};
use async_trait::async_trait;
use russh::client::Handle;
use russh::{ChannelId, ChannelMsg, Pty};
use std::time::Duration;
use tokio::sync::mpsc;

/// Output from a remote command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output and standard error, interleaved as received.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit status into [`Error::RemoteCommand`].
    pub fn into_result(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::RemoteCommand {
                exit_code: self.exit_code,
                output: self.output,
            })
        }
    }
}

/// Join several commands so the sequence stops at the first failure.
pub fn join_commands<S: AsRef<str>>(commands: &[S]) -> String {
    commands
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Answers are written straight through the handle so the reader keeps the channel.
struct ChannelInput<'a> {
    handle: &'a Handle<ClientHandler>,
    id: ChannelId,
}

#[async_trait]
impl InputSink for ChannelInput<'_> {
    async fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.handle
            .data(self.id, bytes.to_vec().into())
            .await
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "channel input closed")
            })
    }
}

impl Session {
    /// Run a command and fail with [`Error::RemoteCommand`] on non-zero exit.
    pub async fn run(&self, command: &str) -> Result<CommandOutput> {
        self.exec(command).await?.into_result()
    }

    /// Run a `&&`-joined sequence of commands.
    pub async fn run_all<S: AsRef<str>>(&self, commands: &[S]) -> Result<CommandOutput> {
        self.run(&join_commands(commands)).await
    }

    /// Execute a command and return its output whatever the exit status.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, self.config().command_timeout)
            .await
    }

    /// Execute a command with a custom timeout.
    pub async fn exec_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.exec_inner(command)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .handle()
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        let mut output = Vec::new();
        let mut exit_code = 0u32;

        let mut got_exit_status = false;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    output.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    output.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = exit_status;
                    got_exit_status = true;
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if got_exit_status {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => {
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }

        // No exit status means the remote side went away mid-command.
        if !got_exit_status {
            return Err(Error::ChannelClosed);
        }

        tracing::debug!(host = %self.config().name, exit_code, "command finished");
        Ok(CommandOutput {
            exit_code,
            output: String::from_utf8_lossy(&output).to_string(),
        })
    }

    /// Run a command on a pseudo-terminal, answering any registered prompt.
    ///
    /// Remote echo is disabled so injected secrets never come back in the
    /// output. Non-zero exit maps to [`Error::RemoteCommand`]; the session's
    /// command timeout bounds the whole exchange.
    pub async fn run_interactive(&self, command: &str, prompts: &[Prompt]) -> Result<CommandOutput> {
        let timeout = self.config().command_timeout;
        match tokio::time::timeout(timeout, self.interactive_inner(command, prompts)).await {
            Ok(result) => result?.into_result(),
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    async fn interactive_inner(&self, command: &str, prompts: &[Prompt]) -> Result<CommandOutput> {
        let mut channel = self
            .handle()
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        let modes = [
            (Pty::ECHO, 0),
            (Pty::TTY_OP_ISPEED, 14400),
            (Pty::TTY_OP_OSPEED, 14400),
        ];
        channel
            .request_pty(true, "xterm", 80, 40, 0, 0, &modes)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to request pty: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        let (tx, rx) = mpsc::channel::<Vec<u8>>(64);
        let input = ChannelInput {
            handle: self.handle(),
            id: channel.id(),
        };
        let host = self.config().name.as_str();

        let reader = async move {
            let mut exit_status = None;
            let mut got_eof = false;
            loop {
                match channel.wait().await {
                    Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                        if tx.send(data.to_vec()).await.is_err() {
                            break;
                        }
                    }
                    Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                        exit_status = Some(status);
                        if got_eof {
                            break;
                        }
                    }
                    Some(ChannelMsg::Eof) => {
                        got_eof = true;
                        if exit_status.is_some() {
                            break;
                        }
                    }
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                }
            }
            // Dropping the sender ends the scanner.
            drop(tx);
            exit_status
        };

        let (exit_status, transcript) =
            tokio::join!(reader, relay::scan(host, rx, input, prompts));

        tracing::debug!(host, responses = transcript.responses, "interactive command finished");

        let exit_code = exit_status.ok_or(Error::ChannelClosed)?;
        Ok(CommandOutput {
            exit_code,
            output: String::from_utf8_lossy(&transcript.output).to_string(),
        })
    }
}
