// ABOUTME: Exec command implementation.
// ABOUTME: Runs a command on a host in batch mode, or on a PTY answering the sudo prompt.

use super::Context;
use guardian::error::Result;
use guardian::ssh::{self, AuthMode, Prompt, with_session};

/// Execute a command on the target host and print what it wrote.
///
/// A non-zero exit surfaces as a remote command error carrying the output.
pub async fn exec_command(
    ctx: &Context,
    host: Option<&str>,
    command: &[String],
    sudo: bool,
) -> Result<()> {
    let host = ctx.target_host(host)?;
    let credentials = ctx.credentials();
    let auth = credentials.resolve(&host.name, AuthMode::Key)?;
    let prompts = if sudo {
        vec![Prompt::sudo(credentials.elevation_password(&host.name)?)]
    } else {
        Vec::new()
    };

    let command = command.join(" ");
    ctx.output
        .progress(&format!("  → Running on {}: {command}", host.name));

    let result = with_session(
        host.ssh_session_config(),
        auth,
        ctx.trust(),
        async |session| -> ssh::Result<_> {
            if prompts.is_empty() {
                session.run(&command).await
            } else {
                session.run_interactive(&command, &prompts).await
            }
        },
    )
    .await?;

    // Relayed lines were already logged as they arrived.
    if prompts.is_empty() {
        ctx.output.remote_output(&host.name, &result.output);
    }
    ctx.output.success("Command completed");
    Ok(())
}
