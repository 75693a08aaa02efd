// ABOUTME: Put command implementation.
// ABOUTME: Uploads a local file or directory tree to a host over SFTP.

use super::Context;
use guardian::error::Result;
use guardian::ssh::{self, AuthMode, with_session};
use std::path::Path;

pub async fn put(ctx: &Context, host: Option<&str>, src: &Path, dst: &str) -> Result<()> {
    let host = ctx.target_host(host)?;
    let auth = ctx.credentials().resolve(&host.name, AuthMode::Key)?;

    ctx.output.progress(&format!(
        "  → Uploading {} to {}:{dst}...",
        src.display(),
        host.name
    ));

    let summary = with_session(
        host.ssh_session_config(),
        auth,
        ctx.trust(),
        async |session| -> ssh::Result<_> {
            let transfer = session.sftp().await?;
            let result = transfer.put(src, dst).await;
            if let Err(e) = transfer.close().await {
                tracing::warn!(error = %e, "closing SFTP session failed");
            }
            result
        },
    )
    .await?;

    ctx.output.success(&format!(
        "Uploaded {} file(s) and {} dir(s), {} bytes",
        summary.files, summary.directories, summary.bytes
    ));
    Ok(())
}
