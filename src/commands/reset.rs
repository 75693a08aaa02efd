// ABOUTME: Reset command implementation.
// ABOUTME: Removes the key pair, host ledger, registry, and target selection after confirmation.

use super::Context;
use guardian::config::{self, Registry};
use guardian::error::{Error, Result};
use guardian::prompt;

pub fn reset(ctx: &Context, yes: bool) -> Result<()> {
    if !yes {
        if !prompt::is_interactive() {
            ctx.output
                .warning("refusing to reset without a terminal; pass --yes");
            return Err(Error::Cancelled);
        }
        let question = "This deletes the SSH key pair, trusted host keys, and all registered hosts. Continue?";
        if !prompt::confirm(question) {
            return Err(Error::Cancelled);
        }
    }

    ctx.keys().reset()?;
    Registry::default().save(&ctx.paths)?;
    config::clear_target(&ctx.paths)?;
    ctx.paths.init()?;

    tracing::info!(root = %ctx.paths.root().display(), "workspace reset");
    ctx.output.success("Workspace reset");
    Ok(())
}
