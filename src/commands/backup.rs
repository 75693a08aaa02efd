// ABOUTME: Export and import commands for the local workspace.
// ABOUTME: Moves keys, trusted hosts, and the registry between machines as one archive.

use super::Context;
use guardian::backup;
use guardian::error::Result;
use std::path::Path;

pub fn export(ctx: &Context, file: &Path) -> Result<()> {
    ctx.output
        .progress(&format!("  → Archiving {}...", ctx.paths.root().display()));
    let summary = backup::export(&ctx.paths, file)?;
    ctx.output.success(&format!(
        "Exported {} file(s) to {}",
        summary.files,
        file.display()
    ));
    Ok(())
}

/// Restore over the current workspace, then re-create anything the archive lacked.
pub fn import(ctx: &Context, file: &Path) -> Result<()> {
    let summary = backup::import(&ctx.paths, file)?;
    ctx.paths.init()?;
    ctx.output.success(&format!(
        "Imported {} file(s) from {}",
        summary.files,
        file.display()
    ));
    Ok(())
}
