// ABOUTME: Select command implementation.
// ABOUTME: Shows, sets, or clears the default target used when --host is omitted.

use super::Context;
use guardian::config::{self, Registry};
use guardian::error::Result;

pub fn select(ctx: &Context, name: &str) -> Result<()> {
    match name {
        "show" => {
            match config::selected_target(&ctx.paths)? {
                Some(target) => ctx.output.success(&format!("Selected target: {target}")),
                None => ctx.output.success("No target selected"),
            }
            Ok(())
        }
        "none" => {
            config::clear_target(&ctx.paths)?;
            ctx.output.success("Target selection cleared");
            Ok(())
        }
        name => {
            Registry::load(&ctx.paths)?.get(name)?;
            config::select_target(&ctx.paths, name)?;
            ctx.output.success(&format!("Selected target: {name}"));
            Ok(())
        }
    }
}
