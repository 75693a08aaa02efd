// ABOUTME: Host registry commands: add, update, delete, list.
// ABOUTME: Adding or updating a host pushes the local public key into its authorized_keys.

use super::Context;
use crate::cli::HostArgs;
use guardian::config::{self, HostConfig, Registry, Target};
use guardian::error::{Error, Result};
use guardian::ssh::{self, AuthMode, install_key_command, with_session};
use std::fs;

/// Register a new host after installing the public key on it.
pub async fn add_host(ctx: &Context, args: HostArgs) -> Result<()> {
    let mut registry = Registry::load(&ctx.paths)?;
    if registry.find(&args.name).is_some() {
        return Err(Error::HostExists(args.name));
    }

    let host = host_from_args(&args)?;
    install_public_key(ctx, &host, args.no_password).await?;

    fs::create_dir_all(ctx.paths.host_data_dir(&host.name))?;
    let name = host.name.clone();
    registry.add(host)?;
    registry.save(&ctx.paths)?;

    ctx.output.success(&format!("Host '{name}' added"));
    Ok(())
}

/// Replace an existing entry, keeping any per-host settings not given on the command line.
pub async fn update_host(ctx: &Context, args: HostArgs) -> Result<()> {
    let mut registry = Registry::load(&ctx.paths)?;
    let existing = registry.get(&args.name)?.clone();

    let mut host = host_from_args(&args)?;
    host.command_timeout = existing.command_timeout;
    install_public_key(ctx, &host, args.no_password).await?;

    fs::create_dir_all(ctx.paths.host_data_dir(&host.name))?;
    registry.update(&args.name, host)?;
    registry.save(&ctx.paths)?;

    ctx.output.success(&format!("Host '{}' updated", args.name));
    Ok(())
}

pub fn delete_host(ctx: &Context, name: &str) -> Result<()> {
    let mut registry = Registry::load(&ctx.paths)?;
    if !registry.remove(name) {
        return Err(Error::HostNotFound(name.to_string()));
    }
    registry.save(&ctx.paths)?;

    if config::selected_target(&ctx.paths)?.as_deref() == Some(name) {
        config::clear_target(&ctx.paths)?;
        ctx.output
            .warning(&format!("'{name}' was the selected target; selection cleared"));
    }

    ctx.output.success(&format!("Host '{name}' deleted"));
    Ok(())
}

pub fn list_hosts(ctx: &Context) -> Result<()> {
    let registry = Registry::load(&ctx.paths)?;
    let selected = config::selected_target(&ctx.paths)?;

    let rows: Vec<Vec<String>> = registry
        .hosts
        .iter()
        .map(|h| {
            let marker = if selected.as_deref() == Some(h.name.as_str()) {
                "*"
            } else {
                ""
            };
            vec![
                format!("{}{marker}", h.name),
                h.address.clone(),
                h.port.to_string(),
                h.username.clone(),
                h.home(),
            ]
        })
        .collect();

    ctx.output.table(
        &format!("{} configured host(s)", rows.len()),
        &["name", "address", "port", "user", "home"],
        &rows,
    );
    Ok(())
}

fn host_from_args(args: &HostArgs) -> Result<HostConfig> {
    let target = Target::parse(&args.target).map_err(Error::InvalidTarget)?;
    Ok(HostConfig::from_target(
        &args.name,
        target,
        args.user.clone(),
        args.home.clone(),
    ))
}

/// Connect with a password (or the existing key) and append the public key
/// to the remote authorized_keys unless it is already there.
async fn install_public_key(ctx: &Context, host: &HostConfig, key_auth: bool) -> Result<()> {
    let keys = ctx.keys();
    let auth = if key_auth {
        keys.ensure_key_pair()?;
        ctx.credentials().resolve(&host.name, AuthMode::Key)?
    } else {
        // Password first: a missing credential must not leave a fresh key pair behind.
        let auth = ctx.credentials().resolve(&host.name, AuthMode::Password)?;
        keys.ensure_key_pair()?;
        auth
    };
    let key_line = keys.public_key_line()?;

    ctx.output.progress(&format!(
        "  → Installing public key on {}@{}...",
        host.username, host.address
    ));

    let command = install_key_command(&key_line);
    with_session(
        host.ssh_session_config(),
        auth,
        ctx.trust(),
        async |session| -> ssh::Result<()> {
            session.run(&command).await?;
            Ok(())
        },
    )
    .await?;

    tracing::info!(host = %host.name, "public key installed");
    Ok(())
}
