// ABOUTME: Target host entry of the registry.
// ABOUTME: Parses targets like "host", "user@host:port", and "user@[fe80::1]:2222".

use crate::ssh::SessionConfig;
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;
use std::time::Duration;

/// One managed appliance. Field names match the registry file written by
/// earlier guardian-cli releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    pub name: String,
    pub address: String,
    pub username: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub home_path: String,
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub command_timeout: Option<Duration>,
}

fn default_port() -> u16 {
    22
}

/// A parsed `[user@]host[:port]` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub user: Option<String>,
    pub address: String,
    pub port: u16,
}

impl Target {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("target address cannot be empty".to_string());
        }

        // Parse format: [user@]host[:port]
        let (user_part, rest) = if let Some(at_pos) = s.find('@') {
            (Some(&s[..at_pos]), &s[at_pos + 1..])
        } else {
            (None, s)
        };

        if user_part.is_some_and(str::is_empty) {
            return Err("username cannot be empty".to_string());
        }

        let (host, port) = split_host_port(rest)?;

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }

        Ok(Target {
            user: user_part.map(|s| s.to_string()),
            address: host.to_string(),
            port,
        })
    }
}

/// Split `host[:port]`, `[v6addr][:port]`, or a bare IPv6 address.
fn split_host_port(s: &str) -> Result<(&str, u16), String> {
    if let Some(bracketed) = s.strip_prefix('[') {
        let close = bracketed
            .find(']')
            .ok_or_else(|| format!("missing ']' in {s}"))?;
        let host = &bracketed[..close];
        return match &bracketed[close + 1..] {
            "" => Ok((host, 22)),
            tail => match tail.strip_prefix(':') {
                Some(port) => Ok((host, parse_port(port)?)),
                None => Err(format!("unexpected text after ']': {tail}")),
            },
        };
    }

    if s.matches(':').count() > 1 {
        return match s.parse::<Ipv6Addr>() {
            Ok(_) => Ok((s, 22)),
            Err(_) => Err(format!(
                "invalid address {s}; write IPv6 addresses with a port as [addr]:port"
            )),
        };
    }

    match s.split_once(':') {
        Some((host, port)) => Ok((host, parse_port(port)?)),
        None => Ok((s, 22)),
    }
}

fn parse_port(s: &str) -> Result<u16, String> {
    s.parse::<u16>().map_err(|_| format!("invalid port: {s}"))
}

impl HostConfig {
    /// Build an entry from a target, falling back to `$USER` (or root) for the
    /// username and `/home/<user>` for the home path.
    pub fn from_target(
        name: &str,
        target: Target,
        user: Option<String>,
        home_path: Option<String>,
    ) -> Self {
        let username = user
            .or(target.user)
            .unwrap_or_else(|| std::env::var("USER").unwrap_or_else(|_| "root".to_string()));
        let home_path = home_path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| default_home(&username));

        Self {
            name: name.to_string(),
            address: target.address,
            username,
            port: target.port,
            home_path,
            command_timeout: None,
        }
    }

    /// Home directory on the target, defaulting to `/home/<user>`.
    pub fn home(&self) -> String {
        if self.home_path.is_empty() {
            default_home(&self.username)
        } else {
            self.home_path.clone()
        }
    }

    /// Convert to SessionConfig for connecting to this host.
    pub fn ssh_session_config(&self) -> SessionConfig {
        let config = SessionConfig::new(&self.address, &self.username)
            .name(&self.name)
            .port(self.port);
        match self.command_timeout {
            Some(timeout) => config.command_timeout(timeout),
            None => config,
        }
    }
}

fn default_home(user: &str) -> String {
    if user == "root" {
        "/root".to_string()
    } else {
        format!("/home/{user}")
    }
}
