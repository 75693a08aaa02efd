// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines host registry, target selection, remote exec/upload, backup, and reset subcommands.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "guardian")]
#[command(about = "Provision and operate guardian appliances over SSH")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode for CI (only final result)
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Trust unknown host keys without prompting
    #[arg(long, global = true)]
    pub accept_host_keys: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the registry of target hosts
    #[command(subcommand)]
    Host(HostCommand),

    /// Choose the default target host (`show` prints it, `none` clears it)
    Select {
        /// Host name, `show`, or `none`
        name: String,
    },

    /// Check key-based access to a host
    Test {
        /// Host name (defaults to the selected target)
        #[arg(long)]
        host: Option<String>,
    },

    /// Run a command on a host
    Exec {
        /// Host name (defaults to the selected target)
        #[arg(long)]
        host: Option<String>,

        /// Answer the remote sudo password prompt
        #[arg(long)]
        sudo: bool,

        /// Command and arguments to run
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    /// Upload a file or directory to a host
    Put {
        /// Host name (defaults to the selected target)
        #[arg(long)]
        host: Option<String>,

        /// Local file or directory
        src: PathBuf,

        /// Remote destination path
        dst: String,
    },

    /// Save the workspace (keys, trusted hosts, registry) to a .tar.gz file
    Export {
        /// Archive to write
        file: PathBuf,
    },

    /// Restore a workspace archive written by `export`
    Import {
        /// Archive to read
        file: PathBuf,
    },

    /// Delete the local key pair, host ledger, and registry
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum HostCommand {
    /// Register a host and install the local public key on it
    Add(HostArgs),

    /// Replace an existing host entry and reinstall the public key
    Update(HostArgs),

    /// Remove a host from the registry
    Delete {
        /// Host name
        name: String,
    },

    /// List registered hosts
    List,
}

#[derive(Args)]
pub struct HostArgs {
    /// Name to register the host under
    pub name: String,

    /// Target in the form [user@]host[:port]
    pub target: String,

    /// Remote username (overrides the user in the target)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Remote home directory
    #[arg(long)]
    pub home: Option<String>,

    /// Authenticate with the existing key pair instead of a password
    #[arg(long)]
    pub no_password: bool,
}
