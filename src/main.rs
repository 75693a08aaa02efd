// ABOUTME: Entry point for the guardian CLI application.
// ABOUTME: Parses arguments, sets up logging and output, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, HostCommand};
use commands::Context;
use guardian::error::{Error, Result};
use guardian::output::{Output, OutputMode};
use guardian::ssh;
use guardian::workspace::WorkspacePaths;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise debug with --verbose, info for our own spans.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn,guardian=info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    let output = Output::new(mode);
    let result = run(cli, Output::new(mode)).await;

    if let Err(e) = result {
        if let Error::Ssh(ssh::Error::RemoteCommand {
            output: remote_output,
            ..
        }) = &e
        {
            output.remote_output("", remote_output);
        }
        output.error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let paths = WorkspacePaths::from_env()?;
    paths.init()?;
    let ctx = Context::new(paths, output, cli.accept_host_keys);

    match cli.command {
        Commands::Host(HostCommand::Add(args)) => commands::add_host(&ctx, args).await,
        Commands::Host(HostCommand::Update(args)) => commands::update_host(&ctx, args).await,
        Commands::Host(HostCommand::Delete { name }) => commands::delete_host(&ctx, &name),
        Commands::Host(HostCommand::List) => commands::list_hosts(&ctx),
        Commands::Select { name } => commands::select(&ctx, &name),
        Commands::Test { host } => commands::test_host(&ctx, host.as_deref()).await,
        Commands::Exec {
            host,
            sudo,
            command,
        } => commands::exec_command(&ctx, host.as_deref(), &command, sudo).await,
        Commands::Put { host, src, dst } => {
            commands::put(&ctx, host.as_deref(), &src, &dst).await
        }
        Commands::Export { file } => commands::export(&ctx, &file),
        Commands::Import { file } => commands::import(&ctx, &file),
        Commands::Reset { yes } => commands::reset(&ctx, yes),
    }
}
