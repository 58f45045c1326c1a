mod cli;
mod context;
mod downloads;
mod errors;
mod pipeline;
mod platform;
mod runner;
mod steps;
mod ui;

use std::io;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;

use cli::{Cli, Commands, InstallArgs};
use context::InstallContext;
use errors::InstallError;
use ui::Console;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Install(args) => install(args, cli.quiet),
        Commands::Version => {
            println!("codekit-install {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}

fn install(args: InstallArgs, quiet: bool) -> Result<()> {
    let project_dir = match args.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("could not determine the current directory")?,
    };
    let home_dir = dirs::home_dir().context("could not determine the home directory")?;

    let console = Console::new(args.non_interactive, quiet);

    let mut ctx = InstallContext::new(project_dir, home_dir);
    ctx.non_interactive = args.non_interactive;
    ctx.skip_env = args.skip_env;
    ctx.install_python = !args.skip_python;
    ctx.install_typescript = !args.skip_typescript;
    ctx.install_go = args.with_go;
    ctx.premium_key = args.premium_key;
    ctx.local_repo_dir = args
        .local_repo_dir
        .as_deref()
        .map(|dir| PathBuf::from(shellexpand::tilde(dir).into_owned()));
    ctx.local_mode = args.local || ctx.local_repo_dir.is_some();
    ctx.ui = Some(console.clone());

    console.banner();

    let steps = steps::all_steps();
    if let Err(err) = pipeline::run_installation(&mut ctx, &steps) {
        console.error(&format!("Installation failed: {err}"));
        match &err {
            InstallError::Download { url: Some(url), .. } => {
                console.status(&format!("Failed URL: {url}"));
            }
            InstallError::Preflight {
                check: Some(check), ..
            } => {
                log::debug!("failed check: {check}");
            }
            _ => {}
        }
        std::process::exit(if err.is_fatal() { 2 } else { 1 });
    }
    Ok(())
}
