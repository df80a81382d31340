//! # repoindex CLI
//!
//! Browse repositories through a tag-driven virtual filesystem, edit tags
//! with shell-style commands, and materialize classifications as symlink
//! trees.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use repoindex_config::logging::{init_logging, LogLevel};
use repoindex_config::{log_cli_debug, Config};

mod discovery;
mod session;
mod shell;
mod tree;

use session::Session;
use shell::Edit;

/// repoindex - classify, browse and link your repositories
#[derive(Parser)]
#[command(name = "repoindex")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a VFS directory (default `/`)
    Ls {
        #[arg(value_name = "PATH")]
        path: Option<String>,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Tag a repository: `cp /repos/NAME /by-tag/KEY/VALUE`
    Cp {
        #[arg(value_name = "SRC")]
        src: String,
        #[arg(value_name = "DST")]
        dst: String,
    },

    /// Move a repository from one tag to another
    Mv {
        #[arg(value_name = "SRC")]
        src: String,
        #[arg(value_name = "DST")]
        dst: String,
    },

    /// Remove the tag a `/by-tag/.../NAME` entry stands for
    Rm {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Validate a new `/by-tag` directory and show its tag
    Mkdir {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Show a repository's effective tags
    Tags {
        /// Repository name, VFS path or filesystem path
        #[arg(value_name = "REPO")]
        repo: String,

        /// Whole-tag wildcard filter, e.g. `topic:*`
        #[arg(long)]
        filter: Option<String>,

        /// Hierarchical prefix match, e.g. `topic:ml`
        #[arg(long = "match", value_name = "PATTERN")]
        matching: Option<String>,
    },

    /// Materialized symlink trees
    Tree {
        #[command(subcommand)]
        command: tree::TreeCommands,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print config file locations
    Path,
}

fn main() -> Result<()> {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let cli = Cli::parse();
    init_logging(LogLevel::from_verbosity(cli.verbose));
    log_cli_debug!("Starting", version = env!("CARGO_PKG_VERSION"));

    let command = match cli.command {
        Commands::Config { command } => return cmd_config(&command),
        other => other,
    };

    let mut session = Session::load()?;
    match command {
        Commands::Ls { path, json } => shell::cmd_ls(&session, path.as_deref(), json),
        Commands::Cp { src, dst } => shell::cmd_edit(
            &mut session,
            Edit::Cp {
                src: &src,
                dst: &dst,
            },
        ),
        Commands::Mv { src, dst } => shell::cmd_edit(
            &mut session,
            Edit::Mv {
                src: &src,
                dst: &dst,
            },
        ),
        Commands::Rm { path } => shell::cmd_edit(&mut session, Edit::Rm { path: &path }),
        Commands::Mkdir { path } => shell::cmd_mkdir(&mut session, &path),
        Commands::Tags {
            repo,
            filter,
            matching,
        } => shell::cmd_tags(&session, &repo, filter.as_deref(), matching.as_deref()),
        Commands::Tree { command } => tree::run(&session, command),
        Commands::Config { command } => cmd_config(&command),
    }
}

fn cmd_config(command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = repoindex_config::config().context("Failed to load configuration")?;
            print!("{}", config.to_toml()?);
        }
        ConfigCommands::Path => {
            match Config::global_config_path() {
                Some(path) => println!("Global:  {}", path.display()),
                None => println!("Global:  (no home directory)"),
            }
            let project = std::env::current_dir()?.join(Config::project_config_path());
            println!("Project: {}", project.display());
        }
    }
    Ok(())
}
