use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::ops::index::Target;

#[derive(Parser)]
#[command(name = "tw", about = concat!("twig v", env!("CARGO_PKG_VERSION"), " - a nested to-do list"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different data directory for the task cache and session
    #[arg(short = 'D', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Read settings from this config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Never contact the remote endpoints
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the task tree
    List(ListArgs),
    /// Add a task at the top level, or under another task
    Add(AddArgs),
    /// Toggle a task's completed flag
    Done(TargetArg),
    /// Expand or collapse a task's subtasks
    Fold(TargetArg),
    /// Delete a task and everything under it
    Rm(TargetArg),
    /// Show one task in detail
    Show(TargetArg),
    /// Show completed / total counts
    Stats,
    /// Log in with an email address
    Login(LoginArgs),
    /// Forget the current session
    Logout,
    /// Show the current session
    Whoami,
    /// Talk to the remote task store directly
    Sync(SyncCmd),
    /// View or edit the config file
    Config(ConfigCmd),
}

// ---------------------------------------------------------------------------
// Tree command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Show children of collapsed tasks too
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task text
    pub text: String,
    /// Parent task: a path like 0.1 or an id like #1718000000000
    #[arg(long)]
    pub under: Option<Target>,
}

#[derive(Args)]
pub struct TargetArg {
    /// A path like 0.1 or an id like #1718000000000
    pub target: Target,
}

// ---------------------------------------------------------------------------
// Session / sync args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct LoginArgs {
    pub email: String,
}

#[derive(Args)]
pub struct SyncCmd {
    #[command(subcommand)]
    pub action: SyncAction,
}

#[derive(Subcommand)]
pub enum SyncAction {
    /// Reload the tree from the remote store (falls back to the local cache)
    Pull,
    /// Upload the current tree now and report the result
    Push,
}

// ---------------------------------------------------------------------------
// Config args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Set a key, e.g. `remote.tasks_url https://...`
    Set(ConfigSetArgs),
    /// Remove a key so it falls back to its default
    Unset(ConfigUnsetArgs),
}

#[derive(Args)]
pub struct ConfigSetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Args)]
pub struct ConfigUnsetArgs {
    pub key: String,
}
