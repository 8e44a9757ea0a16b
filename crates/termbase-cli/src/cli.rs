use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use termbase_sync::Resolution;
use termbase_types::Language;

#[derive(Parser)]
#[command(
    name = "termbase",
    about = "Glossary concept store backed by a git working copy",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (default: platform config dir, termbase.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Clone or open the working copy and build its indexes
    Init(InitArgs),
    /// List concepts, optionally filtered by a query
    Search(SearchArgs),
    /// Show one concept
    Show(ShowArgs),
    /// Change a concept's term, definition or source in one language
    Edit(EditArgs),
    /// Create a concept with the next free id
    New(NewArgs),
    /// Delete a concept
    Delete(DeleteArgs),
    /// List concepts without a variant in a language
    Missing(MissingArgs),
    /// Rebuild every index from the files
    Reindex,
    /// Show the working copy state
    Status,
    /// Synchronize with the remote, resolving conflicts per concept
    Sync(SyncArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Remote to clone from
    #[arg(long)]
    pub remote: Option<String>,
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
    /// Write the effective configuration to the config file
    #[arg(long)]
    pub save_config: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    pub query: Option<String>,
    #[arg(long)]
    pub lang: Option<Language>,
    #[arg(long, default_value = "0")]
    pub offset: usize,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: u64,
    /// Only this language
    #[arg(long)]
    pub lang: Option<Language>,
}

#[derive(Args)]
pub struct EditArgs {
    pub id: u64,
    #[arg(long)]
    pub lang: Option<Language>,
    #[arg(long)]
    pub term: Option<String>,
    #[arg(long)]
    pub definition: Option<String>,
    /// Authoritative source link
    #[arg(long)]
    pub source: Option<String>,
    /// Append a note
    #[arg(long = "note")]
    pub notes: Vec<String>,
}

#[derive(Args)]
pub struct NewArgs {
    #[arg(long)]
    pub term: String,
    #[arg(long)]
    pub lang: Option<Language>,
    #[arg(long)]
    pub definition: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub id: u64,
}

#[derive(Args)]
pub struct MissingArgs {
    pub lang: Language,
}

#[derive(Args)]
pub struct SyncArgs {
    /// Merge locally but do not push
    #[arg(long)]
    pub no_push: bool,
    /// Settle a conflict: ID=local, ID=remote or ID=delete
    #[arg(long = "resolve", value_parser = parse_resolution)]
    pub resolve: Vec<(String, Resolution)>,
}

fn parse_resolution(raw: &str) -> Result<(String, Resolution), String> {
    let (id, how) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=local|remote|delete, got {raw:?}"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing id in {raw:?}"));
    }
    Ok((id.to_string(), how.parse()?))
}
