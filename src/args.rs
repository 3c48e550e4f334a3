use clap::Parser;
use std::path::PathBuf;

use crate::source::SourceKind;

#[derive(Parser, Debug)]
#[command(
    name = "inboxee",
    about = "Analyze a mail folder to find who sends you the most email",
    version,
    long_about = None
)]
pub struct Args {
    /// Folder to analyze
    #[arg(short, long)]
    pub folder: Option<String>,

    /// Maximum number of recent messages to fetch
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Message source to try, in order (repeatable)
    #[arg(short, long = "source", value_enum)]
    pub sources: Vec<SourceKind>,

    /// Access token for the ews and rest sources
    #[arg(long, env = "INBOXEE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to an mbox file or a directory of per-folder mbox files
    #[arg(long)]
    pub mbox: Option<PathBuf>,

    /// Path to a local message cache database
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Custom temporary file path for the cache database copy
    #[arg(long)]
    pub temp_path: Option<PathBuf>,

    /// Number of top senders to display
    #[arg(short, long)]
    pub top: Option<usize>,

    /// Export the sender table as CSV (defaults to a dated file name)
    #[arg(short, long)]
    pub export: Option<Option<PathBuf>>,

    /// Print the analysis as JSON instead of the summary
    #[arg(long)]
    pub json: bool,

    /// Redact sender addresses for privacy
    #[arg(long)]
    pub redact: bool,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Initialize inboxee.toml with default settings
    #[arg(long)]
    pub init: bool,

    /// Number of worker threads for parsing local mailboxes
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
