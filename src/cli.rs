/// Command Line Interface
///
/// A thin `store`/`get` binary kept purely as a manual smoke-test harness over the library —
/// not a spec'd surface, not exhaustively featured.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bridgefs")]
pub struct Cli {
    /// Path to a TOML config file (defaults to built-in defaults + env overrides).
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a file in a bucket.
    Store {
        /// Bucket id (24 hex chars, or a name to derive one from with --email).
        bucket: String,
        /// Path to the file to upload.
        path: PathBuf,
        /// Email used to derive a bucket id when `bucket` is not 24 hex characters.
        #[arg(long, default_value = "")]
        email: String,
    },
    /// Download a file from a bucket.
    Get {
        /// Bucket id.
        bucket: String,
        /// File id.
        file: String,
        /// Where to write the downloaded bytes.
        output: PathBuf,
    },
    /// Download a byte range of a file.
    Slice {
        /// Bucket id.
        bucket: String,
        /// File id.
        file: String,
        /// Start byte offset (inclusive).
        start: u64,
        /// End byte offset (exclusive).
        end: u64,
        /// Where to write the sliced bytes.
        output: PathBuf,
    },
}

impl Cli {
    pub fn parse() -> Self {
        Parser::parse()
    }
}
