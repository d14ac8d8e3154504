use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "songvault")]
#[command(version)]
#[command(about = "Resolve, cache and tag songs from a NetEase-compatible catalog")]
pub struct Cli {
    /// Path to the config TOML file. Defaults to the user config directory.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log at debug level regardless of `general.log_level`
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Commands {
    /// Print the song a keyword resolves to
    Resolve {
        #[arg(required = true, num_args = 1..)]
        keyword: Vec<String>,
    },
    /// Resolve a keyword and cache the song
    Fetch {
        #[arg(required = true, num_args = 1..)]
        keyword: Vec<String>,
    },
    /// Read one keyword per stdin line and fetch each on the worker pool
    Serve,
    /// Store the catalog session token in the system keyring
    SetCredential { token: String },
}

/// Joins the positional words of a keyword back into one search string.
pub fn join_keyword(words: &[String]) -> String {
    words.join(" ")
}
