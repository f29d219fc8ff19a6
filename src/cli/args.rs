// src/cli/args.rs
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
#[command(arg_required_else_help = true, disable_help_subcommand = true)]
pub struct Args {
    /// Path to Anki collection file (optional)
    #[arg(short, long, value_name = "COLLECTION", global = true)]
    pub collection: Option<PathBuf>,

    /// Profile name (optional)
    #[arg(short, long, value_name = "PROFILE", global = true)]
    pub profile: Option<String>,

    /// Path to config file (default: <config dir>/ankisubmit/config.toml)
    #[arg(long, value_name = "CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add notes from a JSON file (one note object or an array of notes)
    Add {
        /// Path to the JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Skip the remote service and write to the collection directly
        #[arg(long)]
        local: bool,
    },

    /// List note models with their field names
    Models,

    /// List decks with their ids
    Decks,

    /// Show the version reported by the remote service
    Status,

    /// Write a config file with default settings (to --config or the default location)
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Listen for session-control commands until told to exit
    Serve {
        /// Note shown as the current card
        #[arg(long, value_name = "NOTE_ID")]
        note: Option<i64>,
    },
}
