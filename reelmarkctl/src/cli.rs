use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use reelmark_model::ContentType;

#[derive(Parser)]
#[command(
    name = "reelmarkctl",
    about = "Inspect and maintain a Reelmark watch-progress store"
)]
pub struct Cli {
    /// Tracker config file (TOML or JSON); overrides REELMARK_CONFIG_PATH
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// JSON store file; overrides the configured store_path
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Record a playback observation read from a JSON document
    Record(InputArgs),
    /// Find the record last watched at a URL
    Lookup {
        url: String,
    },
    /// List indexed progress records, most recently watched first
    List,
    /// Delete the record stored under a content key
    Delete {
        key: String,
    },
    /// Remove completed records past the retention window
    Prune,
    /// Drop dangling and duplicate keys from the progress index
    Repair,
    /// Print the content key derived for the given metadata
    Key(KeyArgs),
    /// Detector telemetry
    Telemetry {
        #[command(subcommand)]
        action: TelemetryAction,
    },
}

#[derive(Subcommand)]
pub enum TelemetryAction {
    /// Record a detector report read from a JSON document
    Record(InputArgs),
    /// List telemetry entries inside the retention window, newest first
    List,
    /// Remove every telemetry entry
    Clear,
    /// Show or change the telemetry retention window in hours
    Retention {
        #[arg(long)]
        hours: Option<u64>,
    },
}

#[derive(Args)]
pub struct InputArgs {
    /// File holding the JSON document; stdin when omitted or "-"
    #[arg(long, short)]
    pub input: Option<PathBuf>,
}

#[derive(Args)]
pub struct KeyArgs {
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub platform: Option<String>,
    #[arg(long = "type", value_enum)]
    pub content_type: Option<ContentTypeArg>,
    #[arg(long)]
    pub series: Option<String>,
    /// Also print the identity basis the key was hashed from
    #[arg(long)]
    pub show_basis: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ContentTypeArg {
    Movie,
    Episode,
}

impl From<ContentTypeArg> for ContentType {
    fn from(val: ContentTypeArg) -> Self {
        match val {
            ContentTypeArg::Movie => ContentType::Movie,
            ContentTypeArg::Episode => ContentType::Episode,
        }
    }
}
