use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "promptsync")]
#[command(about = "Push and pull prompts against a promptsync server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sync API base URL
    #[arg(long, global = true, env = "PROMPTSYNC_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// Bearer access token
    #[arg(
        long,
        global = true,
        env = "PROMPTSYNC_ACCESS_TOKEN",
        hide_env_values = true,
        value_name = "TOKEN"
    )]
    pub token: Option<String>,

    /// Optional path to the sync state file
    #[arg(long, global = true, value_name = "PATH")]
    pub state_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a batch of desktop prompts
    Upload {
        /// JSON file with an array of prompts or a full upload request
        file: PathBuf,
        /// Session id (generated when omitted)
        #[arg(long, value_name = "ID")]
        session_id: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download prompts changed since the last pull
    Pull {
        /// Ignore the stored watermark and download everything
        #[arg(long)]
        full: bool,
        /// Skip this many records
        #[arg(long)]
        offset: Option<usize>,
        /// Page size
        #[arg(short, long)]
        limit: Option<usize>,
        /// Keep paging until every record is fetched
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show sync status
    Status {
        /// Include recent sessions
        #[arg(long)]
        history: bool,
        /// Number of sessions to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
