//! CLI argument definitions

use ad_publisher_domain::AdType;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// ad-publisher: publish one ad to several social platforms at once
#[derive(Parser, Debug)]
#[command(name = "ad-publisher")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish an ad to the requested platforms
    Publish(PublishArgs),

    /// List configured platforms
    Platforms(PlatformsArgs),

    /// Inspect stored ads
    Ads(AdsArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// JSON request file (use - for stdin)
    #[arg(
        long,
        conflicts_with_all = [
            "content",
            "image_url",
            "video_url",
            "ad_type",
            "owner_id",
            "campaign_id",
            "ad_id",
            "platform",
        ]
    )]
    pub request: Option<PathBuf>,

    /// Ad copy
    #[arg(long)]
    pub content: Option<String>,

    /// Image URL for image ads
    #[arg(long)]
    pub image_url: Option<String>,

    /// Video URL for video ads
    #[arg(long)]
    pub video_url: Option<String>,

    /// Ad type (text, image, video); inferred from the media flags if omitted
    #[arg(long)]
    pub ad_type: Option<AdType>,

    /// Owner whose platform credentials are used
    #[arg(long)]
    pub owner_id: Option<String>,

    #[arg(long)]
    pub campaign_id: Option<String>,

    #[arg(long)]
    pub ad_id: Option<String>,

    /// Target platform (repeat for several)
    #[arg(long = "platform", value_name = "PLATFORM")]
    pub platform: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Write posts to an outbox file for review instead of publishing
    #[arg(long)]
    pub require_approval: bool,

    /// Path to outbox file (used with --require-approval)
    #[arg(long)]
    pub outbox: Option<PathBuf>,

    /// Do not update the stored ad state
    #[arg(long)]
    pub no_record: bool,
}

#[derive(Args, Debug)]
pub struct PlatformsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AdsArgs {
    #[command(subcommand)]
    pub command: AdsCommands,
}

#[derive(Subcommand, Debug)]
pub enum AdsCommands {
    /// Show an ad's status and publish history
    Show {
        ad_id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration, environment overrides included
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
