//! CLI module for Tekst.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Tekst - Subtitle Resolution Pipeline
///
/// Resolves subtitles for platform videos through a layered fallback: a
/// previously resolved result, then platform-native captions, then local
/// synthesis from the video's audio. The name "Tekst" comes from the
/// Norwegian/Scandinavian word for "text."
#[derive(Parser, Debug)]
#[command(name = "tekst")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Tekst and verify system requirements
    Init,

    /// Check system requirements and configuration
    Doctor,

    /// Resolve the subtitle track set for a video URL
    Resolve {
        /// Video URL or bare BV identifier (append ?p=N for multi-part videos)
        url: String,

        /// Login cookie sent to the platform (native captions and downloads)
        #[arg(long, env = "TEKST_COOKIE", default_value = "", hide_env_values = true)]
        cookie: String,

        /// Write the track set JSON to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Export a resolved subtitle as compacted plain text
    Export {
        /// Video URL or bare BV identifier
        url: String,

        /// Login cookie sent to the platform
        #[arg(long, env = "TEKST_COOKIE", default_value = "", hide_env_values = true)]
        cookie: String,

        /// Merge consecutive cues until a line reaches this many characters
        #[arg(long, default_value = "0")]
        min_chars: usize,

        /// Prefix each line with the start time of its first cue
        #[arg(short, long)]
        timestamps: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
