mod output_format;

use clap::{ArgAction, Parser, Subcommand};
pub use output_format::{ColorMode, OutputFormat};
use std::path::PathBuf;

/// Select and exclude fields of JSON documents with a compact filter expression
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML file with filter settings and cache specs
    #[arg(short, long, global = true, env = "FIELD_FILTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Color output
    #[arg(long, global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Filter a JSON document against a schema
    Apply {
        /// TOML schema describing the document's types
        #[arg(short, long)]
        schema: PathBuf,

        /// JSON document to filter; `-` reads stdin
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Filter expression; omit to write everything
        #[arg(short, long)]
        filter: Option<String>,

        /// Type of the document root, overriding the schema's `root`
        #[arg(short, long)]
        root: Option<String>,

        /// Pretty-print the result
        #[arg(short, long)]
        pretty: bool,

        /// Write the result to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print cache metrics to stderr when done
        #[arg(short, long)]
        metrics: bool,
    },
    /// Compile a filter expression and print its node tree
    Parse {
        /// Filter expression
        expression: String,

        /// Output format
        #[arg(short = 'F', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}
