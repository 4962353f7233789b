pub mod bean;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod schema;
pub mod serialize;

pub use bean::{BASE_VIEW, BeanInfo, BeanInfoBuilder, BeanInfoSource, FULL_VIEW};
pub use cache::{CacheStats, ConcurrentCache};
pub use cli::{ColorMode, Commands, OutputFormat, cli_parse};
pub use config::{CacheSpec, ConfigError, FilterConfig, load_config};
pub use context::FilterContext;
pub use engine::{Decision, FilterEngine, NodeSet, decide};
pub use error::{FilterError, IntrospectionError};
pub use filter::{FilterNode, FilterParseError, FilterParser, NameMatcher, parse_filter};
pub use metrics::{CompositeMetricsSource, MetricsSource};
pub use schema::{SchemaError, SchemaRegistry};
pub use serialize::FilteredSerializer;

use anyhow::{Context, anyhow};
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // a subscriber may already be installed when run() is called twice in-process
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn apply_color_mode(mode: ColorMode) {
    match mode {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }
}

fn read_document(path: &Path) -> anyhow::Result<Value> {
    let raw = if path.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read document from stdin")?;
        raw
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file '{}'", path.display()))?
    };

    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in '{}'", path.display()))
}

fn write_output_file(path: &Path, content: &str) -> anyhow::Result<()> {
    fs::write(path, content)
        .with_context(|| format!("Failed to write output file '{}'", path.display()))
}

/// Point at the offending byte under the filter text
fn describe_parse_error(filter: &str, err: &FilterParseError) -> String {
    let filter = filter.trim();
    let column = filter
        .get(..err.position())
        .map(|prefix| prefix.chars().count())
        .unwrap_or(0);
    format!("{err}\n  {filter}\n  {}^", " ".repeat(column))
}

fn format_metrics_table(metrics: &BTreeMap<String, u64>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("Metric"), Cell::new("Value")]);
    for (name, value) in metrics {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    table
}

fn write_tree(out: &mut String, nodes: &[FilterNode], depth: usize) {
    for node in nodes {
        let name = if node.is_negated() {
            format!("-{}", node.name()).red().bold()
        } else if node.is_any_deep() {
            node.name().yellow().bold()
        } else {
            node.name().green()
        };

        let mut flags = vec![node.matcher().kind()];
        if node.is_squiggly() {
            flags.push("nested");
        }
        if node.is_empty_nested() {
            flags.push("empty");
        }
        if node.is_dot_pathed() {
            flags.push("dot-path");
        }
        if node.is_negative_parent() {
            flags.push("negative-parent");
        }

        let _ = writeln!(
            out,
            "{}{} {}",
            "  ".repeat(depth),
            name,
            format!("({})", flags.join(", ")).dimmed()
        );
        write_tree(out, node.children(), depth + 1);
    }
}

/// Render compiled nodes as an indented tree
pub fn format_tree(nodes: &[FilterNode]) -> String {
    let mut out = String::new();
    write_tree(&mut out, nodes, 0);
    out
}

pub fn run() -> anyhow::Result<()> {
    let cli = cli_parse();
    init_tracing(cli.verbose, cli.quiet);
    apply_color_mode(cli.color);

    let config = load_config(cli.config.as_deref()).context("Failed to load config")?;
    debug!(?config, "effective config");

    match &cli.command {
        Commands::Apply {
            schema,
            input,
            filter,
            root,
            pretty,
            output,
            metrics,
        } => {
            let registry = SchemaRegistry::from_file(schema, &config)?;
            let root_type = root
                .as_deref()
                .or(registry.root())
                .ok_or_else(|| anyhow!("No root type: pass --root or set `root` in the schema"))?
                .to_string();

            let parser = FilterParser::new(&config.node_cache_spec);
            let engine = FilterEngine::new(config.clone());
            let context = FilterContext::new(&parser, filter.as_deref(), root_type.as_str())
                .map_err(|e| anyhow!(describe_parse_error(filter.as_deref().unwrap_or(""), &e)))?;

            let document = read_document(input)?;
            let filtered = FilteredSerializer::new(&engine, &registry)
                .filter_value(&context, &document)
                .with_context(|| format!("Failed to filter document as '{root_type}'"))?;
            info!(
                root = %root_type,
                filtering = context.is_filtering_enabled(),
                "filtered document"
            );

            let rendered = if *pretty {
                serde_json::to_string_pretty(&filtered)?
            } else {
                serde_json::to_string(&filtered)?
            };

            match output {
                Some(path) => write_output_file(path, &format!("{rendered}\n"))?,
                None => println!("{rendered}"),
            }

            if *metrics {
                let sources = CompositeMetricsSource::new().with(&parser).with(&engine);
                eprintln!("{}", format_metrics_table(&sources.metrics()));
            }
        }
        Commands::Parse { expression, format } => {
            let nodes = parse_filter(expression)
                .map_err(|e| anyhow!(describe_parse_error(expression, &e)))?;

            match format {
                OutputFormat::Text => print!("{}", format_tree(&nodes)),
                OutputFormat::Json => {
                    let json = Value::Array(nodes.iter().map(FilterNode::to_json).collect());
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
            }
        }
    }

    Ok(())
}
