//! blindtag: searchable encrypted storage client
//!
//! Commands:
//!   save <body> -t <tag>...  - encrypt and store a row, print it as JSON
//!   get <tag>...             - fetch rows carrying any of the tags, one JSON line each
//!   tags                     - list every tag pair (plain ↔ random)
//!   config show              - display current configuration

mod key_file;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blindtag_client::Backend;
use blindtag_core::config::BlindtagConfig;
use blindtag_core::Row;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "blindtag",
    version,
    about = "Searchable encrypted storage client",
    long_about = "blindtag: store rows and their tags encrypted on an untrusted server, and query them by tag"
)]
struct Cli {
    /// Path to blindtag.toml configuration file
    #[arg(long, short = 'c', env = "BLINDTAG_CONFIG", default_value = "blindtag.toml")]
    config: PathBuf,

    /// Backend key file (overrides backend.key_file)
    #[arg(long, env = "BLINDTAG_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides log.level
    #[arg(long, env = "BLINDTAG_LOG")]
    log: Option<String>,

    /// Log format; overrides log.format
    #[arg(long, env = "BLINDTAG_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt and save a row
    Save {
        /// Row body (stored encrypted)
        body: String,
        /// Plain tag; repeat for several
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
    },

    /// Fetch rows by plain tag
    Get {
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// List all tag pairs
    Tags,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn from_config(value: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(value, true)
            .map_err(|_| anyhow::anyhow!("log.format must be `json` or `text`, got `{value}`"))
    }
}

// ── Output shapes ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RowView {
    body: String,
    tags: Vec<String>,
    random_tags: Vec<String>,
}

impl From<&Row> for RowView {
    fn from(row: &Row) -> Self {
        Self {
            body: String::from_utf8_lossy(row.body().unwrap_or_default()).into_owned(),
            tags: row.plain_tags().to_vec(),
            random_tags: row.random_tags.clone(),
        }
    }
}

#[derive(Serialize)]
struct TagView<'a> {
    plain: Option<&'a str>,
    random: &'a str,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BlindtagConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    let format = match cli.log_format {
        Some(format) => format,
        None => LogFormat::from_config(&config.log.format)?,
    };
    init_logging(level, format);

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "blindtag starting"
    );

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
        Commands::Save { body, tags } => {
            let backend = connect(&config, cli.key_file.as_deref())?;
            cmd_save(&backend, body, tags).await
        }
        Commands::Get { tags } => {
            let backend = connect(&config, cli.key_file.as_deref())?;
            cmd_get(&backend, &tags).await
        }
        Commands::Tags => {
            let backend = connect(&config, cli.key_file.as_deref())?;
            cmd_tags(&backend).await
        }
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays machine-readable
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Resolve the key file (flag > config), load the key, and build the backend.
fn connect(config: &BlindtagConfig, key_file_override: Option<&Path>) -> Result<Backend> {
    let key_path = key_file_override
        .map(Path::to_path_buf)
        .or_else(|| config.backend.key_file.clone())
        .context("no key file provided; use --key-file or set backend.key_file in config")?;

    let key = key_file::load_key(&key_path)
        .with_context(|| format!("loading backend key from {}", key_path.display()))?;
    Backend::from_config(&config.backend, key).context("configuring backend")
}

// ── `blindtag save` ───────────────────────────────────────────────────────────

async fn cmd_save(backend: &Backend, body: String, tags: Vec<String>) -> Result<()> {
    let row = Row::new(body, tags);
    let saved = backend.save_row(&row).await.context("saving row")?;
    info!(tags = saved.random_tags.len(), "saved");

    println!("{}", serde_json::to_string_pretty(&RowView::from(&saved))?);
    Ok(())
}

// ── `blindtag get` ────────────────────────────────────────────────────────────

async fn cmd_get(backend: &Backend, tags: &[String]) -> Result<()> {
    let rows = backend
        .rows_from_plain_tags(tags)
        .await
        .context("querying rows")?;
    for row in &rows {
        println!("{}", serde_json::to_string(&RowView::from(row))?);
    }
    info!(rows = rows.len(), "query complete");
    Ok(())
}

// ── `blindtag tags` ───────────────────────────────────────────────────────────

async fn cmd_tags(backend: &Backend) -> Result<()> {
    let pairs = backend.all_tag_pairs().await.context("fetching tag pairs")?;
    for pair in &pairs {
        let view = TagView {
            plain: pair.plain(),
            random: &pair.random,
        };
        println!("{}", serde_json::to_string(&view)?);
    }
    Ok(())
}

// ── `blindtag config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &BlindtagConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
