//! Schema engine command line interface
//!
//! Resolves and renders widget schemas stored as JSON/YAML documents in a
//! directory.
//!
//! # Usage
//!
//! ```bash
//! # Inline references and list required channels
//! schema-render --store ./schemas resolve board
//!
//! # Render against channel payloads keyed by channel key
//! schema-render --store ./schemas render board --data payloads.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use widget_schema::{
    CancelFlag, DataContext, EngineConfig, FileSchemaStore, Renderer, SchemaResolver,
    TracingObserver, ValueFormatter,
};

#[derive(Parser)]
#[command(name = "schema-render")]
#[command(version)]
#[command(about = "Resolve and render declarative widget schemas")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory of schema project documents
    #[arg(long, short, global = true, env = "SCHEMA_STORE_DIR", default_value = ".")]
    store: PathBuf,

    /// Engine configuration file (YAML); defaults to $WIDGET_SCHEMA_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inline schema references and list the required channels
    Resolve {
        /// Widget key of the project to resolve
        widget: String,
    },

    /// Resolve, then render against channel payloads
    Render {
        /// Widget key of the project to render
        widget: String,

        /// JSON object mapping channel keys to their latest payloads
        #[arg(long, short)]
        data: Option<PathBuf>,

        /// JSON payload exposed under the `self` alias
        #[arg(long = "self")]
        self_payload: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::from_env()?,
    };

    let resolver = SchemaResolver::new(Arc::new(FileSchemaStore::new(&cli.store)))
        .with_config(config.resolver.clone())
        .with_observer(Arc::new(TracingObserver));

    let output = match cli.command {
        Commands::Resolve { widget } => {
            let resolution = resolver.resolve_widget(&widget, &CancelFlag::new()).await?;
            serde_json::to_value(&resolution)?
        }
        Commands::Render {
            widget,
            data,
            self_payload,
        } => {
            let resolution = resolver.resolve_widget(&widget, &CancelFlag::new()).await?;

            let payloads: HashMap<String, Value> = match data {
                Some(path) => serde_json::from_value(read_json(&path)?)
                    .with_context(|| format!("{} is not an object of payloads", path.display()))?,
                None => HashMap::new(),
            };
            let self_payload = self_payload.as_deref().map(read_json).transpose()?;
            let ctx = DataContext::from_channels(&resolution.channels, &payloads, self_payload);

            let observer = TracingObserver;
            let renderer = Renderer::new(ValueFormatter::new(config.formatter.clone()))
                .with_observer(&observer);
            let nodes = renderer.render(&resolution.schema, &ctx).into_nodes();
            info!(widget = %widget, nodes = nodes.len(), "schema rendered");
            serde_json::to_value(&nodes)?
        }
    };

    let text = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", text);
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
