#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{Level as TraceLevel, info};
use tracing_subscriber::FmtSubscriber;

use page_styler::compositor::compose;
use page_styler::config::{ConfigStore, EditScope, HostSettings, JsonFileStore, store::load_seeded};
use page_styler::constants::env;
use page_styler::ipc::{HostServer, default_socket_path};
use page_styler::native_host;

#[derive(Parser, Debug)]
#[command(name = "page-styler", version, about = "Layered CSS injection host")]
struct Cli {
    /// trace, debug, info, warn or error (overrides LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Schema file (default: $XDG_CONFIG_HOME/page-styler/storage.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run as native messaging host (default)
    Serve {
        /// Serve over a Unix socket instead of stdio
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        socket: Option<PathBuf>,
    },

    /// Print the composed CSS for a hostname
    Compose { host: String },

    /// List the preset library
    Presets,

    /// Clear global rules, or one site's rules with --site
    Reset {
        #[arg(long)]
        site: Option<String>,
    },
}

fn parse_level(raw: &str) -> TraceLevel {
    match raw.to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

fn init_logging(cli_level: Option<&str>) -> Result<()> {
    let raw = cli_level
        .map(str::to_string)
        .unwrap_or_else(|| std::env::var(env::LOG_LEVEL).unwrap_or_else(|_| "info".to_string()));

    // stdout carries native messaging frames
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&raw))
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")
}

async fn serve(settings: &HostSettings, store: Arc<dyn ConfigStore>, socket: Option<PathBuf>) -> Result<()> {
    let Some(socket) = socket else {
        info!(store = %settings.store_path.display(), "Serving on stdio");
        return native_host::run(settings, store, std::io::stdin(), std::io::stdout()).await;
    };

    let path = if socket.as_os_str().is_empty() {
        default_socket_path()?
    } else {
        socket
    };
    let server = HostServer::bind_to(path)?;
    info!(socket = ?server.path(), "Serving on socket");

    // One session at a time, each until its client disconnects
    loop {
        let (reader, writer) = server.accept()?.split()?;
        native_host::run(settings, Arc::clone(&store), reader, writer).await?;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    let mut settings = HostSettings::from_env();
    if let Some(path) = cli.store {
        settings.store_path = path;
    }
    let store = Arc::new(JsonFileStore::new(settings.store_path.clone()));

    match cli.command.unwrap_or(Command::Serve { socket: None }) {
        Command::Serve { socket } => serve(&settings, store, socket).await,
        Command::Compose { host } => {
            let schema = load_seeded(store.as_ref()).await?;
            print!("{}", compose(&schema, &host));
            Ok(())
        }
        Command::Presets => {
            let schema = load_seeded(store.as_ref()).await?;
            for preset in schema.presets.values() {
                let scope = if preset.is_global() {
                    "global".to_string()
                } else {
                    let sites = preset.enabled_sites.as_deref().unwrap_or_default();
                    format!("{} site(s)", sites.len())
                };
                println!("{}\t{}\t{}", preset.id, preset.name, scope);
            }
            Ok(())
        }
        Command::Reset { site } => {
            let scope = site.map_or(EditScope::Global, EditScope::Site);
            let mut schema = store.load().await?;
            schema.reset(&scope)?;
            store.save(&schema).await?;
            info!(scope = ?scope, path = %store.path().display(), "Reset complete");
            Ok(())
        }
    }
}
