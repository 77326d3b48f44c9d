// src/main.rs

//! `clipbridge` command-line front end: copy text to, paste from and list
//! the X11 clipboard through the clipboard layer.

use std::io::Write;
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};

use clipbridge::backends::XHost;
use clipbridge::clipboard::format::{builtin_by_name, FormatId, CF_OEMTEXT, CF_TEXT, CF_UNICODETEXT};
use clipbridge::clipboard::text::{self, Codepage};
use clipbridge::config::{Config, CONFIG};
use clipbridge::{Clipboard, ClipboardService, ContextId, INVALID_FORMAT};

/// The context the command line acts as.
const CLI_CONTEXT: ContextId = ContextId(1);

#[derive(Parser)]
#[command(name = "clipbridge")]
#[command(about = "Exchange clipboard data with X11 selection owners")]
#[command(version)]
struct Cli {
    /// Path to a JSON configuration file (overrides $CLIPBRIDGE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Own the clipboard with TEXT until another client takes it over
    Copy { text: String },
    /// Print the clipboard contents in one format
    Paste {
        /// A built-in format name (TEXT, OEMTEXT, UNICODETEXT, ...) or a registered name
        #[arg(long, default_value = "UNICODETEXT")]
        format: String,
    },
    /// List the formats currently on offer
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => CONFIG.clone(),
    };

    let filter = if cli.verbose { "debug" } else { config.logging.filter.as_str() };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_micros()
        .init();

    info!("Starting clipbridge...");
    debug!("Configuration: {:?}", config);

    let service = ClipboardService::new(config.selection.clone());
    let clipboard = service
        .attach(XHost::open()?)
        .context("Failed to attach to the X11 display")?;

    match cli.command {
        Command::Copy { text } => copy(&clipboard, &text),
        Command::Paste { format } => paste(&clipboard, &format),
        Command::List => list(&clipboard),
    }
}

fn copy(clipboard: &Clipboard<XHost>, input: &str) -> Result<()> {
    let local = input.replace("\r\n", "\n").replace('\n', "\r\n");
    clipboard.open(CLI_CONTEXT)?;
    clipboard.empty()?;
    clipboard.set_data(CF_UNICODETEXT, Some(text::string_to_utf16le(&local)))?;
    clipboard.set_data(CF_TEXT, Some(text::string_to_ansi(&local)))?;
    clipboard.close()?;

    info!("Serving the clipboard until another client takes it over");
    let interval = clipboard.service().config().poll_interval();
    while clipboard.owns_selection() {
        clipboard.pump_events();
        thread::sleep(interval);
    }
    info!("Clipboard taken over; exiting");
    Ok(())
}

fn resolve_format(clipboard: &Clipboard<XHost>, name: &str) -> Result<FormatId> {
    let bare = name.strip_prefix("CF_").unwrap_or(name);
    match builtin_by_name(bare) {
        Some(id) => Ok(id),
        None => clipboard
            .register_format(name)
            .with_context(|| format!("Invalid format name '{}'", name)),
    }
}

fn paste(clipboard: &Clipboard<XHost>, format: &str) -> Result<()> {
    let id = resolve_format(clipboard, format)?;
    clipboard.open(CLI_CONTEXT)?;
    let fetched = clipboard.get_data(id);
    clipboard.close()?;
    let data = fetched.with_context(|| format!("Cannot paste {}", format))?;

    let decoded = match id {
        CF_UNICODETEXT => Some(text::utf16le_to_string(&data)),
        CF_TEXT => Some(Codepage::Windows1252.decode(&data)),
        CF_OEMTEXT => Some(Codepage::Oem437.decode(&data)),
        _ => None,
    };
    let mut stdout = std::io::stdout().lock();
    match decoded {
        Some(text) => writeln!(stdout, "{}", text.replace("\r\n", "\n"))?,
        None => stdout.write_all(&data)?,
    }
    Ok(())
}

fn list(clipboard: &Clipboard<XHost>) -> Result<()> {
    clipboard.open(CLI_CONTEXT)?;
    let mut formats = Vec::new();
    let walk = (|| {
        let mut id = clipboard.enum_formats(INVALID_FORMAT)?;
        while id != INVALID_FORMAT {
            formats.push(id);
            id = clipboard.enum_formats(id)?;
        }
        Ok::<_, clipbridge::ClipboardError>(())
    })();
    clipboard.close()?;
    walk?;

    let registry = clipboard.service().registry();
    for id in formats {
        println!("{:#06x}  {}", id, registry.describe(id));
    }
    Ok(())
}
