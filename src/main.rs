//! Marksync - map markdown source lines to preview offsets and back.
//!
//! # Usage
//!
//! ```bash
//! marksync README.md --line 42
//! marksync README.md --offset 300 --width 100
//! marksync --dump --watch README.md
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use marksync::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_config_flags, local_override_path,
    parse_flag_tokens, save_config_flags,
};
use marksync::layout::estimate_blocks;
use marksync::prelude::*;
use marksync::watcher::FileWatcher;

/// How long to wait for a file load before giving up.
const LOAD_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Map markdown source lines to rendered preview offsets
#[derive(Parser, Debug)]
#[command(name = "marksync", version, about, long_about = None)]
struct Cli {
    /// Markdown file to map
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Source line to translate into a preview offset
    #[arg(long, conflicts_with = "offset")]
    line: Option<usize>,

    /// Preview offset to translate into a source line
    #[arg(long)]
    offset: Option<usize>,

    /// Layout width in columns used to estimate block heights
    #[arg(long, value_name = "COLS", default_value_t = 80)]
    width: usize,

    /// Print the mapping table
    #[arg(long)]
    dump: bool,

    /// Keep running and re-map when the file changes
    #[arg(short, long)]
    watch: bool,

    /// Save current preview flags as defaults in the global config
    #[arg(long)]
    save: bool,

    /// Clear saved defaults in the global config
    #[arg(long)]
    clear: bool,

    #[command(flatten)]
    preview: PreviewArgs,
}

/// Config flags. Declared for `--help` and validation; the values are read
/// back through `parse_flag_tokens` so files and the command line share one
/// parser. Boolean flags take `--flag`, `--flag=VALUE` or `--flag VALUE`,
/// like rc files.
#[derive(clap::Args, Debug)]
#[allow(dead_code)]
struct PreviewArgs {
    /// Preview panel width in pixels (300-600)
    #[arg(long, value_name = "PX")]
    preview_width: Option<u16>,

    /// Which view drives the other
    #[arg(long, value_enum)]
    preview_sync: Option<SyncMode>,

    /// Base font size in pixels
    #[arg(long, value_name = "PX")]
    preview_font_size: Option<u16>,

    /// Ask before opening external links
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::builder::BoolishValueParser::new())]
    preview_confirm_external_links: Option<bool>,

    /// Load images only when scrolled into view
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::builder::BoolishValueParser::new())]
    preview_lazy_images: Option<bool>,

    /// Scroll debounce window in milliseconds
    #[arg(long, value_name = "MS")]
    preview_debounce_ms: Option<u64>,

    /// Idle time before the panel leaves the syncing state
    #[arg(long, value_name = "MS")]
    preview_settle_ms: Option<u64>,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let config = file_flags.union(&cli_flags).resolve();
    debug!(?config, "effective configuration");

    let session = Session::open(
        SessionStore::at(SessionStore::default_path()),
        SessionState::from_config(&config),
        config.font_size,
    );
    let mut preview = Preview::new(
        config,
        session,
        Arc::new(SystemClock::new()),
        Box::new(ThreadLoader::new()),
    );

    preview.open(Some(cli.file.clone()));
    wait_for_load(&mut preview)?;
    report(&mut preview, &cli)?;

    if cli.watch {
        watch(&mut preview, &cli)?;
    }
    Ok(())
}

/// Poll until the current load resolves.
fn wait_for_load(preview: &mut Preview) -> Result<()> {
    let mut waited = Duration::ZERO;
    while preview.current_state() == PanelState::FileLoading {
        if waited >= LOAD_TIMEOUT {
            anyhow::bail!("Timed out loading {}", describe(preview.file_path()));
        }
        thread::sleep(POLL_INTERVAL);
        waited += POLL_INTERVAL;
        preview.poll();
    }
    if let Some(err) = preview.error() {
        anyhow::bail!("{err}");
    }
    Ok(())
}

/// Lay out the loaded text and print what was asked for.
fn report(preview: &mut Preview, cli: &Cli) -> Result<()> {
    let source = preview
        .source()
        .context("No document loaded")?
        .to_owned();
    preview.on_layout(estimate_blocks(&source, cli.width));
    let table = preview.mapping();

    if cli.dump {
        print_table(&table);
    }
    if let Some(line) = cli.line {
        println!("{}", table.source_line_to_offset(line));
    }
    if let Some(offset) = cli.offset {
        println!("{}", table.offset_to_source_line(offset));
    }
    if !cli.dump && cli.line.is_none() && cli.offset.is_none() {
        println!(
            "{}: {} blocks, {} lines, {} rows",
            describe(preview.file_path()),
            table.len(),
            table.last_line(),
            table.total_offset()
        );
    }
    Ok(())
}

fn print_table(table: &MappingTable) {
    println!("{:>6}  {:<9}  {:>13}  {:>13}", "block", "kind", "lines", "offsets");
    for block in table.blocks() {
        let lines = format!("{}-{}", block.source_start, block.source_end);
        let offsets = format!("{}-{}", block.offset_start, block.offset_end);
        let mut note = String::new();
        if block.collapsed {
            note.push_str("  collapsed");
        }
        if let Some(reason) = &block.render_error {
            let _ = write!(note, "  error: {reason}");
        }
        println!(
            "{:>6}  {:<9}  {:>13}  {:>13}{note}",
            block.id.to_string(),
            format!("{:?}", block.kind).to_lowercase(),
            lines,
            offsets
        );
    }
    for repair in table.repairs() {
        println!("repaired: {repair}");
    }
}

/// Re-map on every change until interrupted.
fn watch(preview: &mut Preview, cli: &Cli) -> Result<()> {
    let debounce = Duration::from_millis(preview.config().debounce_ms);
    let mut watcher = FileWatcher::new(&cli.file, debounce)
        .with_context(|| format!("Failed to watch {}", cli.file.display()))?;

    loop {
        thread::sleep(POLL_INTERVAL);
        preview.poll();
        let Some(event) = watcher.take_event() else {
            continue;
        };
        preview.on_watch_event(event.clone());
        match event {
            WatchEvent::Deleted => {
                eprintln!("{} was deleted; waiting for it to return", describe(preview.file_path()));
            }
            WatchEvent::Moved(to) => {
                eprintln!("following rename to {}", to.display());
            }
            WatchEvent::Changed => match wait_for_load(preview) {
                Ok(()) => report(preview, cli)?,
                Err(err) => eprintln!("[warn] {err:#}"),
            },
        }
    }
}

fn describe(path: Option<&Path>) -> String {
    path.map_or_else(|| "<none>".to_string(), |p| p.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_bool_flag_accepts_separate_value() {
        let tokens = ["marksync", "--preview-lazy-images", "false", "README.md"];
        let cli = Cli::try_parse_from(tokens).unwrap();
        assert_eq!(cli.preview.preview_lazy_images, Some(false));
        assert_eq!(cli.file, PathBuf::from("README.md"));
        assert_eq!(parse_flag_tokens(&args(&tokens)).lazy_images, Some(false));
    }

    #[test]
    fn test_bool_flag_accepts_equals_and_bare_forms() {
        let cli = Cli::try_parse_from([
            "marksync",
            "--preview-confirm-external-links=no",
            "README.md",
            "--preview-lazy-images",
            "--dump",
        ])
        .unwrap();
        assert_eq!(cli.preview.preview_confirm_external_links, Some(false));
        assert_eq!(cli.preview.preview_lazy_images, Some(true));
        assert!(cli.dump);
    }

    #[test]
    fn test_line_and_offset_conflict() {
        let parsed = Cli::try_parse_from(["marksync", "a.md", "--line", "3", "--offset", "9"]);
        assert!(parsed.is_err());
    }
}
