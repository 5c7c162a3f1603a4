//! iphotodb — mirror an iPhoto library into a SQL database.
//!
//! Parses the library's AlbumData.xml property list, synchronizes images,
//! albums, rolls, and keyword facts into SQLite keyed by stable library
//! identifiers, and optionally exports the referenced media files under
//! deterministic names. Runs are idempotent: re-running against the same
//! database updates rows in place.

#![warn(clippy::all)]

mod album;
mod cli;
mod config;
mod export;
mod progress;
mod store;
mod sync;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::Config;
use export::TransferStrategy;
use progress::Progress;
use store::SqliteStore;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let filter = match cli.log_level {
        cli::LogLevel::Debug => "debug",
        cli::LogLevel::Info => "info",
        cli::LogLevel::Warn => "warn",
        cli::LogLevel::Error => "error",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let config = Config::load(cli)?;
    tracing::debug!(?config, "Configuration resolved");

    run(&config)
}

fn run(config: &Config) -> anyhow::Result<()> {
    // Load before touching the database: a document that fails to parse or
    // version-gate must not follow a destructive rebuild.
    let data = album::load(&config.library)?;
    if !config.quiet {
        println!(
            "Loaded library: {} ({} images, {} albums, {} rolls, {} keywords)",
            data.properties.path,
            data.images.len(),
            data.albums.len(),
            data.rolls.len(),
            data.keywords.len()
        );
    }

    let store = SqliteStore::open(&config.database, &config.table_prefix)?;
    if config.force {
        tracing::warn!("Force option specified, re-creating all tables");
        store.rebuild()?;
    }

    let progress = Progress::new(config.quiet, config.no_progress_bar);
    let report = sync::synchronize(&store, &data, &progress)?;

    if !config.quiet {
        println!("Database synchronized (library row {}):", report.library_id);
        println!(
            "  Images:  {} inserted, {} updated",
            report.images.inserted, report.images.updated
        );
        println!(
            "  Albums:  {} inserted, {} updated",
            report.albums.inserted, report.albums.updated
        );
        println!(
            "  Rolls:   {} inserted, {} updated",
            report.rolls.inserted, report.rolls.updated
        );
        println!(
            "  Facts:   {} keywords, {} image keywords, {} album members, {} filters",
            report.keywords, report.image_keywords, report.album_images, report.filters
        );
    }

    if config.skip_export {
        tracing::info!("Export skipped by request");
        return Ok(());
    }
    let export_dir = match &config.export_dir {
        Some(dir) => dir,
        None => {
            tracing::info!("No export directory configured, skipping export");
            return Ok(());
        }
    };

    let strategy = if config.link {
        TransferStrategy::Link
    } else {
        TransferStrategy::Copy
    };
    let image_ids: Vec<i64> = data.images.keys().copied().collect();
    let export_report = export::export(
        &store,
        report.library_id,
        &image_ids,
        export_dir,
        strategy,
        &progress,
    )?;

    if !config.quiet {
        println!(
            "Exported {} files to {} ({} recovered on retry)",
            export_report.exported + export_report.recovered,
            export_dir.display(),
            export_report.recovered
        );
    }
    for dest in &export_report.unrecoverable {
        tracing::warn!("Unrecoverable export: {}", dest.display());
    }

    Ok(())
}
