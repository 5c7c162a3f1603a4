use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "iphotodb",
    about = "Mirror an iPhoto library into a SQL database and export its media"
)]
pub struct Cli {
    /// Path to the library's AlbumData.xml
    #[arg(short = 'l', long)]
    pub library: Option<String>,

    /// Path to a TOML config file
    #[arg(short = 'c', long)]
    pub config: Option<String>,

    /// Path to the SQLite database file
    #[arg(short = 'd', long)]
    pub database: Option<String>,

    /// Prefix for all table names (for sharing a database)
    #[arg(long)]
    pub table_prefix: Option<String>,

    /// Directory to export media files into
    #[arg(short = 'e', long)]
    pub export_dir: Option<String>,

    /// Export symlinks into the library instead of copies
    #[arg(short = 'i', long)]
    pub link: bool,

    /// Drop and re-create all tables before syncing (DATA DESTRUCTIVE)
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Synchronize the database but skip media export
    #[arg(long)]
    pub skip_export: bool,

    /// Suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}
