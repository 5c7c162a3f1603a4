use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cli::Cli;

/// Resolved application configuration: the config file's values with CLI
/// arguments layered on top.
#[derive(Debug)]
pub struct Config {
    pub library: PathBuf,
    pub database: PathBuf,
    pub table_prefix: String,
    pub export_dir: Option<PathBuf>,
    pub link: bool,
    pub force: bool,
    pub skip_export: bool,
    pub quiet: bool,
    pub no_progress_bar: bool,
}

/// On-disk TOML shape. Every field is optional so a file can set just the
/// paths and leave behavior to the command line.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    library: LibrarySection,
    #[serde(default)]
    database: DatabaseSection,
    #[serde(default)]
    export: ExportSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LibrarySection {
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatabaseSection {
    path: Option<String>,
    table_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExportSection {
    directory: Option<String>,
    link: Option<bool>,
}

/// Expand ~ to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn load(cli: Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => read_file_config(Path::new(path))?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    fn merge(cli: Cli, file: FileConfig) -> anyhow::Result<Self> {
        let library = cli
            .library
            .or(file.library.path)
            .map(|p| expand_tilde(&p))
            .ok_or_else(|| {
                anyhow::anyhow!("No library given; pass --library or set [library] path")
            })?;

        let database = cli
            .database
            .or(file.database.path)
            .map(|p| expand_tilde(&p))
            .unwrap_or_else(|| PathBuf::from("iphoto.db"));

        let table_prefix = cli
            .table_prefix
            .or(file.database.table_prefix)
            .unwrap_or_default();

        let export_dir = cli
            .export_dir
            .or(file.export.directory)
            .map(|p| expand_tilde(&p));

        Ok(Self {
            library,
            database,
            table_prefix,
            export_dir,
            link: cli.link || file.export.link.unwrap_or(false),
            force: cli.force,
            skip_export: cli.skip_export,
            quiet: cli.quiet,
            no_progress_bar: cli.no_progress_bar,
        })
    }
}

fn read_file_config(path: &Path) -> anyhow::Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read config file {}: {}", path.display(), e))?;
    let parsed = toml::from_str(&text)
        .map_err(|e| anyhow::anyhow!("Cannot parse config file {}: {}", path.display(), e))?;
    Ok(parsed)
}
