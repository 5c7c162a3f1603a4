//! Progress bar construction shared by the sync and export stages.

use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressStyle};

/// Factory for stage progress bars, carrying the user's display choices.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    enabled: bool,
}

impl Progress {
    /// Bars are shown only when asked for and stderr (where indicatif
    /// draws) is a TTY; piped output and cron jobs get none.
    pub fn new(quiet: bool, no_progress_bar: bool) -> Self {
        Self {
            enabled: !quiet && !no_progress_bar && std::io::stderr().is_terminal(),
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    /// Create a bar for one stage with a consistent template.
    ///
    /// Returns `ProgressBar::hidden()` when bars are disabled so callers can
    /// drive it unconditionally.
    pub fn bar(&self, total: u64, label: &str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::with_template(
                "{msg:>9} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})",
            )
            .expect("valid template")
            .progress_chars("=> "),
        );
        pb.set_message(label.to_string());
        pb
    }
}
