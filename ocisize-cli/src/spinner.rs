use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::{io::IsTerminal, time::Duration};

/// Spinner on stderr while a query is running
///
/// Ticks on its own thread, so the query does not need to drive it.
/// Hidden when disabled or when stdout or stderr is not a terminal.
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    pub fn new(message: impl Into<String>, enabled: bool) -> Self {
        if !enabled || !std::io::stdout().is_terminal() || !std::io::stderr().is_terminal() {
            return Spinner { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.dim} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(80));
        Spinner { bar: Some(bar) }
    }

    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }

    /// Clear the spinner, the result goes to stdout
    pub fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }

    /// Clear the spinner and print a `✗ Failed` line to stderr
    pub fn fail(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
            eprintln!("{} Failed", "✗".red());
        }
    }
}
