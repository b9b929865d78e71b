//! # Output Styling
//!
//! Colour and marker handling for the `kev` command line.
//!
//! Colour follows `--color` first. In `auto` mode the usual conventions
//! apply: `NO_COLOR` disables colour, `CLICOLOR=0` disables it,
//! `CLICOLOR_FORCE` enables it, `TERM=dumb` disables it, and otherwise the
//! terminal decides.

use std::env;

use clap::ValueEnum;
use console::Style;

/// Value of the `--color` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

/// Kind of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Changed,
    Warning,
    Failed,
}

/// Resolved output settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    pub fn new(choice: ColorChoice) -> Self {
        let use_color = match choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => detect_color_support(),
        };
        Self { use_color }
    }

    /// Marker printed in front of a status line.
    pub fn marker(&self, status: Status) -> String {
        let (symbol, plain) = match status {
            Status::Ok => ("✓", "[ok]"),
            Status::Changed => ("✎", "[changed]"),
            Status::Warning => ("⚠", "[warn]"),
            Status::Failed => ("✗", "[failed]"),
        };
        if self.use_color {
            self.paint(status, symbol)
        } else {
            plain.to_string()
        }
    }

    /// Colour `text` for `status`, or return it unchanged without colour.
    pub fn paint(&self, status: Status, text: &str) -> String {
        if !self.use_color {
            return text.to_string();
        }
        let style = match status {
            Status::Ok => Style::new().green(),
            Status::Changed => Style::new().cyan(),
            Status::Warning => Style::new().yellow(),
            Status::Failed => Style::new().red().bold(),
        };
        style.force_styling(true).apply_to(text).to_string()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::new(ColorChoice::Auto)
    }
}

fn detect_color_support() -> bool {
    // Presence alone disables colour, even when empty.
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
        return false;
    }
    if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
        return true;
    }
    if env::var("TERM").is_ok_and(|v| v == "dumb") {
        return false;
    }
    console::Term::stdout().features().colors_supported()
}
