//! # Change Reporting
//!
//! Reconciliation produces a human-readable audit trail: one line per
//! applied change and a summary line for environments with nothing to
//! update. Lines go to an injected [`Reporter`], so the patch logic never
//! touches global logging state.
//!
//! Lines are free text meant for people; their wording is not a stable
//! machine format.

use std::io::Write;

/// Target used for report lines forwarded to the `log` facade.
pub const LOG_TARGET: &str = "kev::audit";

/// Sink for reconciliation report lines.
pub trait Reporter {
    fn report(&mut self, line: &str);
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn report(&mut self, line: &str) {
        (**self).report(line)
    }
}

/// Forwards every line to the `log` facade at the debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, line: &str) {
        log::debug!(target: LOG_TARGET, "{}", line);
    }
}

/// Buffers lines in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryReporter {
    lines: Vec<String>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// All lines joined with newlines.
    pub fn text(&self) -> String {
        let mut out = self.lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

impl Reporter for MemoryReporter {
    fn report(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Writes each line, newline terminated, to any writer.
///
/// Write errors are dropped; the audit trail never fails a reconciliation.
#[derive(Debug)]
pub struct WriterReporter<W: Write> {
    writer: W,
}

impl<W: Write> WriterReporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Reporter for WriterReporter<W> {
    fn report(&mut self, line: &str) {
        let _ = writeln!(self.writer, "{}", line);
    }
}

/// Discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&mut self, _line: &str) {}
}
