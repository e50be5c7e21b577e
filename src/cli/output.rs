//! Handles all user-facing output for the CLI.
//!
//! Diagnostics go to stderr as `miette` reports; results and the check summary go to
//! stdout, coloured with `termcolor` when the terminal supports it.

use std::io::Write;
use std::path::Path;

use miette::{NamedSource, Report};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::diagnostics::ParseDiagnostic;

/// Totals of a `check` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub files: usize,
    pub clean: usize,
    pub warnings: usize,
    pub failed: usize,
}

impl CheckSummary {
    /// Whether the run should exit successfully.
    pub fn passed(&self, deny_warnings: bool) -> bool {
        self.failed == 0 && !(deny_warnings && self.warnings > 0)
    }
}

/// Outcome of checking one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Clean,
    Warnings(usize),
    Failed,
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

/// Prints each diagnostic as a graphical report against the named source.
pub fn print_diagnostics(name: &str, text: &str, diagnostics: &[ParseDiagnostic]) {
    for diagnostic in diagnostics {
        let report = Report::new(diagnostic.clone())
            .with_source_code(NamedSource::new(name, text.to_string()));
        eprintln!("{report:?}");
    }
}

// ============================================================================
// CHECK OUTPUT
// ============================================================================

/// Prints one coloured status line for a checked file.
pub fn print_file_status(path: &Path, status: FileStatus) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let (mark, color, detail) = match status {
        FileStatus::Clean => ("✓", Color::Green, String::new()),
        FileStatus::Warnings(n) => ("!", Color::Yellow, format!(" ({n} warning{})", plural(n))),
        FileStatus::Failed => ("✗", Color::Red, " (error)".to_string()),
    };
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = write!(stdout, "{mark}");
    let _ = stdout.reset();
    let _ = writeln!(stdout, " {}{detail}", path.display());
}

/// Prints the totals of a `check` run.
pub fn print_check_summary(summary: &CheckSummary) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_bold(true));
    let _ = writeln!(stdout, "\nChecked {} file{}", summary.files, plural(summary.files));
    let _ = stdout.reset();

    if summary.clean > 0 {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
        let _ = writeln!(stdout, "  clean:    {}", summary.clean);
    }
    if summary.warnings > 0 {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
        let _ = writeln!(stdout, "  warnings: {}", summary.warnings);
    }
    if summary.failed > 0 {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
        let _ = writeln!(stdout, "  failed:   {}", summary.failed);
    }
    let _ = stdout.reset();
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
