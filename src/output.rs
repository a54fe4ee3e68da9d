//! Coloured terminal output for the CLI

use crate::index::Document;
use crate::index::build::BuildReport;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn stdout(color: bool) -> StandardStream {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Print matching documents: id, file name, size
pub fn print_documents(docs: &[Document], total: usize, color: bool) -> io::Result<()> {
    let mut stdout = stdout(color);

    for doc in docs {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(stdout, "{:>8}", doc.doc_id.map(|id| id.to_string()).unwrap_or_default())?;
        stdout.reset()?;
        write!(stdout, "  ")?;

        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)).set_bold(true))?;
        write!(stdout, "{}", doc.file_name)?;
        stdout.reset()?;

        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        writeln!(stdout, "  ({} bytes)", doc.file_size)?;
        stdout.reset()?;
    }

    if total > docs.len() {
        writeln!(stdout, "... and {} more", total - docs.len())?;
    }
    print_count(&mut stdout, total, "document")
}

/// Print bare document ids, for plain-mode indexes
pub fn print_rows(rows: &[u32], color: bool) -> io::Result<()> {
    let mut stdout = stdout(color);
    for row in rows {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        writeln!(stdout, "{}", row)?;
        stdout.reset()?;
    }
    print_count(&mut stdout, rows.len(), "row")
}

pub fn print_words(words: &[String], color: bool) -> io::Result<()> {
    let mut stdout = stdout(color);
    for word in words {
        writeln!(stdout, "{}", word)?;
    }
    print_count(&mut stdout, words.len(), "word")
}

fn print_count(stdout: &mut StandardStream, count: usize, noun: &str) -> io::Result<()> {
    stdout.set_color(ColorSpec::new().set_dimmed(true))?;
    let plural = if count == 1 { "" } else { "s" };
    writeln!(stdout, "{} {}{}", count, noun, plural)?;
    stdout.reset()
}

/// Print the summary of a bulk indexing run
pub fn print_build_report(report: &BuildReport, color: bool) -> io::Result<()> {
    let mut stdout = stdout(color);

    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(stdout, "Indexed {}", report.indexed)?;
    stdout.reset()?;
    write!(stdout, " files, skipped {}", report.skipped)?;
    if report.failed > 0 {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
        write!(stdout, ", failed {}", report.failed)?;
        stdout.reset()?;
    }
    writeln!(stdout, " in {:.2}s", report.elapsed.as_secs_f64())
}
