//! Colored terminal output for search hits and index statistics

use crate::bench::report::format_bytes;
use crate::index::{DriverStats, IndexStats, SearchResult};
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

const SNIPPET_CHARS: usize = 120;

fn stdout(color: bool) -> StandardStream {
    StandardStream::stdout(if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    })
}

/// Print ranked hits. With `docs`, each hit shows the start of its text.
pub fn print_results(hits: &[SearchResult], docs: Option<&[String]>, color: bool) -> io::Result<()> {
    let mut out = stdout(color);
    write_results(&mut out, hits, docs)
}

pub fn write_results<W: WriteColor>(
    out: &mut W,
    hits: &[SearchResult],
    docs: Option<&[String]>,
) -> io::Result<()> {
    if hits.is_empty() {
        out.set_color(ColorSpec::new().set_dimmed(true))?;
        writeln!(out, "no matches")?;
        out.reset()?;
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        write!(out, "{:>3}", rank + 1)?;
        out.reset()?;
        write!(out, "  ")?;

        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)).set_bold(true))?;
        write!(out, "doc {}", hit.doc_id)?;
        out.reset()?;

        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(out, "  {:.4}", hit.score)?;
        out.reset()?;

        match docs.and_then(|d| d.get(hit.doc_id as usize)) {
            Some(text) => writeln!(out, "  {}", snippet(text))?,
            None => writeln!(out)?,
        }
    }
    Ok(())
}

/// First line of a document, cut at a char boundary
fn snippet(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    match line.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}…", &line[..cut]),
        None => line.to_string(),
    }
}

fn write_row<W: WriteColor>(out: &mut W, label: &str, value: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_bold(true))?;
    write!(out, "  {:<18}", label)?;
    out.reset()?;
    writeln!(out, "{}", value)
}

pub fn print_index_stats(stats: &IndexStats, color: bool) -> io::Result<()> {
    let mut out = stdout(color);
    write_index_stats(&mut out, stats)
}

pub fn write_index_stats<W: WriteColor>(out: &mut W, stats: &IndexStats) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    writeln!(out, "{} index", stats.profile)?;
    out.reset()?;

    write_row(out, "documents", &stats.doc_count.to_string())?;
    write_row(out, "terms", &stats.term_count.to_string())?;
    write_row(out, "postings", &stats.posting_count.to_string())?;
    write_row(out, "tokens", &stats.total_tokens.to_string())?;
    write_row(out, "avg doc length", &format!("{:.1}", stats.avg_doc_length()))?;
    write_row(out, "memory", &format_bytes(stats.memory_bytes))?;
    write_row(out, "postings size", &format_bytes(stats.postings_bytes))?;
    write_row(out, "bits/posting", &format!("{:.2}", stats.bits_per_posting()))
}

pub fn print_driver_stats(name: &str, stats: &DriverStats, color: bool) -> io::Result<()> {
    let mut out = stdout(color);
    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    writeln!(out, "{} driver", name)?;
    out.reset()?;
    write_row(&mut out, "documents", &stats.doc_count.to_string())?;
    write_row(&mut out, "terms", &stats.term_count.to_string())?;
    write_row(&mut out, "memory", &format_bytes(stats.memory_bytes))
}
