//! CLI output helpers.
//!
//! stdout carries exactly one canonical JSON document per invocation; humans
//! read stderr.

use std::io::{self, Write};

use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use packline_core::determinism::canonical_json::canonical_json_line;

/// Print a value as canonical JSON with a single trailing newline.
pub fn print_canonical<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let v = serde_json::to_value(value)?;
    let bytes = canonical_json_line(&v)?;
    io::stdout().write_all(&bytes)?;
    io::stdout().flush()?;
    Ok(())
}

/// Write a diagnostic line to stderr, colored when attached to a terminal.
pub fn eprintln_line(msg: &str) {
    let mut stream = StandardStream::stderr(ColorChoice::Auto);
    let _ = stream.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
    let _ = writeln!(stream, "{msg}");
    let _ = stream.reset();
}
