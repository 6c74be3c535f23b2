//! Machine-readable history: `recent.ltsv`.
//!
//! One line per run, most recent first, capped like `recent.html`. Fields
//! are `key:value` joined by TAB. Keys escape `%`, `:`, TAB, CR and LF;
//! values escape the same set except `:`.

use crate::report::history::{write_atomic, HistoryError};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

pub const LTSV_FILE: &str = "recent.ltsv";

/// Keys emitted first, in this order; the rest follow sorted.
const LEADING_KEYS: &[&str] = &["start_time", "title", "result", "log", "diff"];

fn escape(text: &str, escape_colon: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '%' => out.push_str("%25"),
            '\t' => out.push_str("%09"),
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            ':' if escape_colon => out.push_str("%3A"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_key(key: &str) -> String {
    escape(key, true)
}

pub fn escape_value(value: &str) -> String {
    escape(value, false)
}

/// Reverse either escaping.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let code = rest.get(pos + 1..pos + 3);
        match code.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
            Some(byte) if byte.is_ascii() => {
                out.push(char::from(byte));
                rest = &rest[pos + 3..];
            }
            _ => {
                out.push('%');
                rest = &rest[pos + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Render one run's fields as a line (without the newline).
pub fn render_line(fields: &BTreeMap<String, String>) -> String {
    let leading = LEADING_KEYS
        .iter()
        .filter_map(|key| fields.get_key_value(*key));
    let rest = fields
        .iter()
        .filter(|(key, _)| !LEADING_KEYS.contains(&key.as_str()));

    leading
        .chain(rest)
        .map(|(key, value)| format!("{}:{}", escape_key(key), escape_value(value)))
        .collect::<Vec<_>>()
        .join("\t")
}

/// Parse a line back into its fields. Fields without a `:` are dropped.
pub fn parse_line(line: &str) -> BTreeMap<String, String> {
    line.split('\t')
        .filter_map(|field| field.split_once(':'))
        .map(|(key, value)| (unescape(key), unescape(value)))
        .collect()
}

/// Prepend `fields` to the document under `logdir`, keeping at most
/// `limit` lines.
pub fn record(
    logdir: &Path,
    fields: &BTreeMap<String, String>,
    limit: usize,
) -> Result<std::path::PathBuf, HistoryError> {
    let path = logdir.join(LTSV_FILE);
    let existing = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(source) => return Err(HistoryError::Read { path, source }),
    };

    let mut lines = vec![render_line(fields)];
    lines.extend(
        existing
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string),
    );
    lines.truncate(limit);

    let mut contents = lines.join("\n");
    contents.push('\n');
    write_atomic(&path, &contents)?;
    Ok(path)
}
