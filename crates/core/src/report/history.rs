//! History documents: the capped `recent.html` and the unbounded
//! `summary.html`.
//!
//! Each run is one line of the form
//!
//! ```text
//! <a href="log/20261018T074512Z.log.html.gz" name="20261018T074512Z">20261018T074512Z</a> r54321 ruby 3.4.0dev (agent1) success<br>
//! ```
//!
//! with ` (<a href="...">diff</a>)` before the `<br>` in the summary.
//! Every other line of the document is chrome and is ignored when reading.

use crate::markup::{escape_html, unescape_html};
use bf_protocol::history_models::HistoryEntry;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const RECENT_FILE: &str = "recent.html";
pub const SUMMARY_FILE: &str = "summary.html";

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Failed to read history document {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to write history document {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Report writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Which retention policy a document follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    /// Most recent first, capped.
    Recent,
    /// Chronological, unbounded, with diff links.
    Summary,
}

impl HistoryKind {
    pub fn file_name(self) -> &'static str {
        match self {
            HistoryKind::Recent => RECENT_FILE,
            HistoryKind::Summary => SUMMARY_FILE,
        }
    }

    fn heading(self) -> &'static str {
        match self {
            HistoryKind::Recent => "recent build summary",
            HistoryKind::Summary => "build summary",
        }
    }
}

/// Parse one entry line; `None` for anything that is not an entry.
pub fn parse_entry(line: &str) -> Option<HistoryEntry> {
    let rest = line.trim_end().strip_prefix("<a href=\"")?;
    let (href, rest) = rest.split_once('"')?;
    let rest = rest.strip_prefix(" name=\"")?;
    let (name, rest) = rest.split_once('"')?;
    let rest = rest.strip_prefix('>')?;
    let (_, rest) = rest.split_once("</a> ")?;
    let mut title = rest.strip_suffix("<br>")?;

    let mut diff_ref = None;
    if let Some(head) = title.strip_suffix("\">diff</a>)") {
        if let Some((before, diff)) = head.rsplit_once(" (<a href=\"") {
            title = before;
            diff_ref = Some(unescape_html(diff));
        }
    }

    Some(HistoryEntry {
        start_time: unescape_html(name),
        title: unescape_html(title),
        log_ref: unescape_html(href),
        diff_ref,
    })
}

/// All entries of a document, in document order.
pub fn parse_entries(text: &str) -> Vec<HistoryEntry> {
    text.lines().filter_map(parse_entry).collect()
}

/// Render one entry line (without the trailing newline).
pub fn render_entry(entry: &HistoryEntry, kind: HistoryKind) -> String {
    let mut line = format!(
        "<a href=\"{}\" name=\"{}\">{}</a> {}",
        escape_html(&entry.log_ref),
        escape_html(&entry.start_time),
        escape_html(&entry.start_time),
        escape_html(&entry.title)
    );
    if kind == HistoryKind::Summary {
        if let Some(diff) = &entry.diff_ref {
            line.push_str(&format!(" (<a href=\"{}\">diff</a>)", escape_html(diff)));
        }
    }
    line.push_str("<br>");
    line
}

/// Render a whole document.
pub fn render_document(
    kind: HistoryKind,
    logdir_name: &str,
    target: &str,
    entries: &[HistoryEntry],
) -> String {
    let heading = format!(
        "{} {} ({})",
        escape_html(logdir_name),
        kind.heading(),
        escape_html(target)
    );
    let mut out = String::new();
    out.push_str("<html>\n  <head>\n");
    out.push_str(&format!("    <title>{heading}</title>\n"));
    out.push_str("    <meta charset=\"utf-8\">\n");
    out.push_str("    <meta name=\"generator\" content=\"buildfarm\">\n");
    out.push_str("  </head>\n  <body>\n");
    out.push_str(&format!("    <h1>{heading}</h1>\n"));
    for entry in entries {
        out.push_str(&render_entry(entry, kind));
        out.push('\n');
    }
    out.push_str("  </body>\n</html>\n");
    out
}

/// Entries of the document at `path`; a missing document has none.
pub fn read_entries(path: &Path) -> Result<Vec<HistoryEntry>, HistoryError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_entries(&text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(HistoryError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Insert `entry` according to `kind`'s retention policy.
pub fn merge_entry(
    mut entries: Vec<HistoryEntry>,
    entry: HistoryEntry,
    kind: HistoryKind,
    limit: usize,
) -> Vec<HistoryEntry> {
    match kind {
        HistoryKind::Recent => {
            entries.insert(0, entry);
            entries.truncate(limit);
        }
        HistoryKind::Summary => entries.push(entry),
    }
    entries
}

/// Write `contents` to a sibling temporary file, then rename it over
/// `path`. Readers see either the old or the new document.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), HistoryError> {
    let write_error = |source| HistoryError::Write {
        path: path.to_path_buf(),
        source,
    };
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_error)?;
    temp.write_all(contents.as_bytes()).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}

/// Add `entry` to the document of `kind` under `logdir`.
pub fn record(
    logdir: &Path,
    kind: HistoryKind,
    target: &str,
    entry: HistoryEntry,
    limit: usize,
) -> Result<PathBuf, HistoryError> {
    let path = logdir.join(kind.file_name());
    let entries = merge_entry(read_entries(&path)?, entry, kind, limit);
    let logdir_name = logdir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    write_atomic(&path, &render_document(kind, &logdir_name, target, &entries))?;
    Ok(path)
}

/// The newest entry of `recent.html` under `logdir`, if any.
pub fn last_recorded(logdir: &Path) -> Result<Option<HistoryEntry>, HistoryError> {
    Ok(read_entries(&logdir.join(RECENT_FILE))?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(stamp: &str, title: &str) -> HistoryEntry {
        HistoryEntry {
            start_time: stamp.to_string(),
            title: title.to_string(),
            log_ref: format!("log/{stamp}.log.html.gz"),
            diff_ref: Some(format!("log/{stamp}.diff.html.gz")),
        }
    }

    #[test]
    fn test_render_recent_entry() {
        let line = render_entry(
            &entry("20261018T074512Z", "r54321 ruby <dev> (agent1) success"),
            HistoryKind::Recent,
        );
        assert_eq!(
            line,
            "<a href=\"log/20261018T074512Z.log.html.gz\" name=\"20261018T074512Z\">20261018T074512Z</a> r54321 ruby &lt;dev&gt; (agent1) success<br>"
        );
    }

    #[test]
    fn test_parse_rendered_entries() {
        let original = entry("20261018T074512Z", "r1 ruby (agent1) 3BFail failed(a&b)");

        let recent = parse_entry(&render_entry(&original, HistoryKind::Recent))
            .expect("recent line parses");
        assert_eq!(recent.title, original.title);
        assert_eq!(recent.log_ref, original.log_ref);
        assert_eq!(recent.diff_ref, None);

        let summary = parse_entry(&render_entry(&original, HistoryKind::Summary))
            .expect("summary line parses");
        assert_eq!(summary, original);
    }

    #[test]
    fn test_rewriting_never_double_escapes() {
        let original = entry("20261018T074512Z", "ruby & <friends>");
        let once = render_entry(&original, HistoryKind::Recent);
        let twice = render_entry(
            &parse_entry(&once).expect("parses"),
            HistoryKind::Recent,
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn test_chrome_lines_are_ignored() {
        let text = render_document(
            HistoryKind::Recent,
            "trunk",
            "gcc",
            &[entry("20261018T074512Z", "a success"), entry("20261017T074512Z", "b")],
        );
        let parsed = parse_entries(&text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].title, "a success");
        assert!(text.contains("<title>trunk recent build summary (gcc)</title>"));
    }

    #[test]
    fn test_merge_recent_is_capped_most_recent_first() {
        let entries = vec![entry("2", "b"), entry("1", "a")];
        let merged = merge_entry(entries, entry("3", "c"), HistoryKind::Recent, 2);
        let stamps: Vec<_> = merged.iter().map(|e| e.start_time.as_str()).collect();
        assert_eq!(stamps, vec!["3", "2"]);
    }

    #[test]
    fn test_merge_summary_is_chronological_and_unbounded() {
        let entries = vec![entry("1", "a"), entry("2", "b")];
        let merged = merge_entry(entries, entry("3", "c"), HistoryKind::Summary, 1);
        let stamps: Vec<_> = merged.iter().map(|e| e.start_time.as_str()).collect();
        assert_eq!(stamps, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_record_and_last_recorded() {
        let dir = tempdir().expect("tempdir");
        assert_eq!(last_recorded(dir.path()).expect("empty logdir"), None);

        record(dir.path(), HistoryKind::Recent, "gcc", entry("20261017T000000Z", "r1 x"), 100)
            .expect("first record");
        record(dir.path(), HistoryKind::Recent, "gcc", entry("20261018T000000Z", "r2 x"), 100)
            .expect("second record");

        let last = last_recorded(dir.path())
            .expect("readable")
            .expect("has entries");
        assert_eq!(last.start_time, "20261018T000000Z");
        assert_eq!(last.revision(), Some("2"));
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("recent.html");
        write_atomic(&path, "old").expect("write old");
        write_atomic(&path, "new").expect("write new");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "new");

        let leftovers = std::fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(leftovers, 1);
    }
}
