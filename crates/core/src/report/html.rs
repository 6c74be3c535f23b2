//! Per-run HTML artifacts: the full log and the diff placeholder.

use crate::markup::{escape_html, escape_url, is_heading_line};
use bf_protocol::run_models::RunState;
use std::fmt::Write as _;

/// Escape one transcript line for the `<pre>` block. Stage headings carry
/// their own anchor markup and pass through untouched.
fn transcript_line(line: &str) -> String {
    let line = line.replace('\r', "");
    if is_heading_line(&line) {
        line
    } else {
        escape_html(&line)
    }
}

/// The whole transcript of a run, preamble first.
pub fn render_transcript(run: &RunState) -> String {
    let mut out = String::new();
    let sources = std::iter::once(run.preamble.as_str())
        .chain(run.stages.iter().map(|stage| stage.output.as_str()));
    for text in sources {
        for line in text.lines() {
            out.push_str(&transcript_line(line));
            out.push('\n');
        }
    }
    out
}

/// Full HTML log: title, table of contents, transcript.
pub fn render_log(run: &RunState) -> String {
    let title = escape_html(&run.title_line());
    let mut out = String::new();

    let _ = writeln!(out, "<html>\n  <head>");
    let _ = writeln!(out, "    <title>{title}</title>");
    let _ = writeln!(out, "    <meta charset=\"utf-8\">");
    let _ = writeln!(out, "    <meta name=\"generator\" content=\"buildfarm\">");
    let _ = writeln!(out, "  </head>\n  <body>");
    let _ = writeln!(out, "    <h1>{title}</h1>");

    let _ = writeln!(out, "    <ul>");
    for stage in &run.stages {
        let suffix = stage
            .toc_suffix()
            .map(|s| format!(" {s}"))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "      <li><a href=\"#{}\">{}</a>{suffix}</li>",
            stage.anchor,
            escape_html(&stage.name)
        );
    }
    let _ = writeln!(out, "    </ul>");

    let _ = writeln!(out, "    <pre>");
    out.push_str(&render_transcript(run));
    let _ = writeln!(out, "    </pre>");
    let _ = writeln!(out, "  </body>\n</html>");
    out
}

/// Diff placeholder linking back to the log file `log_name` (a sibling).
pub fn render_diff(run: &RunState, log_name: &str) -> String {
    let title = escape_html(&run.title_line());
    let mut out = String::new();

    let _ = writeln!(out, "<html>\n  <head>");
    let _ = writeln!(out, "    <title>{title} (diff)</title>");
    let _ = writeln!(out, "    <meta charset=\"utf-8\">");
    let _ = writeln!(out, "  </head>\n  <body>");
    let _ = writeln!(out, "    <h1>{title} (diff)</h1>");
    let _ = writeln!(
        out,
        "    <p>No diff recorded. See the <a href=\"{}\">full log</a>.</p>",
        escape_url(log_name)
    );
    let _ = writeln!(out, "  </body>\n</html>");
    out
}
