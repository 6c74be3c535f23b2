//! Escaping helpers and the stage heading markup shared by the stage runner
//! and the report assembler.

use chrono::{DateTime, Local};

/// Escape text for inclusion in HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_html`].
pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Form-style URL escaping: unreserved characters pass, space becomes `+`,
/// everything else is percent-encoded.
pub fn escape_url(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'*' => {
                out.push(char::from(byte));
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Anchor for a stage name (`_` reads as `-`).
pub fn anchor_for(name: &str) -> String {
    escape_url(&name.replace('_', "-"))
}

/// Heading line opening a stage's transcript.
///
/// ```text
/// <a name="svn%2Fruby">== svn/ruby</a> # 2026-10-18T07:45:12+09:00
/// ```
pub fn heading_line(name: &str, at: DateTime<Local>) -> String {
    let text = escape_html(&name.replace('_', "-"));
    let stamp = at.format("%Y-%m-%dT%H:%M:%S%:z").to_string();
    format!(
        "<a name=\"{}\">== {text}</a> # {}",
        anchor_for(name),
        escape_html(&stamp)
    )
}

/// True for lines written by [`heading_line`]; they pass into the HTML log
/// unescaped.
pub fn is_heading_line(line: &str) -> bool {
    line.starts_with("<a name=\"") && line.contains("\">== ")
}
