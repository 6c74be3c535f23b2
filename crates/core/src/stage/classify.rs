//! Output-driven classification of stage results.

use bf_protocol::stage_models::{CaptureRule, ClassificationRule};
use regex::{Captures, Regex, RegexBuilder};

/// Compile a rule pattern. `^`/`$` anchor at line boundaries.
pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).multi_line(true).build()
}

/// A compiled [`ClassificationRule`].
#[derive(Debug, Clone)]
pub struct Classifier {
    pattern: Regex,
    tag: String,
}

impl Classifier {
    pub fn new(rule: &ClassificationRule) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: compile(&rule.pattern)?,
            tag: rule.tag.clone(),
        })
    }

    /// Scan `output` once; a match yields the formatted failure tag.
    pub fn classify(&self, output: &str) -> Option<String> {
        self.pattern
            .captures(output)
            .map(|caps| format_tag(&self.tag, &caps))
    }
}

/// A compiled [`CaptureRule`].
#[derive(Debug, Clone)]
pub struct Extractor {
    key: String,
    pattern: Regex,
}

impl Extractor {
    pub fn new(rule: &CaptureRule) -> Result<Self, regex::Error> {
        Ok(Self {
            key: rule.key.clone(),
            pattern: compile(&rule.pattern)?,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// First capture group of the first match, trimmed.
    pub fn extract(&self, output: &str) -> Option<String> {
        let caps = self.pattern.captures(output)?;
        let value = caps.get(1)?.as_str().trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}

/// Replace `{N}` in `template` with capture group `N` (empty if unmatched).
fn format_tag(template: &str, caps: &Captures<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}').and_then(|close| {
            after[..close]
                .parse::<usize>()
                .ok()
                .map(|index| (index, close))
        }) {
            Some((index, close)) => {
                out.push_str(caps.get(index).map_or("", |m| m.as_str()));
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
