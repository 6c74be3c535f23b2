//! `{name}` placeholder expansion for stage command templates.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder `{{{0}}}` in `{1}`")]
    UnknownPlaceholder(String, String),

    #[error("unterminated placeholder in `{0}`")]
    Unterminated(String),
}

/// Variables available to command templates.
pub type TemplateVars = BTreeMap<String, String>;

/// Expand every `{name}` in `template`. `{{` and `}}` are literal braces.
pub fn expand(template: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("{{") {
            out.push('{');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("}}") {
            out.push('}');
            rest = after;
        } else if let Some(after) = tail.strip_prefix('{') {
            let end = after
                .find('}')
                .ok_or_else(|| TemplateError::Unterminated(template.to_string()))?;
            let key = &after[..end];
            let value = vars.get(key).ok_or_else(|| {
                TemplateError::UnknownPlaceholder(key.to_string(), template.to_string())
            })?;
            out.push_str(value);
            rest = &after[end + 1..];
        } else {
            // lone '}'
            out.push('}');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Expand each argument of an argv template.
pub fn expand_argv(argv: &[String], vars: &TemplateVars) -> Result<Vec<String>, TemplateError> {
    argv.iter().map(|arg| expand(arg, vars)).collect()
}
