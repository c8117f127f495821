//! `{{ key }}` substitution.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Placeholder keys with no value, in order of appearance. Their
    /// placeholders are left in the text unchanged.
    pub unknown: Vec<String>,
}

/// Replace every `{{ key }}` (inner whitespace optional) with its value.
///
/// An unterminated `{{` is copied through as text.
pub fn render(template: &str, values: &BTreeMap<String, String>) -> Rendered {
    let mut text = String::with_capacity(template.len());
    let mut unknown = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        text.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            text.push_str(&rest[open..]);
            return Rendered { text, unknown };
        };
        let key = after[..close].trim();
        match values.get(key) {
            Some(value) => text.push_str(value),
            None => {
                text.push_str(&rest[open..open + 2 + close + 2]);
                unknown.push(key.to_string());
            }
        }
        rest = &after[close + 2..];
    }
    text.push_str(rest);
    Rendered { text, unknown }
}
