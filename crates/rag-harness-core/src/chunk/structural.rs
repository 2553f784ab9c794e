//! Structural chunker for WDL workflow-definition files.
//!
//! Emits, in order:
//!
//! 1. every `import` line, joined into a single `imports` fragment;
//! 2. one fragment per `task`, `workflow`, or `struct` element, spanning
//!    from the keyword to the brace that closes the element's body;
//! 3. if nothing above was found, the whole file as a `full_file` fragment.
//!
//! # Known limitation
//!
//! Brace matching is purely lexical. Braces inside string literals,
//! `command <<< >>>` heredocs, or `#` comments are counted like any other
//! brace, so an element whose body contains an unbalanced brace in a string
//! ends early or, when the count never returns to zero, is dropped.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{keys, MetaValue, Metadata};

fn element_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(task|workflow|struct)\s+(\w+)\s*\{").expect("element pattern is valid")
    })
}

/// Parser for the brace-delimited WDL element syntax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkflowParser;

impl WorkflowParser {
    /// Split `content` into `(text, extra metadata)` pairs.
    pub fn parse(&self, content: &str) -> Vec<(String, Metadata)> {
        let mut out = Vec::new();

        let imports: Vec<&str> = content
            .lines()
            .filter(|line| line.trim_start().starts_with("import"))
            .collect();
        if !imports.is_empty() {
            out.push((imports.join("\n"), tags("imports", "imports", None)));
        }

        for caps in element_pattern().captures_iter(content) {
            let (Some(whole), Some(kind), Some(name)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            match extract_block(content, whole.start()) {
                Some(block) => out.push((
                    block.to_string(),
                    tags(kind.as_str(), kind.as_str(), Some(name.as_str())),
                )),
                None => tracing::debug!(
                    element = kind.as_str(),
                    name = name.as_str(),
                    "unbalanced braces, element skipped"
                ),
            }
        }

        if out.is_empty() && !content.trim().is_empty() {
            out.push((content.to_string(), tags("full_file", "", None)));
        }

        out
    }
}

fn tags(chunk_type: &str, element_type: &str, element_name: Option<&str>) -> Metadata {
    let mut m = Metadata::new();
    m.insert(keys::CHUNK_TYPE.into(), MetaValue::from(chunk_type));
    if !element_type.is_empty() {
        m.insert(keys::ELEMENT_TYPE.into(), MetaValue::from(element_type));
    }
    if let Some(name) = element_name {
        m.insert(keys::ELEMENT_NAME.into(), MetaValue::from(name));
    }
    m
}

/// Return the slice from `start` through the brace that brings the depth
/// counter back to zero, or `None` if it never does.
pub fn extract_block(content: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut entered = false;

    for (offset, ch) in content[start..].char_indices() {
        match ch {
            '{' => {
                depth += 1;
                entered = true;
            }
            '}' if entered => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&content[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}
