//! Preview composition.
//!
//! Files are classified by [`Language::role`]: the first markup file becomes
//! the document body, stylesheets and scripts are concatenated in workspace
//! order. Script order is observable (globals, declaration order) so it is
//! never changed. Content is inlined verbatim; nothing is parsed or escaped.

use std::fmt;

use super::language::CompositionRole;
use super::{FileId, VirtualFile};

/// A single self-contained document ready for the sandboxed preview host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedDocument {
    pub html: String,
    /// File used as the document body, if any markup file exists.
    pub markup: Option<FileId>,
    pub stylesheets: Vec<FileId>,
    pub scripts: Vec<FileId>,
    /// Markup files after the first one; they do not reach the document.
    pub ignored_markup: Vec<FileId>,
}

impl ComposedDocument {
    pub fn as_str(&self) -> &str {
        &self.html
    }
}

impl fmt::Display for ComposedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.html)
    }
}

/// Composes files into one HTML document. Pure and deterministic: the same
/// files in the same order always produce byte-identical output.
pub fn compose(files: &[VirtualFile]) -> ComposedDocument {
    let mut markup: Option<&VirtualFile> = None;
    let mut ignored_markup = Vec::new();
    let mut stylesheets: Vec<&VirtualFile> = Vec::new();
    let mut scripts: Vec<&VirtualFile> = Vec::new();

    for file in files {
        match file.language.role() {
            CompositionRole::Markup => {
                if markup.is_none() {
                    markup = Some(file);
                } else {
                    ignored_markup.push(file.id);
                }
            }
            CompositionRole::Stylesheet => stylesheets.push(file),
            CompositionRole::Script => scripts.push(file),
            CompositionRole::Inert => {}
        }
    }

    if !ignored_markup.is_empty() {
        log::debug!(
            "Composing with markup from {:?}, ignoring additional markup files {:?}",
            markup.map(|file| file.id),
            ignored_markup
        );
    }

    let style_text = join_contents(&stylesheets);
    let script_text = join_contents(&scripts);
    let body_text = markup.map(|file| file.content.as_str()).unwrap_or("");

    let mut html = String::with_capacity(style_text.len() + script_text.len() + body_text.len() + 128);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<style>\n");
    html.push_str(&style_text);
    html.push_str("\n</style>\n</head>\n<body>\n");
    html.push_str(body_text);
    html.push_str("\n</body>\n<script>\n");
    html.push_str(&script_text);
    html.push_str("\n</script>\n</html>\n");

    ComposedDocument {
        html,
        markup: markup.map(|file| file.id),
        stylesheets: stylesheets.iter().map(|file| file.id).collect(),
        scripts: scripts.iter().map(|file| file.id).collect(),
        ignored_markup,
    }
}

fn join_contents(files: &[&VirtualFile]) -> String {
    files
        .iter()
        .map(|file| file.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
