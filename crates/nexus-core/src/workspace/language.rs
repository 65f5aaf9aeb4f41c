//! Language tags for workspace files and the composition roles derived from
//! them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::NexusError;

/// Role a file plays when the workspace is composed into a preview document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositionRole {
    Markup,
    Stylesheet,
    Script,
    /// Not executable in the preview; ignored by the composer.
    Inert,
}

/// Editor language identifiers. Serialized with the lowercase ids the editor
/// widget uses for syntax highlighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Html,
    Css,
    #[default]
    Javascript,
    Typescript,
    Python,
    Cpp,
    C,
    Csharp,
    Java,
    Kotlin,
    Swift,
    Go,
    Rust,
    Ruby,
    Php,
    Lua,
    Dart,
    Sql,
    Shell,
    Json,
    Yaml,
    Xml,
    Markdown,
    Scss,
    Plaintext,
}

impl Language {
    pub const ALL: [Language; 25] = [
        Language::Html,
        Language::Css,
        Language::Javascript,
        Language::Typescript,
        Language::Python,
        Language::Cpp,
        Language::C,
        Language::Csharp,
        Language::Java,
        Language::Kotlin,
        Language::Swift,
        Language::Go,
        Language::Rust,
        Language::Ruby,
        Language::Php,
        Language::Lua,
        Language::Dart,
        Language::Sql,
        Language::Shell,
        Language::Json,
        Language::Yaml,
        Language::Xml,
        Language::Markdown,
        Language::Scss,
        Language::Plaintext,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Language::Html => "html",
            Language::Css => "css",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Python => "python",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Csharp => "csharp",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Swift => "swift",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Lua => "lua",
            Language::Dart => "dart",
            Language::Sql => "sql",
            Language::Shell => "shell",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Xml => "xml",
            Language::Markdown => "markdown",
            Language::Scss => "scss",
            Language::Plaintext => "plaintext",
        }
    }

    /// Human readable name shown in the language picker.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Html => "HTML",
            Language::Css => "CSS",
            Language::Javascript => "JavaScript",
            Language::Typescript => "TypeScript",
            Language::Python => "Python",
            Language::Cpp => "C++",
            Language::C => "C",
            Language::Csharp => "C#",
            Language::Java => "Java",
            Language::Kotlin => "Kotlin",
            Language::Swift => "Swift",
            Language::Go => "Go",
            Language::Rust => "Rust",
            Language::Ruby => "Ruby",
            Language::Php => "PHP",
            Language::Lua => "Lua",
            Language::Dart => "Dart",
            Language::Sql => "SQL",
            Language::Shell => "Shell",
            Language::Json => "JSON",
            Language::Yaml => "YAML",
            Language::Xml => "XML",
            Language::Markdown => "Markdown",
            Language::Scss => "SCSS",
            Language::Plaintext => "Plain Text",
        }
    }

    /// Only plain HTML, CSS and JavaScript run in the preview sandbox without a
    /// build step; everything else is inert.
    pub fn role(&self) -> CompositionRole {
        match self {
            Language::Html => CompositionRole::Markup,
            Language::Css => CompositionRole::Stylesheet,
            Language::Javascript => CompositionRole::Script,
            _ => CompositionRole::Inert,
        }
    }

    /// Infers a language from a file name's extension.
    pub fn from_file_name(name: &str) -> Option<Language> {
        let (_, extension) = name.rsplit_once('.')?;
        Self::from_extension(extension)
    }

    /// Maps a bare extension such as `py` or `yml`, case-insensitively.
    pub fn from_extension(extension: &str) -> Option<Language> {
        let language = match extension.to_ascii_lowercase().as_str() {
            "html" | "htm" => Language::Html,
            "css" => Language::Css,
            "js" | "mjs" | "cjs" => Language::Javascript,
            "ts" | "tsx" => Language::Typescript,
            "py" => Language::Python,
            "cpp" | "cc" | "cxx" | "hpp" => Language::Cpp,
            "c" | "h" => Language::C,
            "cs" => Language::Csharp,
            "java" => Language::Java,
            "kt" | "kts" => Language::Kotlin,
            "swift" => Language::Swift,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "lua" => Language::Lua,
            "dart" => Language::Dart,
            "sql" => Language::Sql,
            "sh" | "bash" | "zsh" => Language::Shell,
            "json" => Language::Json,
            "yaml" | "yml" => Language::Yaml,
            "xml" | "svg" => Language::Xml,
            "md" | "markdown" => Language::Markdown,
            "scss" => Language::Scss,
            "txt" => Language::Plaintext,
            _ => return None,
        };
        Some(language)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Language {
    type Err = NexusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        // Aliases the model tends to answer with in voice command interpretation.
        let needle = match needle.as_str() {
            "js" => "javascript",
            "ts" => "typescript",
            "c++" => "cpp",
            "c#" => "csharp",
            "bash" | "sh" => "shell",
            "text" | "txt" => "plaintext",
            other => other,
        };
        Language::ALL
            .iter()
            .copied()
            .find(|language| language.id() == needle)
            .or_else(|| Language::from_extension(needle))
            .ok_or_else(|| NexusError::ParsingError(format!("Unknown language '{}'", s)))
    }
}
