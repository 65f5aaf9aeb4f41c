//! In-memory virtual workspace.
//!
//! A workspace is an ordered, never-empty sequence of [`VirtualFile`]s with
//! exactly one active file. All operations are plain state transitions with no
//! UI coupling; failures are reported as [`NexusError`] values and leave the
//! workspace untouched.

pub mod composer;
pub mod language;

pub use composer::{compose, ComposedDocument};
pub use language::{CompositionRole, Language};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::WorkspaceConfig;
use crate::errors::NexusError;

/// Stable handle of a workspace file. Ids are issued in increasing order and
/// never reused, even after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualFile {
    pub id: FileId,
    pub name: String,
    pub language: Language,
    pub content: String,
}

const WELCOME_FILE_NAME: &str = "main.js";
const WELCOME_CONTENT: &str =
    "// Start coding or use AI to generate...\nconsole.log(\"Welcome to Nexus Forge\");";

#[derive(Debug, Clone)]
pub struct Workspace {
    files: Vec<VirtualFile>,
    active: FileId,
    next_id: u64,
    defaults: WorkspaceConfig,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    /// Creates a workspace holding the welcome file.
    pub fn new() -> Self {
        Self::with_config(WorkspaceConfig::default())
    }

    /// Creates a workspace holding the welcome file; files created later use
    /// the configured defaults.
    pub fn with_config(defaults: WorkspaceConfig) -> Self {
        let welcome = VirtualFile {
            id: FileId(1),
            name: WELCOME_FILE_NAME.to_string(),
            language: Language::Javascript,
            content: WELCOME_CONTENT.to_string(),
        };
        Self {
            files: vec![welcome],
            active: FileId(1),
            next_id: 2,
            defaults,
        }
    }

    /// Builds a workspace from `(name, language, content)` entries in order.
    /// The first entry becomes active.
    pub fn from_files<I, N, C>(entries: I) -> Result<Self, NexusError>
    where
        I: IntoIterator<Item = (N, Language, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        let files: Vec<VirtualFile> = entries
            .into_iter()
            .enumerate()
            .map(|(index, (name, language, content))| VirtualFile {
                id: FileId(index as u64 + 1),
                name: name.into(),
                language,
                content: content.into(),
            })
            .collect();

        let first = files.first().ok_or(NexusError::EmptyWorkspace)?.id;
        let next_id = files.len() as u64 + 1;
        Ok(Self {
            files,
            active: first,
            next_id,
            defaults: WorkspaceConfig::default(),
        })
    }

    pub fn files(&self) -> &[VirtualFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Always false: the workspace keeps at least one file.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, id: FileId) -> Option<&VirtualFile> {
        self.files.iter().find(|file| file.id == id)
    }

    pub fn active_id(&self) -> FileId {
        self.active
    }

    pub fn active(&self) -> &VirtualFile {
        // The active id is kept pointing at an existing file by every mutation.
        self.get(self.active).unwrap_or(&self.files[0])
    }

    pub fn set_active(&mut self, id: FileId) -> Result<(), NexusError> {
        self.position(id)?;
        self.active = id;
        Ok(())
    }

    /// Appends a file with the default name, language and placeholder content
    /// and makes it active.
    pub fn create_file(&mut self) -> &VirtualFile {
        let id = FileId(self.next_id);
        let name = format!("untitled-{}.{}", id.0, default_extension(self.defaults.default_language));
        let language = self.defaults.default_language;
        let content = self.defaults.placeholder_content.clone();
        self.push_file(id, name, language, content)
    }

    /// Appends a file with explicit fields and makes it active.
    pub fn create_file_with(
        &mut self,
        name: impl Into<String>,
        language: Language,
        content: impl Into<String>,
    ) -> &VirtualFile {
        let id = FileId(self.next_id);
        self.push_file(id, name.into(), language, content.into())
    }

    fn push_file(&mut self, id: FileId, name: String, language: Language, content: String) -> &VirtualFile {
        self.next_id += 1;
        log::debug!("Creating {} '{}' ({})", id, name, language);
        self.files.push(VirtualFile {
            id,
            name,
            language,
            content,
        });
        self.active = id;
        let last = self.files.len() - 1;
        &self.files[last]
    }

    /// Removes a file. The last remaining file cannot be deleted; deleting the
    /// active file activates the first remaining one.
    pub fn delete_file(&mut self, id: FileId) -> Result<VirtualFile, NexusError> {
        let index = self.position(id)?;
        if self.files.len() == 1 {
            log::warn!("Refusing to delete {}: it is the last file", id);
            return Err(NexusError::LastFile(id));
        }

        let removed = self.files.remove(index);
        if self.active == id {
            self.active = self.files[0].id;
        }
        log::debug!("Deleted {} '{}', active is now {}", id, removed.name, self.active);
        Ok(removed)
    }

    pub fn rename_file(&mut self, id: FileId, name: impl Into<String>) -> Result<(), NexusError> {
        self.file_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_language(&mut self, id: FileId, language: Language) -> Result<(), NexusError> {
        self.file_mut(id)?.language = language;
        Ok(())
    }

    pub fn set_content(&mut self, id: FileId, content: impl Into<String>) -> Result<(), NexusError> {
        self.file_mut(id)?.content = content.into();
        Ok(())
    }

    /// Composes every file into one preview document. See [`compose`].
    pub fn compose(&self) -> ComposedDocument {
        compose(&self.files)
    }

    fn position(&self, id: FileId) -> Result<usize, NexusError> {
        self.files
            .iter()
            .position(|file| file.id == id)
            .ok_or(NexusError::FileNotFound(id))
    }

    fn file_mut(&mut self, id: FileId) -> Result<&mut VirtualFile, NexusError> {
        self.files
            .iter_mut()
            .find(|file| file.id == id)
            .ok_or(NexusError::FileNotFound(id))
    }
}

fn default_extension(language: Language) -> &'static str {
    match language {
        Language::Html => "html",
        Language::Css => "css",
        Language::Javascript => "js",
        Language::Typescript => "ts",
        Language::Python => "py",
        Language::Cpp => "cpp",
        Language::C => "c",
        Language::Csharp => "cs",
        Language::Java => "java",
        Language::Kotlin => "kt",
        Language::Swift => "swift",
        Language::Go => "go",
        Language::Rust => "rs",
        Language::Ruby => "rb",
        Language::Php => "php",
        Language::Lua => "lua",
        Language::Dart => "dart",
        Language::Sql => "sql",
        Language::Shell => "sh",
        Language::Json => "json",
        Language::Yaml => "yaml",
        Language::Xml => "xml",
        Language::Markdown => "md",
        Language::Scss => "scss",
        Language::Plaintext => "txt",
    }
}
