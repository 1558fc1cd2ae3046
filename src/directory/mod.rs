//! Project directory tree.
//!
//! Every project record embeds one folder/file tree rooted at `"root"`. The
//! tree is small and fully materialized: callers read it whole, mutate it in
//! memory through the operations below, and write it back whole.
//!
//! A node is addressed by an explicit path of folder names from the root.
//! Resolution stops at the first segment without a matching child folder and
//! reports it, so no mutation happens on a partially resolved path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub const ROOT_NAME: &str = "root";

/// Errors from directory tree operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Folder '{segment}' not found")]
    PathNotFound { segment: String, depth: usize },

    #[error("Folder '{0}' already exists")]
    AlreadyExists(String),

    #[error("Folder '{0}' not found")]
    FolderNotFound(String),

    #[error("Invalid folder name: {0}")]
    InvalidName(String),
}

/// A folder node. The root of a project directory is a folder named `root`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// The whole tree attached to a project.
pub type Directory = Folder;

/// File metadata record. The object itself lives in the blob store under `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
    pub key: String,
}

/// Result of removing file metadata by storage key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Number of entries removed (duplicates share a key)
    Removed(usize),
    /// No entry carried the key; the caller already deleted the blob
    NotInMetadata,
}

impl Folder {
    /// Empty root folder, as created with a new project
    pub fn root() -> Self {
        Self {
            name: ROOT_NAME.to_string(),
            created_at: None,
            folders: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created_at: Some(created_at),
            folders: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn child(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name == name)
    }

    /// Walk `path` from this node down through child folders.
    pub fn resolve<S: AsRef<str>>(&self, path: &[S]) -> Result<&Folder, DirectoryError> {
        let mut node = self;
        for (depth, segment) in path.iter().enumerate() {
            let segment = segment.as_ref();
            node = node
                .folders
                .iter()
                .find(|f| f.name == segment)
                .ok_or_else(|| DirectoryError::PathNotFound {
                    segment: segment.to_string(),
                    depth,
                })?;
        }
        Ok(node)
    }

    pub fn resolve_mut<S: AsRef<str>>(
        &mut self,
        path: &[S],
    ) -> Result<&mut Folder, DirectoryError> {
        let mut node = self;
        for (depth, segment) in path.iter().enumerate() {
            let segment = segment.as_ref();
            node = node
                .folders
                .iter_mut()
                .find(|f| f.name == segment)
                .ok_or_else(|| DirectoryError::PathNotFound {
                    segment: segment.to_string(),
                    depth,
                })?;
        }
        Ok(node)
    }

    /// Append an empty folder `name` under the node at `path`.
    pub fn create_folder<S: AsRef<str>>(
        &mut self,
        path: &[S],
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<&Folder, DirectoryError> {
        validate_folder_name(name)?;

        let parent = self.resolve_mut(path)?;
        if parent.folders.iter().any(|f| f.name == name) {
            return Err(DirectoryError::AlreadyExists(name.to_string()));
        }

        parent.folders.push(Folder::new(name, now));
        Ok(&parent.folders[parent.folders.len() - 1])
    }

    /// Detach folder `name` from the node at `path`.
    ///
    /// Returns every file in the removed subtree so the caller can delete the
    /// backing objects.
    pub fn delete_folder<S: AsRef<str>>(
        &mut self,
        path: &[S],
        name: &str,
    ) -> Result<Vec<FileEntry>, DirectoryError> {
        let parent = self.resolve_mut(path)?;
        let index = parent
            .folders
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| DirectoryError::FolderNotFound(name.to_string()))?;

        let removed = parent.folders.remove(index);
        Ok(removed.collect_files())
    }

    /// Append file metadata to the node at `path`. Names are not required to
    /// be unique.
    pub fn add_file<S: AsRef<str>>(
        &mut self,
        path: &[S],
        entry: FileEntry,
    ) -> Result<&FileEntry, DirectoryError> {
        let target = self.resolve_mut(path)?;
        target.files.push(entry);
        Ok(&target.files[target.files.len() - 1])
    }

    /// Drop every file entry at `path` whose storage key equals `key`.
    pub fn remove_file<S: AsRef<str>>(
        &mut self,
        path: &[S],
        key: &str,
    ) -> Result<RemoveOutcome, DirectoryError> {
        let target = self.resolve_mut(path)?;
        let before = target.files.len();
        target.files.retain(|f| f.key != key);

        match before - target.files.len() {
            0 => Ok(RemoveOutcome::NotInMetadata),
            n => Ok(RemoveOutcome::Removed(n)),
        }
    }

    /// Depth-first list of every file in this subtree: own files first, then
    /// each child folder in order.
    pub fn collect_files(&self) -> Vec<FileEntry> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<FileEntry>) {
        out.extend(self.files.iter().cloned());
        for folder in &self.folders {
            folder.collect_into(out);
        }
    }

    /// True when any file in this subtree is stored under `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.files.iter().any(|f| f.key == key) || self.folders.iter().any(|f| f.contains_key(key))
    }

    pub fn folder_count(&self) -> usize {
        self.folders.iter().map(|f| 1 + f.folder_count()).sum()
    }
}

impl Default for Folder {
    fn default() -> Self {
        Self::root()
    }
}

fn validate_folder_name(name: &str) -> Result<(), DirectoryError> {
    if name.trim().is_empty() {
        return Err(DirectoryError::InvalidName("name must not be empty".to_string()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(DirectoryError::InvalidName(format!(
            "'{}' must not contain path separators",
            name
        )));
    }
    Ok(())
}

// Clients send sizes both as numbers and as preformatted strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
