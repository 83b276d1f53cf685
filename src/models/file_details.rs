//! Resolved node description used for artifact responses and listings.

use std::cmp::Ordering;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// Node kind. Directories order before files in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    Directory,
    File,
}

/// Describes one resolved node: a leaf artifact or a listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct FileDetails {
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    /// Size in bytes; 0 for directories
    pub content_length: u64,
    pub last_modified: DateTime<Utc>,
}

impl FileDetails {
    /// Build details from filesystem metadata.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_metadata(name, &metadata))
    }

    /// Build details from an already-fetched metadata record.
    pub fn from_metadata(name: String, metadata: &std::fs::Metadata) -> Self {
        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Self {
            name,
            file_type: if metadata.is_dir() {
                FileType::Directory
            } else {
                FileType::File
            },
            content_length: if metadata.is_dir() { 0 } else { metadata.len() },
            last_modified,
        }
    }

    /// In-memory node, used when content was produced rather than read from
    /// disk (proxy fetches, synthesized documents).
    pub fn in_memory(name: String, content_length: u64) -> Self {
        Self {
            name,
            file_type: FileType::File,
            content_length,
            last_modified: Utc::now(),
        }
    }

    /// Listing order: directories before files, then lexicographic by name.
    pub fn listing_order(a: &FileDetails, b: &FileDetails) -> Ordering {
        a.file_type
            .cmp(&b.file_type)
            .then_with(|| a.name.cmp(&b.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> FileDetails {
        FileDetails {
            name: name.to_string(),
            file_type: FileType::File,
            content_length: 10,
            last_modified: Utc::now(),
        }
    }

    fn dir(name: &str) -> FileDetails {
        FileDetails {
            name: name.to_string(),
            file_type: FileType::Directory,
            content_length: 0,
            last_modified: Utc::now(),
        }
    }

    #[test]
    fn test_directories_sort_before_files() {
        let mut entries = vec![file("app-1.0.jar"), dir("1.0.1"), file("app-1.0.pom")];
        entries.sort_by(FileDetails::listing_order);
        assert_eq!(entries[0].name, "1.0.1");
        assert_eq!(entries[1].name, "app-1.0.jar");
        assert_eq!(entries[2].name, "app-1.0.pom");
    }

    #[test]
    fn test_same_type_sorts_lexicographically() {
        let mut entries = vec![dir("beta"), dir("alpha"), file("z.jar"), file("a.jar")];
        entries.sort_by(FileDetails::listing_order);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "a.jar", "z.jar"]);
    }

    #[test]
    fn test_serialized_type_is_uppercase() {
        let json = serde_json::to_string(&dir("1.0")).unwrap();
        assert!(json.contains("\"DIRECTORY\""));
    }
}
