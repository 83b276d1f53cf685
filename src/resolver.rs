//! Content resolution: the multi-source fallback at the heart of every
//! artifact request.
//!
//! Given an authorized session and a normalized path, decides among local
//! file, directory listing, synthesized metadata and proxy fetch, in that
//! order. Writes (deploys) are a separate contract gated on write intent.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use crate::auth::scope_covers;
use crate::error::{AppError, Result};
use crate::maven::{self, metadata, split_checksum_path, RepositoryPath};
use crate::models::file_details::FileDetails;
use crate::models::repository::Repository;
use crate::models::token::Session;
use crate::proxy::ProxyFetcher;

/// Terminal outcome of a successful resolution.
#[derive(Debug)]
pub enum ResolvedContent {
    /// A leaf artifact: details plus its bytes
    File {
        details: FileDetails,
        content: Bytes,
    },
    /// A synthesized document (metadata XML, computed checksum)
    Document {
        content: String,
        content_type: &'static str,
    },
    /// A directory listing, directories first then lexicographic
    Listing(Vec<FileDetails>),
}

/// Resolves authorized paths to content.
pub struct ContentResolver {
    proxy: Arc<ProxyFetcher>,
}

impl ContentResolver {
    pub fn new(proxy: Arc<ProxyFetcher>) -> Self {
        Self { proxy }
    }

    /// Resolve a path inside a repository to content.
    ///
    /// The path has already passed normalization ([`RepositoryPath::parse`]
    /// rejects traversal segments before any storage access) and the
    /// session has been authorized for it.
    pub async fn resolve(
        &self,
        repository: &Arc<Repository>,
        path: &RepositoryPath,
    ) -> Result<ResolvedContent> {
        let local = repository.storage_root.join(&path.relative_path);

        if path.is_metadata {
            if let Some(document) = self.synthesize_metadata(path, &local).await? {
                return Ok(document);
            }
            // No local version data; a proxied upstream may still have it
        }

        if let Some(document) = self.resolve_checksum(repository, path).await? {
            return Ok(document);
        }

        match tokio::fs::metadata(&local).await {
            Ok(metadata) if metadata.is_file() => {
                let content = tokio::fs::read(&local).await?;
                let name = path.file_name().unwrap_or_default().to_string();
                return Ok(ResolvedContent::File {
                    details: FileDetails::from_metadata(name, &metadata),
                    content: Bytes::from(content),
                });
            }
            Ok(metadata) if metadata.is_dir() => {
                return Ok(ResolvedContent::Listing(self.list_directory(&local).await?));
            }
            _ => {}
        }

        if !repository.proxies.is_empty() {
            let (details, content) = self
                .proxy
                .fetch(Arc::clone(repository), path.relative_path.clone())
                .await?;
            return Ok(ResolvedContent::File { details, content });
        }

        Err(AppError::NotFound(path.scoped()))
    }

    /// Deploy an artifact. Requires a session whose scope covers the path
    /// with write intent; release artifacts are immutable once published.
    pub async fn store(
        &self,
        session: &Session,
        repository: &Arc<Repository>,
        path: &RepositoryPath,
        content: Bytes,
    ) -> Result<FileDetails> {
        if !session.can_write || !scope_covers(&session.scope_prefix, &path.scoped()) {
            return Err(AppError::Forbidden(
                "Deployment requires a write token covering this path".to_string(),
            ));
        }
        if path.is_directory || path.file_name().is_none() {
            return Err(AppError::InvalidPath(
                "Cannot deploy to a directory path".to_string(),
            ));
        }

        let target = repository.storage_root.join(&path.relative_path);
        let exists = tokio::fs::try_exists(&target).await?;
        // Immutability applies to release artifacts only. Metadata and
        // checksum files are refreshed by the client on every deploy
        let refreshable =
            path.is_metadata || split_checksum_path(&path.relative_path).is_some();
        if exists && !refreshable && !Repository::is_snapshot_path(&path.relative_path) {
            return Err(AppError::Conflict(format!(
                "Release artifact already exists: {}",
                path.scoped()
            )));
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = target.with_extension(format!("part-{}", Uuid::new_v4()));
        tokio::fs::write(&tmp, &content).await?;
        tokio::fs::rename(&tmp, &target).await?;

        tracing::info!(
            path = %path.scoped(),
            bytes = content.len(),
            alias = %session.alias,
            "Artifact deployed"
        );
        FileDetails::from_path(&target).await
    }

    /// Synthesize a metadata document when local version data exists.
    ///
    /// A version directory ending in `-SNAPSHOT` produces the
    /// `<snapshotVersions>` document; otherwise a physically deployed
    /// metadata file wins, and failing that the version list is
    /// synthesized at the artifact level.
    async fn synthesize_metadata(
        &self,
        path: &RepositoryPath,
        local: &PathBuf,
    ) -> Result<Option<ResolvedContent>> {
        let segments: Vec<&str> = path.relative_path.split('/').collect();
        // Strip the trailing maven-metadata.xml segment
        let coordinate = &segments[..segments.len() - 1];
        let dir = match local.parent() {
            Some(d) => d.to_path_buf(),
            None => return Ok(None),
        };

        if !tokio::fs::try_exists(&dir).await? {
            return Ok(None);
        }

        let document = if coordinate
            .last()
            .map(|v| v.ends_with("-SNAPSHOT"))
            .unwrap_or(false)
        {
            // Too few segments to name group/artifact/version; same generic
            // shape as any other unservable read
            if coordinate.len() < 3 {
                return Err(AppError::NotFound(path.scoped()));
            }
            let version = coordinate[coordinate.len() - 1];
            let artifact_id = coordinate[coordinate.len() - 2];
            let group_id = coordinate[..coordinate.len() - 2].join(".");
            metadata::synthesize_version(&dir, &group_id, artifact_id, version).await?
        } else {
            // A deployed metadata file takes precedence for release artifacts
            if tokio::fs::try_exists(local).await? {
                return Ok(None);
            }
            if coordinate.len() < 2 {
                return Err(AppError::NotFound(path.scoped()));
            }
            let artifact_id = coordinate[coordinate.len() - 1];
            let group_id = coordinate[..coordinate.len() - 1].join(".");
            metadata::synthesize_artifact(&dir, &group_id, artifact_id).await?
        };

        Ok(Some(ResolvedContent::Document {
            content: document,
            content_type: "application/xml",
        }))
    }

    /// Answer checksum requests for locally present artifacts.
    ///
    /// A checksum file deployed alongside the artifact wins; otherwise the
    /// digest is computed from the artifact itself, or from the synthesized
    /// document when the base is a metadata file.
    async fn resolve_checksum(
        &self,
        repository: &Arc<Repository>,
        path: &RepositoryPath,
    ) -> Result<Option<ResolvedContent>> {
        let Some((base, kind)) = split_checksum_path(&path.relative_path) else {
            return Ok(None);
        };

        let checksum_file = repository.storage_root.join(&path.relative_path);
        if tokio::fs::try_exists(&checksum_file).await? {
            // Served through the regular local-file branch
            return Ok(None);
        }

        let base_file = repository.storage_root.join(base);
        match tokio::fs::metadata(&base_file).await {
            Ok(m) if m.is_file() => {
                let content = tokio::fs::read(&base_file).await?;
                Ok(Some(ResolvedContent::Document {
                    content: kind.digest(&content),
                    content_type: "text/plain",
                }))
            }
            _ => {
                // Snapshot resolution also asks for checksums of metadata
                // documents that only exist synthesized
                let base_path = RepositoryPath::parse(&path.repository, base)?;
                if !base_path.is_metadata {
                    return Ok(None);
                }
                match self.synthesize_metadata(&base_path, &base_file).await? {
                    Some(ResolvedContent::Document { content, .. }) => {
                        Ok(Some(ResolvedContent::Document {
                            content: kind.digest(content.as_bytes()),
                            content_type: "text/plain",
                        }))
                    }
                    _ => Ok(None),
                }
            }
        }
    }

    /// Sorted listing of a directory: directories first, then files,
    /// lexicographic within each group.
    async fn list_directory(&self, dir: &PathBuf) -> Result<Vec<FileDetails>> {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Leftover temp files from interrupted writes stay hidden
            if name.contains(".part-") {
                continue;
            }
            let metadata = entry.metadata().await?;
            entries.push(FileDetails::from_metadata(name, &metadata));
        }
        entries.sort_by(FileDetails::listing_order);
        Ok(entries)
    }
}

/// Content type for a resolved file path.
pub fn response_content_type(path: &RepositoryPath) -> &'static str {
    if path.is_metadata {
        "application/xml"
    } else {
        maven::content_type_for(&path.relative_path)
    }
}
