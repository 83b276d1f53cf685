//! Maven 2 repository layout: path normalization, snapshot filename
//! parsing, checksum handling and content types.

pub mod metadata;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

/// Standard Maven metadata filename
pub const MAVEN_METADATA: &str = "maven-metadata.xml";

/// Normalized representation of a request target inside one repository.
#[derive(Debug, Clone)]
pub struct RepositoryPath {
    /// Repository the path belongs to
    pub repository: String,
    /// Slash-segmented path relative to the repository root, no leading slash
    pub relative_path: String,
    /// True when the final segment is the Maven metadata filename
    pub is_metadata: bool,
    /// True when the path names a listing rather than a leaf artifact
    pub is_directory: bool,
}

impl RepositoryPath {
    /// Parse and normalize a raw request path.
    ///
    /// `.` and `..` segments, backslashes and embedded NULs are rejected
    /// before any storage access. This is a security invariant: traversal
    /// attempts must never reach the filesystem layer.
    pub fn parse(repository: &str, raw: &str) -> Result<Self> {
        if raw.contains('\\') || raw.contains('\0') {
            return Err(AppError::InvalidPath(
                "Path contains forbidden characters".to_string(),
            ));
        }

        let is_directory = raw.is_empty() || raw.ends_with('/');

        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                // Collapsed separators produce empty segments; harmless
                "" => continue,
                "." | ".." => {
                    return Err(AppError::InvalidPath(
                        "Path traversal segment rejected".to_string(),
                    ));
                }
                other => segments.push(other),
            }
        }

        let relative_path = segments.join("/");
        let is_metadata = segments.last().map(|s| *s == MAVEN_METADATA).unwrap_or(false);

        Ok(Self {
            repository: repository.to_string(),
            relative_path,
            is_metadata,
            is_directory,
        })
    }

    /// Scoped form used for token authorization: `/{repository}/{path}`.
    pub fn scoped(&self) -> String {
        if self.relative_path.is_empty() {
            format!("/{}", self.repository)
        } else {
            format!("/{}/{}", self.repository, self.relative_path)
        }
    }

    /// Final path segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.relative_path.rsplit('/').next().filter(|s| !s.is_empty())
    }
}

/// Checksum flavors Maven clients request alongside artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    Md5,
    Sha1,
    Sha256,
}

impl ChecksumKind {
    /// File extension used for this checksum kind.
    pub fn extension(&self) -> &'static str {
        match self {
            ChecksumKind::Md5 => "md5",
            ChecksumKind::Sha1 => "sha1",
            ChecksumKind::Sha256 => "sha256",
        }
    }

    /// Hex digest of the given content.
    pub fn digest(&self, content: &[u8]) -> String {
        match self {
            ChecksumKind::Md5 => format!("{:x}", Md5::digest(content)),
            ChecksumKind::Sha1 => format!("{:x}", Sha1::digest(content)),
            ChecksumKind::Sha256 => format!("{:x}", Sha256::digest(content)),
        }
    }
}

/// Split a checksum request into the base artifact path and checksum kind.
///
/// Returns `None` when the path is not a checksum request.
pub fn split_checksum_path(path: &str) -> Option<(&str, ChecksumKind)> {
    let (base, ext) = path.rsplit_once('.')?;
    let kind = match ext {
        "md5" => ChecksumKind::Md5,
        "sha1" => ChecksumKind::Sha1,
        "sha256" => ChecksumKind::Sha256,
        _ => return None,
    };
    Some((base, kind))
}

/// One artifact file inside a version directory, as understood for
/// snapshot metadata synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub extension: String,
    pub classifier: Option<String>,
    /// Timestamp portion for timestamp-resolved files, e.g. "20210101.120000"
    pub timestamp: Option<String>,
    /// Build number for timestamp-resolved files
    pub build_number: Option<u32>,
}

/// Parse a filename inside `artifact_id/version/` into its snapshot parts.
///
/// Accepts both the literal `-SNAPSHOT` form and the timestamp-resolved
/// form Maven produces on deploy:
///   app-1.0.0-SNAPSHOT.jar
///   app-1.0.0-20210101.120000-3.jar
///   app-1.0.0-20210101.120000-3-sources.jar
///
/// Returns `None` for metadata/checksum files and anything that does not
/// match the expected coordinate prefix.
pub fn parse_snapshot_file(filename: &str, artifact_id: &str, version: &str) -> Option<SnapshotFile> {
    if filename == MAVEN_METADATA || split_checksum_path(filename).is_some() {
        return None;
    }

    let base_version = version.strip_suffix("-SNAPSHOT").unwrap_or(version);
    let prefix = format!("{artifact_id}-{base_version}-");
    let remainder = filename.strip_prefix(&prefix)?;

    // Literal SNAPSHOT form: SNAPSHOT[-classifier].ext
    if let Some(rest) = remainder.strip_prefix("SNAPSHOT") {
        let (classifier, extension) = parse_classifier_and_extension(rest)?;
        return Some(SnapshotFile {
            extension,
            classifier,
            timestamp: None,
            build_number: None,
        });
    }

    // Timestamp form: yyyyMMdd.HHmmss-N[-classifier].ext
    let (timestamp, rest) = remainder.split_once('-')?;
    if !is_snapshot_timestamp(timestamp) {
        return None;
    }
    let digits_end = rest.find(|c: char| !c.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    let build_number: u32 = rest[..digits_end].parse().ok()?;
    let (classifier, extension) = parse_classifier_and_extension(&rest[digits_end..])?;

    Some(SnapshotFile {
        extension,
        classifier,
        timestamp: Some(timestamp.to_string()),
        build_number: Some(build_number),
    })
}

/// Parse the `[-classifier].ext` tail of a snapshot filename.
fn parse_classifier_and_extension(rest: &str) -> Option<(Option<String>, String)> {
    if let Some(classified) = rest.strip_prefix('-') {
        let (classifier, extension) = classified.split_once('.')?;
        if classifier.is_empty() || extension.is_empty() {
            return None;
        }
        Some((Some(classifier.to_string()), extension.to_string()))
    } else {
        let extension = rest.strip_prefix('.')?;
        if extension.is_empty() {
            return None;
        }
        Some((None, extension.to_string()))
    }
}

/// Check for the `yyyyMMdd.HHmmss` shape of a snapshot timestamp.
///
/// The time part is allowed to be shorter than six digits; some deploy
/// tooling emits minute precision only.
fn is_snapshot_timestamp(s: &str) -> bool {
    match s.split_once('.') {
        Some((date, time)) => {
            date.len() == 8
                && (2..=6).contains(&time.len())
                && date.bytes().all(|b| b.is_ascii_digit())
                && time.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Response content type derived from the artifact extension.
pub fn content_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or_default() {
        "jar" | "war" | "ear" => "application/java-archive",
        "pom" | "xml" => "application/xml",
        "json" | "module" => "application/json",
        "md5" | "sha1" | "sha256" | "asc" | "txt" => "text/plain",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        _ => "application/octet-stream",
    }
}
