//! Maven metadata synthesis.
//!
//! Builds `maven-metadata.xml` documents from the set of locally known
//! artifact files. Two levels exist in the Maven 2 layout:
//!
//! - artifact level (`group/artifact/maven-metadata.xml`): version list
//! - version level (`group/artifact/1.0-SNAPSHOT/maven-metadata.xml`):
//!   timestamped snapshot versions
//!
//! Output is deterministic: entries are sorted so repeated synthesis over
//! the same directory produces byte-identical documents.

use std::path::Path;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::maven::{parse_snapshot_file, SnapshotFile, MAVEN_METADATA};

/// One row of synthesized snapshot metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotVersionEntry {
    pub extension: String,
    pub classifier: Option<String>,
    /// Resolved timestamped value, e.g. "1.0.0-20210101.120000-3"
    pub value: String,
    /// Numeric timestamp string, `yyyyMMddHHmmss`-style
    pub updated: String,
}

/// Synthesize version-level snapshot metadata for a version directory.
///
/// Scans the directory, dedups by `(extension, classifier)` keeping the
/// entry with the greatest `updated`, and renders the standard
/// `<snapshotVersions>` document sorted by extension then classifier.
pub async fn synthesize_version(
    dir: &Path,
    group_id: &str,
    artifact_id: &str,
    version: &str,
) -> Result<String> {
    let mut entries: Vec<(SnapshotFile, SnapshotVersionEntry)> = Vec::new();
    let base_version = version.strip_suffix("-SNAPSHOT").unwrap_or(version);

    let mut read_dir = tokio::fs::read_dir(dir).await.map_err(|_| {
        AppError::NotFound(format!("{group_id}:{artifact_id}:{version}"))
    })?;
    while let Some(entry) = read_dir.next_entry().await? {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(parsed) = parse_snapshot_file(name, artifact_id, version) else {
            continue;
        };

        let (value, updated) = match (&parsed.timestamp, parsed.build_number) {
            (Some(ts), Some(build)) => (
                format!("{base_version}-{ts}-{build}"),
                ts.replace('.', ""),
            ),
            // Non-timestamped deploys fall back to the file mtime
            _ => {
                let metadata = entry.metadata().await?;
                let mtime = metadata
                    .modified()
                    .map(chrono::DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                (
                    version.to_string(),
                    mtime.format("%Y%m%d%H%M%S").to_string(),
                )
            }
        };

        let candidate = SnapshotVersionEntry {
            extension: parsed.extension.clone(),
            classifier: parsed.classifier.clone(),
            value,
            updated,
        };

        // Dedup by (extension, classifier): the greatest `updated` wins,
        // build number breaks ties between equal timestamps
        match entries.iter_mut().find(|(_, e)| {
            e.extension == candidate.extension && e.classifier == candidate.classifier
        }) {
            Some((existing_file, existing)) => {
                let existing_key = (existing.updated.clone(), existing_file.build_number);
                let candidate_key = (candidate.updated.clone(), parsed.build_number);
                if candidate_key > existing_key {
                    *existing_file = parsed;
                    *existing = candidate;
                }
            }
            None => entries.push((parsed, candidate)),
        }
    }

    if entries.is_empty() {
        return Err(AppError::EmptyVersion(format!(
            "{group_id}:{artifact_id}:{version}"
        )));
    }

    let mut entries: Vec<SnapshotVersionEntry> =
        entries.into_iter().map(|(_, e)| e).collect();
    entries.sort_by(|a, b| {
        a.extension
            .cmp(&b.extension)
            .then_with(|| a.classifier.cmp(&b.classifier))
    });

    // The <snapshot> block describes the latest build across all entries
    let latest = entries
        .iter()
        .max_by(|a, b| a.updated.cmp(&b.updated))
        .cloned()
        .ok_or_else(|| AppError::Internal("empty entry set after dedup".into()))?;
    let last_updated = latest.updated.clone();
    let snapshot_block = render_snapshot_block(base_version, &latest.value);

    Ok(render_version_metadata(
        group_id,
        artifact_id,
        version,
        &snapshot_block,
        &last_updated,
        &entries,
    ))
}

/// Synthesize artifact-level metadata listing the known versions.
///
/// Versions are the subdirectory names of the artifact directory, ordered
/// with a numeric-aware comparison so `1.10.0` sorts after `1.9.0`.
pub async fn synthesize_artifact(dir: &Path, group_id: &str, artifact_id: &str) -> Result<String> {
    let mut versions = Vec::new();

    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|_| AppError::NotFound(format!("{group_id}:{artifact_id}")))?;
    while let Some(entry) = read_dir.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                versions.push(name.to_string());
            }
        }
    }

    if versions.is_empty() {
        return Err(AppError::EmptyVersion(format!("{group_id}:{artifact_id}")));
    }

    versions.sort_by(|a, b| compare_versions(a, b));

    let latest = versions.last().cloned().unwrap_or_default();
    let release = versions
        .iter()
        .rev()
        .find(|v| !v.ends_with("-SNAPSHOT"))
        .cloned();

    Ok(render_artifact_metadata(
        group_id, artifact_id, &versions, &latest, release.as_deref(),
    ))
}

/// Numeric-aware version comparison.
///
/// Splits on `.` and `-` and compares numeric parts as numbers so that
/// `1.10` orders after `1.9`. Mixed parts fall back to lexicographic order.
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parts_a: Vec<&str> = a.split(['.', '-']).collect();
    let parts_b: Vec<&str> = b.split(['.', '-']).collect();

    for (pa, pb) in parts_a.iter().zip(parts_b.iter()) {
        let ord = match (pa.parse::<u64>(), pb.parse::<u64>()) {
            (Ok(na), Ok(nb)) => na.cmp(&nb),
            _ => pa.cmp(pb),
        };
        if ord != std::cmp::Ordering::Equal {
            return ord;
        }
    }
    parts_a.len().cmp(&parts_b.len())
}

fn render_snapshot_block(base_version: &str, latest_value: &str) -> String {
    // latest_value is "{base}-{timestamp}-{build}" for timestamped builds
    match latest_value.strip_prefix(&format!("{base_version}-")) {
        Some(rest) => match rest.rsplit_once('-') {
            Some((timestamp, build)) => format!(
                "    <snapshot>\n      <timestamp>{timestamp}</timestamp>\n      <buildNumber>{build}</buildNumber>\n    </snapshot>\n"
            ),
            None => String::new(),
        },
        None => String::new(),
    }
}

fn render_version_metadata(
    group_id: &str,
    artifact_id: &str,
    version: &str,
    snapshot_block: &str,
    last_updated: &str,
    entries: &[SnapshotVersionEntry],
) -> String {
    let mut rows = String::new();
    for entry in entries {
        rows.push_str("      <snapshotVersion>\n");
        if let Some(classifier) = &entry.classifier {
            rows.push_str(&format!("        <classifier>{classifier}</classifier>\n"));
        }
        rows.push_str(&format!(
            "        <extension>{}</extension>\n        <value>{}</value>\n        <updated>{}</updated>\n      </snapshotVersion>\n",
            entry.extension, entry.value, entry.updated
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata modelVersion="1.1.0">
  <groupId>{group_id}</groupId>
  <artifactId>{artifact_id}</artifactId>
  <version>{version}</version>
  <versioning>
{snapshot_block}    <lastUpdated>{last_updated}</lastUpdated>
    <snapshotVersions>
{rows}    </snapshotVersions>
  </versioning>
</metadata>
"#
    )
}

fn render_artifact_metadata(
    group_id: &str,
    artifact_id: &str,
    versions: &[String],
    latest: &str,
    release: Option<&str>,
) -> String {
    let mut versions_xml = String::new();
    for v in versions {
        versions_xml.push_str(&format!("      <version>{v}</version>\n"));
    }

    let release_line = match release {
        Some(r) => format!("    <release>{r}</release>\n"),
        None => String::new(),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>{group_id}</groupId>
  <artifactId>{artifact_id}</artifactId>
  <versioning>
    <latest>{latest}</latest>
{release_line}    <versions>
{versions_xml}    </versions>
    <lastUpdated>{}</lastUpdated>
  </versioning>
</metadata>
"#,
        Utc::now().format("%Y%m%d%H%M%S")
    )
}
