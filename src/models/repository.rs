//! Repository model.
//!
//! Repositories are loaded once at startup and shared read-only by all
//! concurrent requests; nothing mutates them afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// One upstream a proxying repository falls back to.
///
/// List order in the configuration is trust order: the first upstream that
/// answers wins, so an internal mirror should be listed before a public one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxiedUpstream {
    /// Display name used in logs and failure reports
    pub name: String,
    /// Base URL the artifact path is appended to
    pub url: String,
    /// Optional Basic-auth credentials for the upstream
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ProxiedUpstream {
    /// Full URL for an artifact path below this upstream.
    pub fn artifact_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Repository definition as written in the repositories file.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryDefinition {
    pub name: String,
    #[serde(default)]
    pub requires_auth_for_read: bool,
    #[serde(default)]
    pub proxies: Vec<ProxiedUpstream>,
}

/// A named artifact storage root, optionally backed by upstream proxies.
#[derive(Debug, Clone)]
pub struct Repository {
    pub name: String,
    /// Local directory holding this repository's artifacts
    pub storage_root: PathBuf,
    /// When false, GET requests are served without credentials
    pub requires_auth_for_read: bool,
    /// Ordered upstream fallback chain; empty for purely hosted repositories
    pub proxies: Vec<ProxiedUpstream>,
}

impl Repository {
    fn from_definition(def: RepositoryDefinition, storage_path: &Path) -> Self {
        Self {
            storage_root: storage_path.join(&def.name),
            name: def.name,
            requires_auth_for_read: def.requires_auth_for_read,
            proxies: def.proxies,
        }
    }

    /// Whether an artifact path belongs to a mutable SNAPSHOT version.
    ///
    /// Release artifacts are immutable once published; snapshot artifacts
    /// may be overwritten.
    pub fn is_snapshot_path(path: &str) -> bool {
        path.split('/').any(|segment| segment.ends_with("-SNAPSHOT"))
    }
}

/// Load repository definitions from a JSON file.
///
/// A missing file yields the default pair of hosted repositories
/// (`releases` public, `snapshots` public) so a fresh install works without
/// any configuration.
pub async fn load_repositories(
    file: &Path,
    storage_path: &Path,
) -> Result<HashMap<String, Arc<Repository>>> {
    let definitions: Vec<RepositoryDefinition> = match tokio::fs::read(file).await {
        Ok(raw) => serde_json::from_slice(&raw)
            .map_err(|e| AppError::Config(format!("Invalid repositories file: {e}")))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => default_definitions(),
        Err(e) => return Err(e.into()),
    };

    let mut repositories = HashMap::new();
    for def in definitions {
        if def.name.is_empty() || def.name.contains('/') {
            return Err(AppError::Config(format!(
                "Invalid repository name: {:?}",
                def.name
            )));
        }
        let repo = Repository::from_definition(def, storage_path);
        tokio::fs::create_dir_all(&repo.storage_root).await?;
        if repositories
            .insert(repo.name.clone(), Arc::new(repo))
            .is_some()
        {
            return Err(AppError::Config("Duplicate repository name".to_string()));
        }
    }
    Ok(repositories)
}

fn default_definitions() -> Vec<RepositoryDefinition> {
    vec![
        RepositoryDefinition {
            name: "releases".to_string(),
            requires_auth_for_read: false,
            proxies: Vec::new(),
        },
        RepositoryDefinition {
            name: "snapshots".to_string(),
            requires_auth_for_read: false,
            proxies: Vec::new(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_url_joins_slashes() {
        let upstream = ProxiedUpstream {
            name: "central".to_string(),
            url: "https://repo.maven.apache.org/maven2/".to_string(),
            username: None,
            password: None,
        };
        assert_eq!(
            upstream.artifact_url("/com/example/app/1.0/app-1.0.jar"),
            "https://repo.maven.apache.org/maven2/com/example/app/1.0/app-1.0.jar"
        );
    }

    #[test]
    fn test_snapshot_path_detection() {
        assert!(Repository::is_snapshot_path(
            "com/example/app/1.0.0-SNAPSHOT/app-1.0.0-20210101.120000-1.jar"
        ));
        assert!(!Repository::is_snapshot_path(
            "com/example/app/1.0.0/app-1.0.0.jar"
        ));
        // A segment merely containing SNAPSHOT in the middle does not count
        assert!(!Repository::is_snapshot_path(
            "com/example/app-SNAPSHOT-tools/1.0/app.jar"
        ));
    }

    #[tokio::test]
    async fn test_missing_file_yields_default_repositories() {
        let dir = tempfile::tempdir().unwrap();
        let repos = load_repositories(&dir.path().join("absent.json"), dir.path())
            .await
            .unwrap();
        assert_eq!(repos.len(), 2);
        assert!(repos.contains_key("releases"));
        assert!(repos.contains_key("snapshots"));
        assert!(dir.path().join("releases").is_dir());
    }

    #[tokio::test]
    async fn test_load_repositories_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("repositories.json");
        std::fs::write(
            &file,
            r#"[{
                "name": "mirror",
                "requires_auth_for_read": true,
                "proxies": [{"name": "central", "url": "https://repo1.maven.org/maven2"}]
            }]"#,
        )
        .unwrap();

        let repos = load_repositories(&file, dir.path()).await.unwrap();
        assert_eq!(repos.len(), 1);
        let mirror = &repos["mirror"];
        assert!(mirror.requires_auth_for_read);
        assert_eq!(mirror.proxies.len(), 1);
        assert_eq!(mirror.storage_root, dir.path().join("mirror"));
    }

    #[tokio::test]
    async fn test_invalid_repository_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("repositories.json");
        std::fs::write(&file, r#"[{"name": "a/b"}]"#).unwrap();

        let result = load_repositories(&file, dir.path()).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
