//! Proxy fetcher for repositories backed by upstream chains.
//!
//! Iterates the configured upstreams in order (first-listed wins), streams
//! the first success back to the caller and writes it through to local
//! storage atomically so subsequent requests are served from disk.
//!
//! Cache population for one `(repository, path)` is mutually exclusive:
//! concurrent requests for the same missing artifact produce exactly one
//! upstream fetch and one cache write. The fetch runs on a detached task,
//! so a client disconnect does not cancel an in-flight cache population
//! other waiters depend on.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, Result, UpstreamAttempt};
use crate::models::file_details::FileDetails;
use crate::models::repository::{ProxiedUpstream, Repository};

/// HTTP client timeout in seconds
const HTTP_TIMEOUT_SECS: u64 = 60;

/// Content fetched from one upstream.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub content: Bytes,
    pub content_type: Option<String>,
}

/// Transport seam for upstream fetches. Tests inject a counting mock;
/// production uses [`HttpUpstreamClient`].
#[async_trait]
pub trait UpstreamClient: Send + Sync + 'static {
    async fn fetch(&self, upstream: &ProxiedUpstream, path: &str) -> Result<UpstreamResponse>;
}

/// reqwest-backed upstream client.
pub struct HttpUpstreamClient {
    client: reqwest::Client,
}

impl HttpUpstreamClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(concat!("stockpile-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn fetch(&self, upstream: &ProxiedUpstream, path: &str) -> Result<UpstreamResponse> {
        let url = upstream.artifact_url(path);
        tracing::debug!(upstream = %upstream.name, %url, "Fetching from upstream");

        let mut request = self.client.get(&url);
        if let Some(username) = &upstream.username {
            request = request.basic_auth(username, upstream.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Transport error: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("{status}")));
        }
        if !status.is_success() {
            // Redirect/partial responses are not treated as cacheable content
            return Err(AppError::Internal(format!("Upstream status {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let content = response
            .bytes()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read upstream body: {e}")))?;

        Ok(UpstreamResponse {
            content,
            content_type,
        })
    }
}

/// Executes the ordered upstream fallback chain with write-through caching.
pub struct ProxyFetcher {
    client: Arc<dyn UpstreamClient>,
    /// Per-path locks serializing cache population; entries persist for the
    /// process lifetime, like the stats counters
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ProxyFetcher {
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self {
            client,
            locks: DashMap::new(),
        }
    }

    /// Fetch an artifact through the repository's upstream chain.
    ///
    /// Runs on a detached task: dropping the returned future (client
    /// disconnect) does not abort an in-flight fetch that other waiters for
    /// the same path rely on to populate the cache.
    pub async fn fetch(
        self: &Arc<Self>,
        repository: Arc<Repository>,
        relative_path: String,
    ) -> Result<(FileDetails, Bytes)> {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.fetch_serialized(&repository, &relative_path).await
        });
        handle
            .await
            .map_err(|e| AppError::Internal(format!("Proxy fetch task failed: {e}")))?
    }

    async fn fetch_serialized(
        &self,
        repository: &Repository,
        relative_path: &str,
    ) -> Result<(FileDetails, Bytes)> {
        let key = format!("{}/{}", repository.name, relative_path);
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let target = repository.storage_root.join(relative_path);
        let file_name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(relative_path)
            .to_string();

        // Another request may have populated the cache while we waited
        if let Ok(metadata) = tokio::fs::metadata(&target).await {
            if metadata.is_file() {
                let content = tokio::fs::read(&target).await?;
                tracing::debug!(path = %key, "Proxy cache hit after wait");
                return Ok((
                    FileDetails::from_metadata(file_name, &metadata),
                    Bytes::from(content),
                ));
            }
        }

        let mut attempts = Vec::new();
        for upstream in &repository.proxies {
            match self.client.fetch(upstream, relative_path).await {
                Ok(response) => {
                    write_through(&target, &response.content).await?;
                    tracing::info!(
                        path = %key,
                        upstream = %upstream.name,
                        bytes = response.content.len(),
                        "Cached artifact from upstream"
                    );
                    let details =
                        FileDetails::in_memory(file_name, response.content.len() as u64);
                    return Ok((details, response.content));
                }
                Err(e) => {
                    // 404s and transport errors both advance the chain
                    tracing::warn!(
                        path = %key,
                        upstream = %upstream.name,
                        error = %e,
                        "Upstream fetch failed, trying next"
                    );
                    attempts.push(UpstreamAttempt {
                        upstream: upstream.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(AppError::UpstreamExhausted {
            path: key,
            attempts,
        })
    }
}

/// Write content into the cache atomically: temporary sibling file first,
/// then rename into place so readers never observe a partial artifact.
async fn write_through(target: &Path, content: &Bytes) -> Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = target.with_extension(format!("part-{}", Uuid::new_v4()));
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, target).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_repository(dir: &Path, proxies: Vec<ProxiedUpstream>) -> Arc<Repository> {
        Arc::new(Repository {
            name: "mirror".to_string(),
            storage_root: dir.to_path_buf(),
            requires_auth_for_read: false,
            proxies,
        })
    }

    fn upstream(name: &str) -> ProxiedUpstream {
        ProxiedUpstream {
            name: name.to_string(),
            url: format!("https://{name}.example.com/maven2"),
            username: None,
            password: None,
        }
    }

    /// Mock upstream: per-upstream canned results plus a global fetch count.
    struct MockClient {
        responses: HashMap<String, std::result::Result<Bytes, String>>,
        fetch_count: AtomicUsize,
        delay: Option<Duration>,
    }

    impl MockClient {
        fn new(responses: Vec<(&str, std::result::Result<Bytes, String>)>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                fetch_count: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl UpstreamClient for MockClient {
        async fn fetch(
            &self,
            upstream: &ProxiedUpstream,
            _path: &str,
        ) -> Result<UpstreamResponse> {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.responses.get(&upstream.name) {
                Some(Ok(bytes)) => Ok(UpstreamResponse {
                    content: bytes.clone(),
                    content_type: Some("application/java-archive".to_string()),
                }),
                Some(Err(reason)) => Err(AppError::Internal(reason.clone())),
                None => Err(AppError::NotFound("404 Not Found".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_first_upstream_wins() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockClient::new(vec![
            ("internal", Ok(Bytes::from_static(b"internal-bytes"))),
            ("central", Ok(Bytes::from_static(b"central-bytes"))),
        ]));
        let fetcher = Arc::new(ProxyFetcher::new(client.clone()));
        let repo = test_repository(dir.path(), vec![upstream("internal"), upstream("central")]);

        let (details, content) = fetcher
            .fetch(repo, "com/example/app/1.0/app-1.0.jar".to_string())
            .await
            .unwrap();

        // Configured order is trust order: the internal mirror wins
        assert_eq!(&content[..], b"internal-bytes");
        assert_eq!(details.name, "app-1.0.jar");
        assert_eq!(client.fetch_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_on_first_advances_to_second() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockClient::new(vec![
            // "internal" absent from the map: behaves as a 404
            ("central", Ok(Bytes::from_static(b"from-central"))),
        ]));
        let fetcher = Arc::new(ProxyFetcher::new(client.clone()));
        let repo = test_repository(dir.path(), vec![upstream("internal"), upstream("central")]);

        let (_, content) = fetcher
            .fetch(repo, "a/b.jar".to_string())
            .await
            .unwrap();
        assert_eq!(&content[..], b"from-central");
        assert_eq!(client.fetch_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transport_error_advances_chain() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockClient::new(vec![
            ("internal", Err("connection refused".to_string())),
            ("central", Ok(Bytes::from_static(b"ok"))),
        ]));
        let fetcher = Arc::new(ProxyFetcher::new(client));
        let repo = test_repository(dir.path(), vec![upstream("internal"), upstream("central")]);

        let (_, content) = fetcher.fetch(repo, "a/b.jar".to_string()).await.unwrap();
        assert_eq!(&content[..], b"ok");
    }

    #[tokio::test]
    async fn test_exhausted_chain_aggregates_reasons() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockClient::new(vec![(
            "internal",
            Err("timeout".to_string()),
        )]));
        let fetcher = Arc::new(ProxyFetcher::new(client));
        let repo = test_repository(dir.path(), vec![upstream("internal"), upstream("central")]);

        let err = fetcher
            .fetch(repo, "a/b.jar".to_string())
            .await
            .unwrap_err();
        match err {
            AppError::UpstreamExhausted { attempts, .. } => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].upstream, "internal");
                assert!(attempts[0].reason.contains("timeout"));
                assert_eq!(attempts[1].upstream, "central");
            }
            other => panic!("expected UpstreamExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_through_populates_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockClient::new(vec![(
            "central",
            Ok(Bytes::from_static(b"cached-bytes")),
        )]));
        let fetcher = Arc::new(ProxyFetcher::new(client.clone()));
        let repo = test_repository(dir.path(), vec![upstream("central")]);

        fetcher
            .fetch(repo.clone(), "com/example/app-1.0.jar".to_string())
            .await
            .unwrap();

        let cached = std::fs::read(dir.path().join("com/example/app-1.0.jar")).unwrap();
        assert_eq!(cached, b"cached-bytes");

        // Second fetch is served from the cache, no additional upstream call
        let (_, content) = fetcher
            .fetch(repo, "com/example/app-1.0.jar".to_string())
            .await
            .unwrap();
        assert_eq!(&content[..], b"cached-bytes");
        assert_eq!(client.fetch_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_partial_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockClient::new(vec![(
            "central",
            Ok(Bytes::from_static(b"xyz")),
        )]));
        let fetcher = Arc::new(ProxyFetcher::new(client));
        let repo = test_repository(dir.path(), vec![upstream("central")]);

        fetcher
            .fetch(repo, "com/example/app.jar".to_string())
            .await
            .unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("com/example"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n.contains("part-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_fifty_concurrent_requesters_single_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(
            MockClient::new(vec![("central", Ok(Bytes::from_static(b"shared-content")))])
                .with_delay(Duration::from_millis(50)),
        );
        let fetcher = Arc::new(ProxyFetcher::new(client.clone()));
        let repo = test_repository(dir.path(), vec![upstream("central")]);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let fetcher = Arc::clone(&fetcher);
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                fetcher
                    .fetch(repo, "com/example/hot-artifact.jar".to_string())
                    .await
            }));
        }

        for handle in handles {
            let (_, content) = handle.await.unwrap().unwrap();
            assert_eq!(&content[..], b"shared-content");
        }

        // Exactly one upstream fetch populated the cache for all 50 requesters
        assert_eq!(client.fetch_count.load(Ordering::SeqCst), 1);
        let cached = std::fs::read(dir.path().join("com/example/hot-artifact.jar")).unwrap();
        assert_eq!(cached, b"shared-content");
    }

    #[tokio::test]
    async fn test_fetches_for_different_paths_run_in_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(
            MockClient::new(vec![("central", Ok(Bytes::from_static(b"data")))])
                .with_delay(Duration::from_millis(100)),
        );
        let fetcher = Arc::new(ProxyFetcher::new(client.clone()));
        let repo = test_repository(dir.path(), vec![upstream("central")]);

        let start = std::time::Instant::now();
        let mut handles = Vec::new();
        for i in 0..4 {
            let fetcher = Arc::clone(&fetcher);
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                fetcher.fetch(repo, format!("com/example/artifact-{i}.jar")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Serial execution would take at least 400ms
        assert!(start.elapsed() < Duration::from_millis(350));
        assert_eq!(client.fetch_count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_fetch_completes_even_if_requester_disconnects() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(
            MockClient::new(vec![("central", Ok(Bytes::from_static(b"survivor")))])
                .with_delay(Duration::from_millis(50)),
        );
        let fetcher = Arc::new(ProxyFetcher::new(client.clone()));
        let repo = test_repository(dir.path(), vec![upstream("central")]);

        // Simulate a dropped connection: the response future is abandoned
        {
            let fut = fetcher.fetch(repo.clone(), "com/example/app.jar".to_string());
            // Poll once to start the detached task, then drop
            tokio::select! {
                _ = fut => {}
                _ = tokio::time::sleep(Duration::from_millis(5)) => {}
            }
        }

        // The detached task finishes and populates the cache regardless
        tokio::time::sleep(Duration::from_millis(200)).await;
        let cached = std::fs::read(dir.path().join("com/example/app.jar")).unwrap();
        assert_eq!(cached, b"survivor");
        assert_eq!(client.fetch_count.load(Ordering::SeqCst), 1);
    }
}
