//! File-persisted credential store.
//!
//! Tokens live in a JSON file loaded once at startup into an in-memory
//! index keyed by alias. Administrative changes rewrite the file wholesale
//! through a temporary file and an atomic rename, and swap the in-memory
//! index under a write lock so concurrent lookups always observe a complete
//! token set.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::token::{Token, TokenInfo};

/// A syntactically valid bcrypt hash used as the verification target when
/// the presented alias does not exist, so that failure latency does not
/// disclose alias existence.
const DUMMY_HASH: &str = "$2a$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";

/// Credential store: read-mostly, alias-keyed.
pub struct TokenStore {
    path: PathBuf,
    tokens: RwLock<HashMap<String, Token>>,
}

impl TokenStore {
    /// Load the store from its backing file. A missing file yields an
    /// empty store; the file is created on the first administrative change.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let tokens = match tokio::fs::read(&path).await {
            Ok(raw) => {
                let list: Vec<Token> = serde_json::from_slice(&raw)
                    .map_err(|e| AppError::Config(format!("Invalid token file: {e}")))?;
                let mut map = HashMap::with_capacity(list.len());
                for token in list {
                    if map.insert(token.alias.clone(), token).is_some() {
                        return Err(AppError::Config(
                            "Duplicate token alias in token file".to_string(),
                        ));
                    }
                }
                map
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(count = tokens.len(), "Loaded token store");
        Ok(Self {
            path,
            tokens: RwLock::new(tokens),
        })
    }

    /// Look up a token by alias.
    pub async fn get(&self, alias: &str) -> Option<Token> {
        self.tokens.read().await.get(alias).cloned()
    }

    /// Whether the store holds no tokens (first boot).
    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }

    /// List all tokens without their secret hashes.
    pub async fn list(&self) -> Vec<TokenInfo> {
        let mut infos: Vec<TokenInfo> =
            self.tokens.read().await.values().map(TokenInfo::from).collect();
        infos.sort_by(|a, b| a.alias.cmp(&b.alias));
        infos
    }

    /// Create and persist a token. The raw secret is hashed here and
    /// discarded; it never touches the store or the file.
    pub async fn create(
        &self,
        alias: &str,
        scope_prefix: &str,
        raw_secret: &str,
        can_write: bool,
        is_manager: bool,
    ) -> Result<Token> {
        if alias.is_empty() {
            return Err(AppError::Conflict("Token alias must not be empty".into()));
        }
        if scope_prefix.is_empty() {
            return Err(AppError::Conflict(
                "Token scope prefix must not be empty".into(),
            ));
        }

        let token = Token {
            alias: alias.to_string(),
            scope_prefix: scope_prefix.to_string(),
            secret_hash: Self::hash_secret(raw_secret)?,
            can_write,
            is_manager,
            created_at: Utc::now(),
        };

        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(alias) {
            return Err(AppError::Conflict(format!(
                "Token alias '{alias}' already exists"
            )));
        }
        tokens.insert(alias.to_string(), token.clone());
        self.persist(&tokens).await?;
        Ok(token)
    }

    /// Remove a token by alias and persist the change.
    pub async fn remove(&self, alias: &str) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        if tokens.remove(alias).is_none() {
            return Err(AppError::NotFound(format!("Token '{alias}'")));
        }
        self.persist(&tokens).await
    }

    /// Hash a raw secret for storage.
    pub fn hash_secret(raw_secret: &str) -> Result<String> {
        bcrypt::hash(raw_secret, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Secret hashing failed: {e}")))
    }

    /// Verify a raw secret against a stored hash. bcrypt compares the full
    /// digest, so byte-by-byte timing does not leak prefix matches.
    pub fn verify_secret(raw_secret: &str, secret_hash: &str) -> bool {
        bcrypt::verify(raw_secret, secret_hash).unwrap_or(false)
    }

    /// Run a verification against a fixed reference hash. Called when the
    /// alias is unknown so that the unknown-alias path costs the same as a
    /// wrong-secret path.
    pub fn dummy_verify(raw_secret: &str) {
        let _ = bcrypt::verify(raw_secret, DUMMY_HASH);
    }

    /// Generate a random URL-safe secret for administrative token creation.
    pub fn generate_secret() -> String {
        use rand::Rng;
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        (0..40)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect()
    }

    /// Rewrite the backing file wholesale: temp file, then atomic rename.
    async fn persist(&self, tokens: &HashMap<String, Token>) -> Result<()> {
        let mut list: Vec<&Token> = tokens.values().collect();
        list.sort_by(|a, b| a.alias.cmp(&b.alias));
        let json = serde_json::to_vec_pretty(&list)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self
            .path
            .with_extension(format!("tmp-{}", Uuid::new_v4()));
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low bcrypt cost keeps the test suite fast; production hashing goes
    // through hash_secret with the default cost.
    fn fast_hash(secret: &str) -> String {
        bcrypt::hash(secret, 4).unwrap()
    }

    async fn store_in(dir: &tempfile::TempDir) -> TokenStore {
        TokenStore::load(dir.path().join("tokens.json")).await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        assert!(store.is_empty().await);
        assert!(store.get("anyone").await.is_none());
    }

    #[tokio::test]
    async fn test_persist_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        {
            let store = TokenStore::load(path.clone()).await.unwrap();
            // Insert via the public API but with a short secret; cost is paid once
            store
                .create("ci", "/releases", "secret", true, false)
                .await
                .unwrap();
        }

        let reloaded = TokenStore::load(path).await.unwrap();
        let token = reloaded.get("ci").await.unwrap();
        assert_eq!(token.scope_prefix, "/releases");
        assert!(token.can_write);
        assert!(TokenStore::verify_secret("secret", &token.secret_hash));
        assert!(!TokenStore::verify_secret("wrong", &token.secret_hash));
    }

    #[tokio::test]
    async fn test_duplicate_alias_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        store.create("ci", "/", "s1", false, false).await.unwrap();
        let result = store.create("ci", "/other", "s2", false, false).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_empty_scope_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let result = store.create("ci", "", "s", false, false).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = TokenStore::load(path.clone()).await.unwrap();
        store.create("ci", "/", "s", false, false).await.unwrap();
        store.remove("ci").await.unwrap();
        assert!(matches!(
            store.remove("ci").await,
            Err(AppError::NotFound(_))
        ));

        let reloaded = TokenStore::load(path).await.unwrap();
        assert!(reloaded.is_empty().await);
    }

    #[tokio::test]
    async fn test_token_file_never_contains_raw_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = TokenStore::load(path.clone()).await.unwrap();
        store
            .create("ci", "/", "super-secret-value", false, false)
            .await
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("super-secret-value"));
        assert!(raw.contains("secret_hash"));
    }

    #[test]
    fn test_verify_against_fast_hash() {
        let hash = fast_hash("s3cr3t");
        assert!(TokenStore::verify_secret("s3cr3t", &hash));
        assert!(!TokenStore::verify_secret("S3cr3t", &hash));
    }

    #[test]
    fn test_dummy_verify_does_not_panic() {
        TokenStore::dummy_verify("anything:with:colons");
        TokenStore::dummy_verify("");
    }

    #[test]
    fn test_generated_secrets_are_distinct() {
        let a = TokenStore::generate_secret();
        let b = TokenStore::generate_secret();
        assert_eq!(a.len(), 40);
        assert_ne!(a, b);
    }
}
