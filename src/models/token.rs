//! Access token model.
//!
//! A token grants access to a URI-path subtree identified by its scope
//! prefix. The raw secret is never persisted; only a bcrypt hash is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted access token record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Unique, case-sensitive alias presented as the Basic-auth username
    pub alias: String,
    /// URI-path prefix defining the subtree this token may access
    pub scope_prefix: String,
    /// bcrypt hash of the secret; never the raw secret
    pub secret_hash: String,
    /// Whether the token may deploy artifacts inside its scope
    #[serde(default)]
    pub can_write: bool,
    /// Whether the token may use the administrative API
    #[serde(default)]
    pub is_manager: bool,
    pub created_at: DateTime<Utc>,
}

/// Token information exposed over the administrative API.
///
/// Same record minus the secret hash, which must never leave the store.
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub alias: String,
    pub scope_prefix: String,
    pub can_write: bool,
    pub is_manager: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Token> for TokenInfo {
    fn from(token: &Token) -> Self {
        Self {
            alias: token.alias.clone(),
            scope_prefix: token.scope_prefix.clone(),
            can_write: token.can_write,
            is_manager: token.is_manager,
            created_at: token.created_at,
        }
    }
}

/// Per-request credentials decoded from the Basic-auth header.
///
/// Discarded after the authentication check. Intentionally no `Debug`
/// derive: the raw secret must not end up in logs.
pub struct Credentials {
    pub alias: String,
    pub raw_secret: String,
}

/// The authenticated identity of one request.
///
/// Owned exclusively by the request being served; never cached or shared
/// across requests.
#[derive(Debug, Clone)]
pub struct Session {
    /// Alias of the authenticated token, or "anonymous"
    pub alias: String,
    /// Effective scope prefix the caller may access
    pub scope_prefix: String,
    pub can_write: bool,
    pub is_manager: bool,
}

impl Session {
    /// Session backed by a verified token.
    pub fn for_token(token: &Token) -> Self {
        Self {
            alias: token.alias.clone(),
            scope_prefix: token.scope_prefix.clone(),
            can_write: token.can_write,
            is_manager: token.is_manager,
        }
    }

    /// Read-only session for unauthenticated access to a public repository.
    ///
    /// Scoped to that single repository so it cannot leak into others.
    pub fn anonymous(repository: &str) -> Self {
        Self {
            alias: "anonymous".to_string(),
            scope_prefix: format!("/{repository}"),
            can_write: false,
            is_manager: false,
        }
    }
}
