//! Basic-auth authenticator.
//!
//! Verifies presented credentials against the token store and checks that
//! the requested path lies inside the token's scope. Every rejection is
//! surfaced to the caller as the same generic `Unauthorized` error; the
//! concrete cause exists only in logs (anti-enumeration).

use std::sync::Arc;

use base64::Engine;

use crate::auth::{scope_covers, TokenStore};
use crate::error::{AppError, Result};
use crate::models::token::{Credentials, Session};

/// Internal rejection cause, logged but never exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthFailure {
    MissingCredentials,
    UnsupportedScheme,
    MalformedCredentials,
    UnknownAlias,
    BadSecret,
    OutOfScope,
}

/// Stateless per-request authentication protocol over the token store.
pub struct Authenticator {
    store: Arc<TokenStore>,
}

impl Authenticator {
    pub fn new(store: Arc<TokenStore>) -> Self {
        Self { store }
    }

    /// Authenticate a request against a path.
    ///
    /// `request_path` is the scoped form `/{repository}/{relative_path}`.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        request_path: &str,
    ) -> Result<Session> {
        let header = match authorization {
            Some(h) => h,
            None => return Err(self.reject(AuthFailure::MissingCredentials, request_path)),
        };

        let credentials = match Self::decode_basic(header) {
            Ok(c) => c,
            Err(failure) => return Err(self.reject(failure, request_path)),
        };

        let token = match self.store.get(&credentials.alias).await {
            Some(t) => t,
            None => {
                // Constant-shape failure path: run a verification against a
                // reference hash so latency does not disclose alias existence
                TokenStore::dummy_verify(&credentials.raw_secret);
                return Err(self.reject(AuthFailure::UnknownAlias, request_path));
            }
        };

        if !TokenStore::verify_secret(&credentials.raw_secret, &token.secret_hash) {
            return Err(self.reject(AuthFailure::BadSecret, request_path));
        }

        if !scope_covers(&token.scope_prefix, request_path) {
            return Err(self.reject(AuthFailure::OutOfScope, request_path));
        }

        Ok(Session::for_token(&token))
    }

    /// Decode a `Basic <base64(alias:secret)>` header. The payload is split
    /// on the first `:` so secrets may contain colons.
    fn decode_basic(header: &str) -> std::result::Result<Credentials, AuthFailure> {
        let payload = header
            .strip_prefix("Basic ")
            .or_else(|| header.strip_prefix("basic "))
            .ok_or(AuthFailure::UnsupportedScheme)?;

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|_| AuthFailure::MalformedCredentials)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthFailure::MalformedCredentials)?;

        let (alias, raw_secret) = decoded
            .split_once(':')
            .ok_or(AuthFailure::MalformedCredentials)?;
        if alias.is_empty() {
            return Err(AuthFailure::MalformedCredentials);
        }

        Ok(Credentials {
            alias: alias.to_string(),
            raw_secret: raw_secret.to_string(),
        })
    }

    /// Log the internal cause, return the single generic rejection.
    fn reject(&self, failure: AuthFailure, request_path: &str) -> AppError {
        tracing::debug!(cause = ?failure, path = request_path, "Authentication rejected");
        AppError::Unauthorized
    }
}
