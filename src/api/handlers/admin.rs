//! Administrative handlers: token management, statistics, failure reports.
//!
//! Every endpoint here requires a manager token. Managers hold a root
//! scope, so the gate authenticates against `/` and then checks the
//! manager flag.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::SharedState;
use crate::auth::TokenStore;
use crate::error::{AppError, Result};
use crate::models::token::{Session, TokenInfo};
use crate::stats::StatsRow;

/// Checksum extensions hidden from human-facing reports by default.
const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &["md5", "sha1", "sha256"];

const DEFAULT_STATS_LIMIT: usize = 20;

async fn require_manager(state: &SharedState, headers: &HeaderMap) -> Result<Session> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let session = state.authenticator.authenticate(header, "/").await?;
    if !session.is_manager {
        return Err(AppError::Forbidden(
            "Management endpoints require a manager token".to_string(),
        ));
    }
    Ok(session)
}

// ---------------------------------------------------------------------------
// Token management
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub alias: String,
    pub scope_prefix: String,
    /// When absent, a random secret is generated and returned once
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub can_write: bool,
    #[serde(default)]
    pub is_manager: bool,
}

#[derive(Debug, Serialize)]
pub struct CreatedTokenResponse {
    #[serde(flatten)]
    pub token: TokenInfo,
    /// Shown exactly once; only the bcrypt hash is persisted
    pub secret: String,
}

/// GET /api/tokens
pub async fn list_tokens(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    match require_manager(&state, &headers).await {
        Ok(_) => Json(state.tokens.list().await).into_response(),
        Err(err) => err.into_response(),
    }
}

/// POST /api/tokens
pub async fn create_token(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<CreateTokenRequest>,
) -> Response {
    let session = match require_manager(&state, &headers).await {
        Ok(s) => s,
        Err(err) => return err.into_response(),
    };

    let secret = request
        .secret
        .unwrap_or_else(TokenStore::generate_secret);

    match state
        .tokens
        .create(
            &request.alias,
            &request.scope_prefix,
            &secret,
            request.can_write,
            request.is_manager,
        )
        .await
    {
        Ok(token) => {
            tracing::info!(
                alias = %token.alias,
                scope = %token.scope_prefix,
                by = %session.alias,
                "Token created"
            );
            (
                StatusCode::CREATED,
                Json(CreatedTokenResponse {
                    token: TokenInfo::from(&token),
                    secret,
                }),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// DELETE /api/tokens/{alias}
pub async fn delete_token(
    State(state): State<SharedState>,
    Path(alias): Path<String>,
    headers: HeaderMap,
) -> Response {
    let session = match require_manager(&state, &headers).await {
        Ok(s) => s,
        Err(err) => return err.into_response(),
    };

    match state.tokens.remove(&alias).await {
        Ok(()) => {
            tracing::info!(alias = %alias, by = %session.alias, "Token removed");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => err.into_response(),
    }
}

// ---------------------------------------------------------------------------
// Statistics and failures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub total_hits: u64,
    pub entries: Vec<StatsRow>,
}

/// GET /api/stats?limit=N
pub async fn stats_report(
    State(state): State<SharedState>,
    Query(query): Query<StatsQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(err) = require_manager(&state, &headers).await {
        return err.into_response();
    }
    let limit = query.limit.unwrap_or(DEFAULT_STATS_LIMIT);
    Json(StatsReport {
        total_hits: state.stats.total_hits(),
        entries: state.stats.top_entries(limit, DEFAULT_EXCLUDED_EXTENSIONS),
    })
    .into_response()
}

/// GET /api/failures
pub async fn list_failures(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if let Err(err) = require_manager(&state, &headers).await {
        return err.into_response();
    }
    Json(state.failures.list_failures()).into_response()
}
