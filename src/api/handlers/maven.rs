//! Maven 2 repository layout handlers.
//!
//! Implements the path-based repository surface for `mvn deploy` and
//! `mvn dependency:resolve`:
//!   GET /{repository}/*path — download artifact, metadata, checksum or listing
//!   PUT /{repository}/*path — upload artifact (mvn deploy)

use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;

use crate::api::middleware::CorrelationId;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::maven::RepositoryPath;
use crate::models::repository::Repository;
use crate::models::token::Session;
use crate::resolver::{response_content_type, ResolvedContent};

/// Look up a repository by name. Unknown names get the same generic
/// not-found response as missing content.
fn lookup_repository(state: &SharedState, name: &str) -> Result<Arc<Repository>> {
    state
        .repositories
        .get(name)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("/{name}")))
}

fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

/// Establish a session for a read request.
///
/// Private repositories require credentials covering the scoped path.
/// Public repositories serve reads anonymously; presented credentials are
/// still verified when the client sends them, so a deploy tool probing
/// with a bad token learns about it early.
async fn read_session(
    state: &SharedState,
    repository: &Repository,
    headers: &HeaderMap,
    path: &RepositoryPath,
) -> Result<Session> {
    let header = authorization_header(headers);
    if repository.requires_auth_for_read {
        return state.authenticator.authenticate(header, &path.scoped()).await;
    }
    match header {
        Some(_) => state.authenticator.authenticate(header, &path.scoped()).await,
        None => Ok(Session::anonymous(&repository.name)),
    }
}

/// GET /{repository}/*path
pub async fn download(
    State(state): State<SharedState>,
    Path((repository, path)): Path<(String, String)>,
    Extension(correlation): Extension<CorrelationId>,
    headers: HeaderMap,
) -> Response {
    match serve(&state, &repository, &path, &headers).await {
        Ok(response) => response,
        Err(err) => {
            if err.is_recordable() {
                state.failures.record(correlation.as_str(), &err);
            }
            err.into_response()
        }
    }
}

/// GET /{repository} and /{repository}/ list the repository root.
pub async fn browse_root(
    State(state): State<SharedState>,
    Path(repository): Path<String>,
    Extension(correlation): Extension<CorrelationId>,
    headers: HeaderMap,
) -> Response {
    match serve(&state, &repository, "", &headers).await {
        Ok(response) => response,
        Err(err) => {
            if err.is_recordable() {
                state.failures.record(correlation.as_str(), &err);
            }
            err.into_response()
        }
    }
}

async fn serve(
    state: &SharedState,
    repository: &str,
    raw_path: &str,
    headers: &HeaderMap,
) -> Result<Response> {
    let repo = lookup_repository(state, repository)?;
    let path = RepositoryPath::parse(repository, raw_path)?;
    let _session = read_session(state, &repo, headers, &path).await?;

    let resolved = state.resolver.resolve(&repo, &path).await?;
    state.stats.record(&path.scoped());

    let response = match resolved {
        ResolvedContent::File { details, content } => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, response_content_type(&path))
            .header(CONTENT_LENGTH, details.content_length)
            .body(axum::body::Body::from(content))
            .map_err(|e| AppError::Internal(format!("Response build failed: {e}")))?,
        ResolvedContent::Document {
            content,
            content_type,
        } => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type)
            .body(axum::body::Body::from(content))
            .map_err(|e| AppError::Internal(format!("Response build failed: {e}")))?,
        ResolvedContent::Listing(entries) => Json(entries).into_response(),
    };
    Ok(response)
}

/// PUT /{repository}/*path
pub async fn upload(
    State(state): State<SharedState>,
    Path((repository, path)): Path<(String, String)>,
    Extension(correlation): Extension<CorrelationId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match deploy(&state, &repository, &path, &headers, body).await {
        Ok(response) => response,
        Err(err) => {
            if err.is_recordable() {
                state.failures.record(correlation.as_str(), &err);
            }
            err.into_response()
        }
    }
}

async fn deploy(
    state: &SharedState,
    repository: &str,
    raw_path: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let repo = lookup_repository(state, repository)?;
    let path = RepositoryPath::parse(repository, raw_path)?;

    // Deployments always authenticate, even to public repositories
    let session = state
        .authenticator
        .authenticate(authorization_header(headers), &path.scoped())
        .await?;

    let details = state.resolver.store(&session, &repo, &path, body).await?;
    Ok((StatusCode::CREATED, Json(details)).into_response())
}
