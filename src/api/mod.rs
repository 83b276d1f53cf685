//! API module - HTTP handlers and middleware.

pub mod handlers;
pub mod middleware;
pub mod routes;

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::{Authenticator, TokenStore};
use crate::config::Config;
use crate::failures::FailureRecorder;
use crate::models::repository::Repository;
use crate::resolver::ContentResolver;
use crate::stats::StatsRecorder;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub repositories: HashMap<String, Arc<Repository>>,
    pub tokens: Arc<TokenStore>,
    pub authenticator: Authenticator,
    pub resolver: ContentResolver,
    pub stats: StatsRecorder,
    pub failures: FailureRecorder,
}

pub type SharedState = Arc<AppState>;
