//! Stockpile - Lightweight Maven-compatible artifact repository manager.
//!
//! Stores build artifacts, serves them over HTTP, proxies and caches
//! artifacts from upstream repositories, and enforces path-scoped token
//! authentication.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod failures;
pub mod maven;
pub mod models;
pub mod proxy;
pub mod resolver;
pub mod stats;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
