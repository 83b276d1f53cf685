//! Authentication: credential store and the Basic-auth authenticator.

pub mod authenticator;
pub mod token_store;

pub use authenticator::Authenticator;
pub use token_store::TokenStore;

/// Exact-segment scope prefix check.
///
/// A scope of `/a/b` covers `/a/b` and `/a/b/c` but not `/a/bc`; the root
/// scope `/` covers everything. Both sides are compared with a single
/// leading slash and no trailing slash.
pub fn scope_covers(scope_prefix: &str, path: &str) -> bool {
    let prefix = normalize(scope_prefix);
    let path = normalize(path);

    if prefix == "/" {
        return true;
    }
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

fn normalize(p: &str) -> String {
    let trimmed = p.trim_start_matches('/').trim_end_matches('/');
    format!("/{trimmed}")
}
