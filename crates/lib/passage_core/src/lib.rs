//! # passage_core
//!
//! Core domain logic for Passage: maps identity-provider claims onto local
//! accounts and issues, refreshes and revokes the platform's own session tokens.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod oauth;
pub mod users;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
