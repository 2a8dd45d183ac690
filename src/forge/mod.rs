//! forge
//!
//! Abstraction for the remote forge (GitHub or GitHub Enterprise Server).
//!
//! # Architecture
//!
//! The `Forge` trait defines the interface for interacting with the hosting
//! service. Commands obtain a forge through [`create_forge`] rather than
//! constructing a specific implementation, so tests can substitute
//! [`mock::MockForge`].
//!
//! # Modules
//!
//! - `traits`: Core `Forge` trait and API models
//! - [`github`]: GitHub implementation using REST and GraphQL APIs
//! - [`mock`]: Mock implementation for deterministic testing
//!
//! # Example
//!
//! ```ignore
//! use ghr::forge::{create_forge, Forge};
//! use ghr::core::types::Repo;
//!
//! let forge = create_forge("github.com", Some(token));
//! let repository = forge.repository(&Repo::new("octo", "hello")).await?;
//! println!("default branch: {}", repository.default_branch);
//! ```

pub mod github;
pub mod mock;
mod traits;

use std::sync::Arc;

pub use traits::*;

/// Create the forge client for `host`.
pub fn create_forge(host: &str, token: Option<String>) -> Arc<dyn Forge> {
    tracing::debug!(host, has_token = token.is_some(), "creating forge client");
    Arc::new(github::GitHubForge::new(host, token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_forge_returns_github() {
        let forge = create_forge("github.com", None);
        assert_eq!(forge.name(), "github");
    }
}
