//! Source resolution: turning opaque video-host page URLs into direct,
//! fetchable media URLs.
//!
//! # Architecture
//!
//! - [`Resolver`] - async trait individual resolvers implement
//! - [`ResolverRegistry`] - priority-ordered collection; the first resolver
//!   whose `can_handle` accepts a URL owns its resolution, and its failure is
//!   final (no retry, no fallback past a failed attempt)
//! - [`DirectResolver`] - passthrough for URLs already pointing at media
//! - [`PlayerConfigResolver`] - fetches a host page and extracts the embedded
//!   player configuration's media path

mod direct;
mod error;
mod http_client;
mod player;

pub use direct::DirectResolver;
pub use error::ResolveError;
pub use player::PlayerConfigResolver;

use async_trait::async_trait;

use crate::proxy::ProxyRoute;

/// Priority level for resolver ordering.
///
/// Derives `Ord` so that `Specialized < Fallback` (try specialized first).
/// Within the same priority level, registration order is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResolverPriority {
    /// Most specific: URL shape identifies the handling directly.
    Specialized = 0,
    /// Least specific: generic page-scanning fallback.
    Fallback = 1,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    /// The direct, fetchable media URL.
    pub media_url: String,
    /// Referer the transfer should present, when the host requires one.
    pub referer: Option<String>,
}

/// Trait all resolvers implement.
///
/// # Object Safety
///
/// Uses `async_trait` to support dynamic dispatch via `Box<dyn Resolver>`;
/// Rust 2024 native async traits are not object-safe.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Returns the resolver's name (e.g. "direct", "player-config").
    fn name(&self) -> &str;

    /// Returns the resolver's priority level.
    fn priority(&self) -> ResolverPriority;

    /// Returns true if this resolver should own resolution of the URL.
    fn can_handle(&self, url: &str) -> bool;

    /// Resolves the page URL into a direct media URL, routing any page fetch
    /// through `proxy` when one was chosen for this admission.
    async fn resolve(
        &self,
        url: &str,
        proxy: Option<&ProxyRoute>,
    ) -> Result<ResolvedMedia, ResolveError>;
}

/// Priority-ordered resolver collection.
pub struct ResolverRegistry {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl ResolverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Registers a resolver, keeping the collection priority-sorted
    /// (stable, so same-priority resolvers stay in registration order).
    pub fn register(&mut self, resolver: Box<dyn Resolver>) {
        self.resolvers.push(resolver);
        self.resolvers.sort_by_key(|r| r.priority());
    }

    /// Resolves a source URL with the first resolver that accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Unsupported`] when no resolver accepts the
    /// URL, or the owning resolver's error otherwise.
    pub async fn resolve(
        &self,
        url: &str,
        proxy: Option<&ProxyRoute>,
    ) -> Result<ResolvedMedia, ResolveError> {
        for resolver in &self.resolvers {
            if resolver.can_handle(url) {
                return resolver.resolve(url, proxy).await;
            }
        }
        Err(ResolveError::Unsupported {
            url: url.to_string(),
        })
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        build_default_registry()
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.resolvers.iter().map(|r| r.name()).collect();
        f.debug_struct("ResolverRegistry")
            .field("resolvers", &names)
            .finish()
    }
}

/// Builds the registry used by the scheduler: direct passthrough first, then
/// the player-config page scan.
#[must_use]
pub fn build_default_registry() -> ResolverRegistry {
    let mut registry = ResolverRegistry::new();
    registry.register(Box::new(PlayerConfigResolver::new()));
    registry.register(Box::new(DirectResolver::new()));
    registry
}
