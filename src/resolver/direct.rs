//! Passthrough resolver for URLs that already point at a media file.

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::proxy::ProxyRoute;

use super::{ResolveError, ResolvedMedia, Resolver, ResolverPriority};

/// File extensions treated as directly fetchable media.
const MEDIA_EXTENSIONS: [&str; 6] = [".mp4", ".m4v", ".webm", ".mkv", ".avi", ".mov"];

/// Resolver that passes direct media URLs through untouched.
///
/// Lets callers submit an already-resolved URL (mirrors, manual extraction)
/// without paying for a page fetch that would find no player configuration.
#[derive(Debug, Default)]
pub struct DirectResolver;

impl DirectResolver {
    /// Creates the resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Resolver for DirectResolver {
    fn name(&self) -> &str {
        "direct"
    }

    fn priority(&self) -> ResolverPriority {
        ResolverPriority::Specialized
    }

    fn can_handle(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        let path = parsed.path().to_ascii_lowercase();
        MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }

    async fn resolve(
        &self,
        url: &str,
        _proxy: Option<&ProxyRoute>,
    ) -> Result<ResolvedMedia, ResolveError> {
        debug!(url, "direct media URL passes through");
        Ok(ResolvedMedia {
            media_url: url.to_string(),
            referer: None,
        })
    }
}
