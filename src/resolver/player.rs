//! Resolver for pages embedding a `player.src` configuration.
//!
//! Video hosts of this family serve an HTML page whose inline script hands
//! the media path to the player as
//! `player.src([{src: "/v/1234.mp4", type: "video/mp4"}…`. The resolver
//! fetches the page once with browser-like headers and a referer pinned to
//! the host's own origin, applies that single structural pattern, and joins
//! the captured path against the origin. No second pattern and no retry: if
//! the layout changed or the content is blocked, resolution fails.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::REFERER;
use tracing::{debug, instrument};
use url::Url;

use crate::proxy::ProxyRoute;

use super::http_client::build_resolver_client;
use super::{ResolveError, ResolvedMedia, Resolver, ResolverPriority};

fn player_src_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r#"player\.src\(\[\{src:\s*"([^"]+)",\s*type:\s*"video/mp4"\}"#)
            .expect("static player.src pattern is valid")
    })
}

/// Extracts the media path from a player page body.
///
/// Exposed within the module so the pattern is testable without a server.
fn extract_media_path(body: &str) -> Option<&str> {
    player_src_regex()
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Fallback resolver for any http(s) page with an embedded player config.
#[derive(Debug, Default)]
pub struct PlayerConfigResolver;

impl PlayerConfigResolver {
    /// Creates the resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Resolver for PlayerConfigResolver {
    fn name(&self) -> &str {
        "player-config"
    }

    fn priority(&self) -> ResolverPriority {
        ResolverPriority::Fallback
    }

    fn can_handle(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    #[instrument(level = "debug", skip(self, proxy), fields(resolver = self.name()))]
    async fn resolve(
        &self,
        url: &str,
        proxy: Option<&ProxyRoute>,
    ) -> Result<ResolvedMedia, ResolveError> {
        let page_url = Url::parse(url).map_err(|_| ResolveError::invalid_url(url))?;
        let origin = page_url.origin().ascii_serialization();
        let referer = format!("{origin}/");

        let client = build_resolver_client(proxy)?;
        let response = client
            .get(page_url.clone())
            .header(REFERER, referer.clone())
            .send()
            .await
            .map_err(|e| ResolveError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::http_status(url, status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::network(url, e))?;

        let media_path =
            extract_media_path(&body).ok_or_else(|| ResolveError::pattern_not_found(url))?;

        let media_url = Url::parse(&referer)
            .and_then(|base| base.join(media_path))
            .map_err(|_| ResolveError::invalid_url(media_path))?;

        debug!(media_url = %media_url, "extracted media URL from player configuration");
        Ok(ResolvedMedia {
            media_url: media_url.into(),
            referer: Some(referer),
        })
    }
}
