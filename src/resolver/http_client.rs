//! Shared HTTP client construction for resolvers.
//!
//! Page fetches are short-lived and carry a hard upper time bound, unlike
//! transfers. All resolvers build through here so headers, timeouts, and
//! proxy handling stay consistent.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

use crate::download::constants::BROWSER_USER_AGENT;
use crate::proxy::ProxyRoute;

use super::ResolveError;

/// Connect timeout for page fetches.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Total request timeout for page fetches; the fixed upper bound on how long
/// a resolution may hold its concurrency slot before failing.
const TOTAL_TIMEOUT_SECS: u64 = 15;

/// Builds a resolver HTTP client, routed through `proxy` when given.
///
/// # Errors
///
/// Returns [`ResolveError::ClientBuild`] when the proxy route is unusable or
/// client construction fails.
pub fn build_resolver_client(proxy: Option<&ProxyRoute>) -> Result<Client, ResolveError> {
    let mut builder = ClientBuilder::new()
        .user_agent(BROWSER_USER_AGENT)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(TOTAL_TIMEOUT_SECS));
    if let Some(route) = proxy {
        let reqwest_proxy = route
            .to_reqwest_proxy()
            .map_err(|error| ResolveError::ClientBuild {
                detail: error.to_string(),
            })?;
        builder = builder.proxy(reqwest_proxy);
    }
    builder.build().map_err(|error| ResolveError::ClientBuild {
        detail: error.to_string(),
    })
}
