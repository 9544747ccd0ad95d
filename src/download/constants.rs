//! Constants for the download module (timeouts, windows, headers).

use std::time::Duration;

/// HTTP connect timeout for transfers (30 seconds).
///
/// Transfers deliberately carry no read/total timeout: a stalled connection
/// occupies its slot until it is explicitly cancelled.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Width of the rolling throughput window.
pub const THROUGHPUT_WINDOW: Duration = Duration::from_secs(1);

/// Delay before a completed/failed record is evicted from the active set,
/// so a polling client can observe the final state.
pub const GRACE_WINDOW: Duration = Duration::from_secs(5);

/// Browser-like User-Agent sent on page fetches and transfers.
///
/// Video hosts gate their player pages and media paths behind ordinary
/// browser traffic; a tool UA gets blocked outright.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
