//! Transfer engine: streams a direct media URL into a destination file.
//!
//! One [`TransferEngine::transfer`] call owns a single transfer end to end:
//! optional byte-range resume, per-chunk progress reporting with a rolling
//! throughput estimate, and cooperative cancellation observed between chunks.
//! The engine never retries and never deletes partial files; those policies
//! belong to the scheduler.

use std::path::PathBuf;
use std::time::Instant;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, RANGE, REFERER};
use reqwest::{ClientBuilder, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use crate::proxy::ProxyRoute;

use super::constants::{BROWSER_USER_AGENT, CONNECT_TIMEOUT_SECS, THROUGHPUT_WINDOW};
use super::error::TransferError;

/// Inputs for one transfer attempt.
#[derive(Debug)]
pub struct TransferRequest {
    /// Direct, fetchable media URL.
    pub media_url: String,
    /// Referer pinned by the resolver, if the host requires one.
    pub referer: Option<String>,
    /// Destination file path (parent directories must already exist).
    pub dest_path: PathBuf,
    /// Bytes already on disk; a value above zero requests a byte range.
    pub resume_from: u64,
    /// Egress route chosen at admission, if any.
    pub proxy: Option<ProxyRoute>,
}

/// Progress sample delivered to the callback on every received chunk.
#[derive(Debug, Clone, Copy)]
pub struct TransferProgress {
    /// Percent complete in [0, 100]; 0 while the total is unknown.
    pub percent: f64,
    /// Bytes on disk so far, including any resumed prefix.
    pub bytes_downloaded: u64,
    /// Expected total bytes when the server reported a content length.
    pub bytes_total: Option<u64>,
    /// Rolling throughput estimate in bytes per second.
    pub bytes_per_sec: f64,
}

/// How a transfer ended when no error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The body was fully streamed and flushed.
    Completed {
        /// Final size of the destination file.
        bytes_downloaded: u64,
        /// Total size derived from the response (equals `bytes_downloaded`
        /// when the server sent no content length).
        bytes_total: u64,
    },
    /// The cancellation signal fired; the partial file is left untouched.
    ///
    /// Callers must never classify this outcome as a failure.
    Cancelled,
}

/// Streams direct media URLs to disk.
///
/// The engine is stateless between calls; each transfer builds its own HTTP
/// client so the admission-chosen proxy route applies to that transfer only.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    connect_timeout_secs: u64,
}

impl Default for TransferEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferEngine {
    /// Creates an engine with the default connect timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
        }
    }

    /// Creates an engine with an explicit connect timeout (tests).
    #[must_use]
    pub fn with_connect_timeout(connect_timeout_secs: u64) -> Self {
        Self {
            connect_timeout_secs,
        }
    }

    /// Streams `request.media_url` into `request.dest_path`.
    ///
    /// Resume contract: when `resume_from > 0` a `Range` request is issued.
    /// If the server answers 206 the file is opened in append mode; any other
    /// success status discards the resume assumption, the file is rewritten
    /// from byte 0, and the total is recomputed from the full content length.
    ///
    /// Cancellation is observed before the request and at every chunk
    /// boundary; once the signal fires no further bytes are written and the
    /// call resolves [`TransferOutcome::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] for invalid URLs, client construction
    /// failures, non-success statuses, and network or file I/O errors. The
    /// partial file is left on disk for all failure paths.
    #[instrument(
        level = "debug",
        skip(self, request, cancel, on_progress),
        fields(url = %request.media_url, dest = %request.dest_path.display())
    )]
    pub async fn transfer<F>(
        &self,
        request: TransferRequest,
        mut cancel: watch::Receiver<bool>,
        mut on_progress: F,
    ) -> Result<TransferOutcome, TransferError>
    where
        F: FnMut(TransferProgress) + Send,
    {
        url::Url::parse(&request.media_url).map_err(|_| TransferError::InvalidUrl {
            url: request.media_url.clone(),
        })?;

        // Pause/cancel may land before the first byte; honor it without
        // touching the network or the destination file.
        if *cancel.borrow() {
            debug!("transfer cancelled before the request was sent");
            return Ok(TransferOutcome::Cancelled);
        }

        let client = self.build_client(request.proxy.as_ref())?;

        let mut http_request = client
            .get(&request.media_url)
            .header(ACCEPT, "*/*")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");
        if let Some(referer) = &request.referer {
            http_request = http_request.header(REFERER, referer.clone());
        }
        if request.resume_from > 0 {
            http_request = http_request.header(RANGE, format!("bytes={}-", request.resume_from));
        }

        let response = http_request.send().await.map_err(|e| {
            TransferError::network(&request.media_url, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::http_status(
                &request.media_url,
                status.as_u16(),
            ));
        }

        // A ranged request answered with anything but 206 means the server
        // sent the whole body; the resume assumption no longer holds.
        let resumed = request.resume_from > 0 && status == StatusCode::PARTIAL_CONTENT;
        if request.resume_from > 0 && !resumed {
            debug!(
                status = status.as_u16(),
                "server ignored the byte range; restarting from byte 0"
            );
        }
        let offset = if resumed { request.resume_from } else { 0 };
        let bytes_total = response.content_length().map(|len| len + offset);

        // A cancel may have landed while waiting for the response headers;
        // honor it before the destination file is created or truncated.
        if *cancel.borrow() {
            debug!("transfer cancelled before the first byte was written");
            return Ok(TransferOutcome::Cancelled);
        }

        let file = if resumed {
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&request.dest_path)
                .await
                .map_err(|e| TransferError::io(request.dest_path.clone(), e))?
        } else {
            File::create(&request.dest_path)
                .await
                .map_err(|e| TransferError::io(request.dest_path.clone(), e))?
        };

        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut downloaded = offset;
        let mut window_start = Instant::now();
        let mut window_base = downloaded;
        let mut bytes_per_sec = 0.0;

        loop {
            let next = tokio::select! {
                biased;
                () = signalled(&mut cancel) => {
                    // Dropping the writer and the response stream aborts the
                    // inbound body; no further bytes reach the file.
                    debug!(bytes = downloaded, "transfer cancelled mid-stream");
                    return Ok(TransferOutcome::Cancelled);
                }
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| TransferError::network(&request.media_url, e))?;

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| TransferError::io(request.dest_path.clone(), e))?;
            downloaded += chunk.len() as u64;

            let elapsed = window_start.elapsed();
            if elapsed >= THROUGHPUT_WINDOW {
                bytes_per_sec = (downloaded - window_base) as f64 / elapsed.as_secs_f64();
                window_start = Instant::now();
                window_base = downloaded;
            }

            on_progress(TransferProgress {
                percent: percent_of(downloaded, bytes_total),
                bytes_downloaded: downloaded,
                bytes_total,
                bytes_per_sec,
            });
        }

        writer
            .flush()
            .await
            .map_err(|e| TransferError::io(request.dest_path.clone(), e))?;

        info!(
            bytes = downloaded,
            resumed,
            "transfer complete"
        );
        Ok(TransferOutcome::Completed {
            bytes_downloaded: downloaded,
            bytes_total: bytes_total.unwrap_or(downloaded),
        })
    }

    fn build_client(&self, proxy: Option<&ProxyRoute>) -> Result<reqwest::Client, TransferError> {
        let mut builder = ClientBuilder::new()
            .user_agent(BROWSER_USER_AGENT)
            .connect_timeout(std::time::Duration::from_secs(self.connect_timeout_secs));
        if let Some(route) = proxy {
            let reqwest_proxy = route.to_reqwest_proxy().map_err(|error| {
                TransferError::ClientBuild {
                    detail: error.to_string(),
                }
            })?;
            builder = builder.proxy(reqwest_proxy);
        }
        builder.build().map_err(|error| TransferError::ClientBuild {
            detail: error.to_string(),
        })
    }
}

/// Resolves once the cancel signal reads true; pends forever otherwise.
async fn signalled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone without signalling: this transfer can no longer be
            // cancelled, so the race must be won by the data arm.
            std::future::pending::<()>().await;
        }
    }
}

fn percent_of(downloaded: u64, total: Option<u64>) -> f64 {
    match total {
        Some(total) if total > 0 => ((downloaded as f64 / total as f64) * 100.0).min(100.0),
        _ => 0.0,
    }
}
