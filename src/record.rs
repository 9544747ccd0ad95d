//! Download record types and status definitions.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Status of a download record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Waiting in the pending queue for a concurrency slot.
    Queued,
    /// Admitted; the source page is being resolved to a media URL.
    Resolving,
    /// The transfer is streaming bytes to disk.
    Downloading,
    /// The transfer was interrupted on request and can be resumed.
    Paused,
    /// The file was fully written.
    Completed,
    /// Resolution or transfer failed; see the record's error detail.
    Failed,
    /// The record was cancelled and its partial file removed.
    Cancelled,
}

impl DownloadStatus {
    /// Returns the wire/string representation used in status output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Resolving => "resolving",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true for states that end a record's lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true for states that occupy a concurrency slot.
    ///
    /// Paused and terminal records remain visible in the active set but do
    /// not count against the simultaneous-transfer cap.
    #[must_use]
    pub fn occupies_slot(&self) -> bool {
        matches!(self, Self::Resolving | Self::Downloading)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "resolving" => Ok(Self::Resolving),
            "downloading" => Ok(Self::Downloading),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid download status: {s}")),
        }
    }
}

/// Mutable state tracking one requested transfer.
///
/// The scheduler owns the authoritative copy; `list_all`/`get` hand out
/// clones so pollers never observe a half-updated record. The cancellation
/// handle lives beside the record inside the scheduler and is never exposed.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadRecord {
    /// Unique monotonic identifier for the process lifetime.
    pub id: u64,
    /// Series title as submitted.
    pub title: String,
    /// Season number.
    pub season: u32,
    /// Episode number.
    pub episode: u32,
    /// Audio/subtitle language tag as submitted.
    pub language: String,
    /// Opaque video-host page URL the record was submitted with.
    pub source_url: String,
    /// Direct media URL, known once resolution succeeds.
    pub media_url: Option<String>,
    /// Planned destination file path.
    pub dest_path: PathBuf,
    /// Current lifecycle status.
    pub status: DownloadStatus,
    /// Transfer progress in percent, within [0, 100].
    pub progress: f64,
    /// Bytes written to the destination so far (including resumed bytes).
    pub bytes_downloaded: u64,
    /// Expected total size, unknown until the transfer response arrives.
    pub bytes_total: Option<u64>,
    /// Rolling throughput estimate in bytes per second.
    pub bytes_per_sec: f64,
    /// Display form of the proxy route assigned at the last admission.
    pub proxy: Option<String>,
    /// Error detail for failed records.
    pub error: Option<String>,
    /// Submission time as Unix seconds.
    pub added_at_unix: u64,
}

impl DownloadRecord {
    /// Creates a freshly queued record.
    #[must_use]
    pub fn new(
        id: u64,
        title: String,
        season: u32,
        episode: u32,
        language: String,
        source_url: String,
        dest_path: PathBuf,
    ) -> Self {
        let added_at_unix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            id,
            title,
            season,
            episode,
            language,
            source_url,
            media_url: None,
            dest_path,
            status: DownloadStatus::Queued,
            progress: 0.0,
            bytes_downloaded: 0,
            bytes_total: None,
            bytes_per_sec: 0.0,
            proxy: None,
            error: None,
            added_at_unix,
        }
    }
}
