//! Progress UI (spinner) for queue runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use animedl_core::{DownloadStatus, Scheduler};
use indicatif::{ProgressBar, ProgressStyle};

/// Spawns the progress UI (spinner) when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    scheduler: Scheduler,
    total: usize,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(scheduler, total, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_spinner_inner(
    scheduler: Scheduler,
    total: usize,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            let records = scheduler.list_all();
            let done = records
                .iter()
                .filter(|record| record.status.is_terminal())
                .count();
            let message = records
                .iter()
                .find(|record| record.status == DownloadStatus::Downloading)
                .map(|record| {
                    format!(
                        "[{}/{}] S{:02}E{:02} {:.1}% ({})",
                        done.saturating_add(1).min(total),
                        total,
                        record.season,
                        record.episode,
                        record.progress,
                        human_rate(record.bytes_per_sec),
                    )
                })
                .unwrap_or_else(|| format!("[{}/{}] Resolving...", done.min(total), total));
            spinner.set_message(message);
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    })
}

fn human_rate(bytes_per_sec: f64) -> String {
    if bytes_per_sec >= 1_048_576.0 {
        format!("{:.1} MiB/s", bytes_per_sec / 1_048_576.0)
    } else if bytes_per_sec >= 1024.0 {
        format!("{:.1} KiB/s", bytes_per_sec / 1024.0)
    } else {
        format!("{bytes_per_sec:.0} B/s")
    }
}
