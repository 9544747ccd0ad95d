//! CLI entry point for the animedl tool.

use std::collections::HashMap;
use std::io::IsTerminal;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use animedl_core::{
    DownloadStatus, Scheduler, Settings, SettingsHandle, SubmitRequest,
};
use tracing::{debug, info, warn};

mod cli;
mod progress;

use cli::Args;
use progress::spawn_progress_ui;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("animedl starting");

    // Settings file first, then CLI flags override it
    let mut settings = Settings::load(&args.settings)?;
    if let Some(dest) = &args.dest {
        settings.download_path.clone_from(dest);
    }
    if let Some(concurrency) = args.concurrency {
        settings.simultaneous_downloads = usize::from(concurrency);
    }
    if !args.proxies.is_empty() {
        settings.proxies.clone_from(&args.proxies);
    }
    debug!(
        download_path = %settings.download_path.display(),
        simultaneous = settings.concurrency_limit(),
        proxies = settings.proxies.len(),
        "effective settings"
    );

    let scheduler = Scheduler::new(SettingsHandle::new(settings));

    // One record per URL, episodes counting up from the starting number
    let mut ids = Vec::with_capacity(args.urls.len());
    for (offset, url) in args.urls.iter().enumerate() {
        let episode = args
            .episode
            .saturating_add(u32::try_from(offset).unwrap_or(u32::MAX));
        let id = scheduler
            .submit(SubmitRequest {
                title: args.title.clone(),
                season: args.season,
                episode,
                language: args.language.clone(),
                source_url: url.clone(),
            })
            .await?;
        debug!(id, url = %url, episode, "submitted");
        ids.push(id);
    }

    let use_spinner = !args.quiet && std::io::stderr().is_terminal();
    let (spinner, stop) = spawn_progress_ui(use_spinner, scheduler.clone(), ids.len());

    let (completed, failed) = drain_queue(&scheduler, &ids).await;

    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = spinner {
        let _ = handle.await;
    }

    info!(completed, failed, total = ids.len(), "queue drained");

    if failed > 0 {
        anyhow::bail!("{failed} of {} downloads failed", ids.len());
    }
    Ok(())
}

/// Polls until every submitted record reaches a final state; returns
/// (completed, failed) counts.
///
/// Terminal records are evicted after a grace window, so each final status
/// is captured the first time it is observed. A record that vanished before
/// its final state was seen counts as failed: success is only ever reported
/// from an observed completion.
async fn drain_queue(scheduler: &Scheduler, ids: &[u64]) -> (usize, usize) {
    let mut finals: HashMap<u64, DownloadStatus> = HashMap::new();
    while finals.len() < ids.len() {
        for record in scheduler.list_all() {
            if record.status.is_terminal() && !finals.contains_key(&record.id) {
                if record.status == DownloadStatus::Failed {
                    warn!(
                        id = record.id,
                        error = record.error.as_deref().unwrap_or("unknown"),
                        "download failed"
                    );
                }
                finals.insert(record.id, record.status);
            }
        }
        for id in ids {
            if !finals.contains_key(id) && scheduler.get(*id).is_none() {
                warn!(id, "record evicted before its final state was observed");
                finals.insert(*id, DownloadStatus::Failed);
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let completed = finals
        .values()
        .filter(|status| **status == DownloadStatus::Completed)
        .count();
    let failed = ids.len() - completed;
    (completed, failed)
}
