//! Shared helpers for integration tests: mock hosts and settings fixtures.

#![allow(dead_code)] // each integration test binary uses a subset

use std::path::PathBuf;
use std::time::Duration;

use animedl_core::{
    DownloadStatus, Scheduler, SchedulerOptions, Settings, SettingsHandle,
    build_default_registry,
};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Settings rooted in a temp directory with a given concurrency limit.
pub fn settings_in(temp: &TempDir, limit: usize) -> SettingsHandle {
    let mut settings = Settings::default();
    settings.download_path = temp.path().to_path_buf();
    settings.simultaneous_downloads = limit;
    SettingsHandle::new(settings)
}

/// Scheduler with the default resolvers and a short grace window so tests
/// can observe evictions without waiting out the production value.
pub fn test_scheduler(settings: SettingsHandle, grace_ms: u64) -> Scheduler {
    Scheduler::with_parts(
        settings,
        build_default_registry(),
        SchedulerOptions {
            grace_window: Duration::from_millis(grace_ms),
        },
    )
}

/// Mounts a media file at `route` served whole with a 200.
pub async fn mount_media(server: &MockServer, route: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

/// Mounts a media file that honors one specific byte-range request with a
/// 206 tail, alongside a 200 fallback for rangeless requests.
pub async fn mount_resumable_media(
    server: &MockServer,
    route: &str,
    content: &[u8],
    offset: usize,
) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("range", format!("bytes={offset}-").as_str()))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(content[offset..].to_vec()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

/// Mounts a video-host page whose body carries a player config pointing at
/// `media_src` (relative or absolute).
pub async fn mount_player_page(server: &MockServer, route: &str, media_src: &str) {
    let body = format!(
        "<html><script>player.src([{{src: \"{media_src}\", type: \"video/mp4\"}}]);</script></html>"
    );
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Polls until the record reaches `status`, with a hard timeout.
pub async fn wait_for_status(scheduler: &Scheduler, id: u64, status: DownloadStatus) {
    for _ in 0..300 {
        if scheduler.get(id).map(|r| r.status) == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let current = scheduler.get(id).map(|r| r.status);
    panic!("record {id} never reached {status:?}; currently {current:?}");
}

/// Polls until the record is gone from both the active set and the queue.
pub async fn wait_for_eviction(scheduler: &Scheduler, id: u64) {
    for _ in 0..300 {
        if scheduler.get(id).is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("record {id} was never evicted");
}

/// The destination path the default templates produce under `root`.
pub fn expected_dest(
    root: &std::path::Path,
    title: &str,
    season: u32,
    episode: u32,
    language: &str,
) -> PathBuf {
    use animedl_core::download::dest::{TemplateVars, plan_destination};
    let settings = Settings::default();
    let vars = TemplateVars::new(title, season, episode, language);
    plan_destination(
        root,
        &settings.folder_template,
        &settings.filename_template,
        &vars,
    )
}
