//! Integration tests for the streaming transfer engine against a mock host.

mod support;

use std::time::Duration;

use animedl_core::download::{TransferEngine, TransferOutcome, TransferRequest};
use animedl_core::TransferError;
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{mount_media, mount_resumable_media};

fn request_for(server: &MockServer, route: &str, dest: std::path::PathBuf) -> TransferRequest {
    TransferRequest {
        media_url: format!("{}{route}", server.uri()),
        referer: None,
        dest_path: dest,
        resume_from: 0,
        proxy: None,
    }
}

#[tokio::test]
async fn test_transfer_streams_file_to_destination() {
    let server = MockServer::start().await;
    let content = b"0123456789abcdef";
    mount_media(&server, "/ep1.mp4", content).await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("ep1.mp4");
    let (_tx, rx) = watch::channel(false);

    let engine = TransferEngine::new();
    let outcome = engine
        .transfer(request_for(&server, "/ep1.mp4", dest.clone()), rx, |_| {})
        .await
        .unwrap();

    match outcome {
        TransferOutcome::Completed {
            bytes_downloaded,
            bytes_total,
        } => {
            assert_eq!(bytes_downloaded, content.len() as u64);
            assert_eq!(bytes_total, content.len() as u64);
        }
        TransferOutcome::Cancelled => panic!("transfer should complete"),
    }
    assert_eq!(std::fs::read(&dest).unwrap(), content);
}

#[tokio::test]
async fn test_transfer_reports_monotonic_progress() {
    let server = MockServer::start().await;
    let content = vec![7u8; 64 * 1024];
    mount_media(&server, "/big.mp4", &content).await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("big.mp4");
    let (_tx, rx) = watch::channel(false);

    let mut samples: Vec<(f64, u64)> = Vec::new();
    let engine = TransferEngine::new();
    engine
        .transfer(request_for(&server, "/big.mp4", dest), rx, |progress| {
            samples.push((progress.percent, progress.bytes_downloaded));
        })
        .await
        .unwrap();

    assert!(!samples.is_empty(), "at least one sample per chunk");
    for window in samples.windows(2) {
        assert!(window[1].0 >= window[0].0, "percent never decreases");
        assert!(window[1].1 >= window[0].1, "bytes never decrease");
    }
    let last = samples.last().unwrap();
    assert!((last.0 - 100.0).abs() < f64::EPSILON);
    assert_eq!(last.1, content.len() as u64);
}

#[tokio::test]
async fn test_transfer_resumes_partial_file_with_byte_range() {
    let server = MockServer::start().await;
    let content = b"the full episode payload";
    let offset = 9usize;
    mount_resumable_media(&server, "/ep2.mp4", content, offset).await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("ep2.mp4");
    std::fs::write(&dest, &content[..offset]).unwrap();

    let (_tx, rx) = watch::channel(false);
    let engine = TransferEngine::new();
    let mut request = request_for(&server, "/ep2.mp4", dest.clone());
    request.resume_from = offset as u64;
    let outcome = engine.transfer(request, rx, |_| {}).await.unwrap();

    match outcome {
        TransferOutcome::Completed {
            bytes_downloaded,
            bytes_total,
        } => {
            // Resumed bytes count toward both figures.
            assert_eq!(bytes_downloaded, content.len() as u64);
            assert_eq!(bytes_total, content.len() as u64);
        }
        TransferOutcome::Cancelled => panic!("transfer should complete"),
    }
    assert_eq!(std::fs::read(&dest).unwrap(), content);
}

#[tokio::test]
async fn test_transfer_restarts_from_zero_when_host_ignores_range() {
    let server = MockServer::start().await;
    let content = b"full body from a host without range support";
    // Plain 200 regardless of the Range header.
    mount_media(&server, "/ep3.mp4", content).await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("ep3.mp4");
    std::fs::write(&dest, b"stale partial bytes").unwrap();

    let (_tx, rx) = watch::channel(false);
    let engine = TransferEngine::new();
    let mut request = request_for(&server, "/ep3.mp4", dest.clone());
    request.resume_from = 19;
    let outcome = engine.transfer(request, rx, |_| {}).await.unwrap();

    match outcome {
        TransferOutcome::Completed {
            bytes_downloaded, ..
        } => assert_eq!(bytes_downloaded, content.len() as u64),
        TransferOutcome::Cancelled => panic!("transfer should complete"),
    }
    // The stale partial was truncated, not appended to.
    assert_eq!(std::fs::read(&dest).unwrap(), content);
}

#[tokio::test]
async fn test_transfer_sends_referer_when_present() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/guarded.mp4"))
        .and(header("referer", "https://video.host/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("guarded.mp4");
    let (_tx, rx) = watch::channel(false);

    let engine = TransferEngine::new();
    let mut request = request_for(&server, "/guarded.mp4", dest);
    request.referer = Some("https://video.host/".to_string());
    engine.transfer(request, rx, |_| {}).await.unwrap();
}

#[tokio::test]
async fn test_transfer_http_error_keeps_partial_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("gone.mp4");
    std::fs::write(&dest, b"partial").unwrap();

    let (_tx, rx) = watch::channel(false);
    let engine = TransferEngine::new();
    let result = engine
        .transfer(request_for(&server, "/gone.mp4", dest.clone()), rx, |_| {})
        .await;

    assert!(matches!(
        result,
        Err(TransferError::HttpStatus { status: 404, .. })
    ));
    // Failure never deletes what is already on disk.
    assert_eq!(std::fs::read(&dest).unwrap(), b"partial");
}

#[tokio::test]
async fn test_transfer_cancel_during_response_wait_returns_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![1u8; 1024])
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("slow.mp4");
    let (tx, rx) = watch::channel(false);

    let engine = TransferEngine::new();
    let request = request_for(&server, "/slow.mp4", dest.clone());
    let transfer = tokio::spawn(async move { engine.transfer(request, rx, |_| {}).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(true).unwrap();

    let outcome = transfer.await.unwrap().unwrap();
    assert!(matches!(outcome, TransferOutcome::Cancelled));
    // No bytes were written after the abort.
    let written = std::fs::metadata(&dest).map(|m| m.len()).unwrap_or(0);
    assert_eq!(written, 0);
}
