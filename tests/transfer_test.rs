use partdl::cli::VerifyMode;
use partdl::coordinator::TransferCoordinator;
use partdl::downloader::Downloader;
use partdl::plan::{self, RangeSpec};
use partdl::probe;
use partdl::providers::DownloadItem;
use partdl::state::TransferJob;
use partdl::TransferConfig;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FILE: &str = "/org/model/resolve/main/model.bin";

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn quick_config(parts: u64) -> TransferConfig {
    TransferConfig {
        parts,
        attempts: 2,
        backoff: Duration::from_millis(5),
        attempt_timeout: Duration::from_secs(10),
        ..TransferConfig::default()
    }
}

/// Serves `data` at `FILE`: HEAD for the size and one mock per range.
///
/// Later ranges answer sooner so segments complete in reverse order.
/// The range at `failing` always answers 500.
async fn serve(server: &MockServer, data: &[u8], ranges: &[RangeSpec], failing: Option<usize>) {
    Mock::given(method("HEAD"))
        .and(path(FILE))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(data.to_vec()))
        .mount(server)
        .await;

    for range in ranges {
        let template = if failing == Some(range.index) {
            ResponseTemplate::new(500)
        } else {
            let body = data[range.start as usize..=range.end as usize].to_vec();
            ResponseTemplate::new(206)
                .set_body_bytes(body)
                .set_delay(Duration::from_millis(20 * (ranges.len() - range.index) as u64))
        };
        Mock::given(method("GET"))
            .and(path(FILE))
            .and(header("Range", range.header_value().as_str()))
            .respond_with(template)
            .mount(server)
            .await;
    }
}

fn part_path(dir: &Path, n: usize) -> std::path::PathBuf {
    dir.join(format!("model.bin.part{n}"))
}

#[tokio::test]
async fn test_segments_reassemble_byte_for_byte() {
    let server = MockServer::start().await;
    let data = payload(1003);
    let plan = plan::plan(data.len() as u64, 5);
    serve(&server, &data, &plan.ranges, None).await;

    let dir = tempdir().unwrap();
    let url = format!("{}{}", server.uri(), FILE);
    let client = reqwest::Client::new();

    let size = probe::probe(&client, &url).await.unwrap();
    assert_eq!(size, 1003);

    let dest = dir.path().join("model.bin");
    let job = TransferJob::new(&url, &dest, size, plan.part_count()).unwrap();
    let coordinator = TransferCoordinator::new(client, quick_config(5));

    let outcome = coordinator.run(&job, &plan.ranges).await;

    assert!(outcome.succeeded, "{}", outcome.summary());
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.bytes_written, 1003);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
    for n in 1..=5 {
        assert!(!part_path(dir.path(), n).exists(), "part{n} should be removed");
    }
}

#[tokio::test]
async fn test_failed_segment_blocks_assembly_and_keeps_siblings() {
    let server = MockServer::start().await;
    let data = payload(500);
    let plan = plan::plan(500, 5);
    serve(&server, &data, &plan.ranges, Some(1)).await;

    let dir = tempdir().unwrap();
    let url = format!("{}{}", server.uri(), FILE);
    let dest = dir.path().join("model.bin");
    let job = TransferJob::new(&url, &dest, 500, 5).unwrap();
    let coordinator = TransferCoordinator::new(reqwest::Client::new(), quick_config(5));

    let outcome = coordinator.run(&job, &plan.ranges).await;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].range, plan.ranges[1]);
    assert!(outcome.failures[0].reason.contains("500"));
    assert_eq!(outcome.bytes_written, 0);

    assert!(!dest.exists(), "no assembly after a failure");
    assert!(!part_path(dir.path(), 2).exists());
    for n in [1, 3, 4, 5] {
        let part = part_path(dir.path(), n);
        assert!(part.exists(), "part{n} should be kept for recovery");
        assert_eq!(tokio::fs::metadata(&part).await.unwrap().len(), 100);
    }
}

#[tokio::test]
async fn test_concurrent_fetches_cover_whole_resource() {
    let server = MockServer::start().await;
    let data = payload(4096);
    let plan = plan::plan(4096, 8);
    serve(&server, &data, &plan.ranges, None).await;

    let dir = tempdir().unwrap();
    let url = format!("{}{}", server.uri(), FILE);
    let job = TransferJob::new(&url, dir.path().join("model.bin"), 4096, 8).unwrap();
    let coordinator = TransferCoordinator::new(reqwest::Client::new(), quick_config(8));

    let segments = coordinator.fetch_all(&job, &plan.ranges).await;

    assert_eq!(segments.len(), 8);
    assert!(segments.iter().all(|s| s.is_complete()));
    let total: u64 = segments.iter().map(|s| s.bytes_written).sum();
    assert_eq!(total, 4096);

    let mut indices: Vec<usize> = segments.iter().map(|s| s.range.index).collect();
    indices.sort_unstable();
    assert_eq!(indices, (0..8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_capped_pool_still_fetches_every_part() {
    let server = MockServer::start().await;
    let data = payload(300);
    let plan = plan::plan(300, 6);
    serve(&server, &data, &plan.ranges, None).await;

    let dir = tempdir().unwrap();
    let url = format!("{}{}", server.uri(), FILE);
    let dest = dir.path().join("model.bin");
    let job = TransferJob::new(&url, &dest, 300, 6).unwrap();
    let config = TransferConfig {
        max_workers: Some(2),
        ..quick_config(6)
    };
    let coordinator = TransferCoordinator::new(reqwest::Client::new(), config);

    let outcome = coordinator.run(&job, &plan.ranges).await;

    assert!(outcome.succeeded);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
}

#[tokio::test]
async fn test_single_part_behaves_like_plain_download() {
    let server = MockServer::start().await;
    let data = payload(77);
    let plan = plan::plan(77, 1);
    assert_eq!(plan.ranges, vec![RangeSpec { index: 0, start: 0, end: 76 }]);
    serve(&server, &data, &plan.ranges, None).await;

    let dir = tempdir().unwrap();
    let url = format!("{}{}", server.uri(), FILE);
    let dest = dir.path().join("model.bin");
    let job = TransferJob::new(&url, &dest, 77, 1).unwrap();
    let coordinator = TransferCoordinator::new(reqwest::Client::new(), quick_config(1));

    let outcome = coordinator.run(&job, &plan.ranges).await;

    assert!(outcome.succeeded);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
}

#[tokio::test]
async fn test_downloader_verifies_hash_and_skips_existing() {
    let server = MockServer::start().await;
    let data = payload(640);
    let plan = plan::plan(640, 5);
    serve(&server, &data, &plan.ranges, None).await;

    let dir = tempdir().unwrap();
    let item = DownloadItem {
        url: format!("{}{}", server.uri(), FILE),
        hash: Some(hex::encode(Sha256::digest(&data))),
        path: None,
    };
    let downloader = Downloader::new(dir.path().to_path_buf(), quick_config(5), VerifyMode::Auto).unwrap();

    let outcome = downloader.download_file(&item).await;
    assert!(outcome.succeeded, "{}", outcome.summary());
    assert_eq!(outcome.sha256, item.hash);
    assert_eq!(tokio::fs::read(dir.path().join("model.bin")).await.unwrap(), data);

    let again = downloader.download_file(&item).await;
    assert!(again.succeeded);
    assert!(again.skipped);
    assert_eq!(again.bytes_written, 640);
}

#[tokio::test]
async fn test_hash_mismatch_fails_job_and_removes_file() {
    let server = MockServer::start().await;
    let data = payload(256);
    let plan = plan::plan(256, 5);
    serve(&server, &data, &plan.ranges, None).await;

    let dir = tempdir().unwrap();
    let item = DownloadItem {
        url: format!("{}{}", server.uri(), FILE),
        hash: Some("00".repeat(32)),
        path: None,
    };
    let downloader = Downloader::new(dir.path().to_path_buf(), quick_config(5), VerifyMode::Auto).unwrap();

    let outcome = downloader.download_file(&item).await;

    assert!(!outcome.succeeded);
    assert!(outcome.error.as_deref().unwrap().contains("Hash mismatch"));
    assert!(!dir.path().join("model.bin").exists());
}

#[tokio::test]
async fn test_unknown_size_skips_only_that_job() {
    let server = MockServer::start().await;
    let data = payload(120);
    let plan = plan::plan(120, 5);
    serve(&server, &data, &plan.ranges, None).await;
    Mock::given(method("HEAD"))
        .and(path("/org/model/resolve/main/gone.bin"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let downloader = Downloader::new(dir.path().to_path_buf(), quick_config(5), VerifyMode::Off).unwrap();
    let items = [
        DownloadItem {
            url: format!("{}/org/model/resolve/main/gone.bin", server.uri()),
            hash: None,
            path: None,
        },
        DownloadItem {
            url: format!("{}{}", server.uri(), FILE),
            hash: None,
            path: None,
        },
    ];

    let mut outcomes = Vec::new();
    for item in &items {
        outcomes.push(downloader.download_file(item).await);
    }

    assert!(!outcomes[0].succeeded);
    assert!(outcomes[0].error.as_deref().unwrap().contains("unable to determine size"));
    assert!(outcomes[0].failures.is_empty());
    assert!(outcomes[1].succeeded);
    assert_eq!(tokio::fs::read(dir.path().join("model.bin")).await.unwrap(), data);
}

#[tokio::test]
async fn test_missing_segment_at_assembly_is_a_range_failure() {
    let server = MockServer::start().await;
    let data = payload(500);
    let plan = plan::plan(500, 5);
    serve(&server, &data, &plan.ranges, None).await;

    let dir = tempdir().unwrap();
    let url = format!("{}{}", server.uri(), FILE);
    let dest = dir.path().join("model.bin");
    let job = TransferJob::new(&url, &dest, 500, 5).unwrap();
    let coordinator = TransferCoordinator::new(reqwest::Client::new(), quick_config(5));

    let segments = coordinator.fetch_all(&job, &plan.ranges).await;
    assert!(segments.iter().all(|s| s.is_complete()));
    tokio::fs::remove_file(part_path(dir.path(), 2)).await.unwrap();

    let outcome = coordinator.complete(&job, segments).await;

    assert!(!outcome.succeeded);
    assert!(outcome.error.is_none());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].range, plan.ranges[1]);
    assert!(outcome.failures[0].reason.contains("is missing"));
    assert_eq!(outcome.bytes_written, 0);
    // Part 1 was appended before the gap was found; nothing is rolled back.
    assert_eq!(tokio::fs::metadata(&dest).await.unwrap().len(), 100);
}

#[tokio::test]
async fn test_unwritable_destination_is_a_job_error() {
    let server = MockServer::start().await;
    let data = payload(200);
    let plan = plan::plan(200, 2);
    serve(&server, &data, &plan.ranges, None).await;

    let dir = tempdir().unwrap();
    let url = format!("{}{}", server.uri(), FILE);
    let dest = dir.path().join("model.bin");
    // A directory in the way makes creating the destination fail.
    tokio::fs::create_dir(&dest).await.unwrap();
    let job = TransferJob::new(&url, &dest, 200, 2).unwrap();
    let coordinator = TransferCoordinator::new(reqwest::Client::new(), quick_config(2));

    let outcome = coordinator.run(&job, &plan.ranges).await;

    assert!(!outcome.succeeded);
    assert!(outcome.failures.is_empty());
    assert!(outcome.error.as_deref().unwrap().contains("failed assembling"));
    for n in 1..=2 {
        assert!(part_path(dir.path(), n).exists(), "part{n} should be kept");
    }
}

#[tokio::test]
async fn test_truncated_existing_file_is_downloaded_again() {
    let server = MockServer::start().await;
    let data = payload(640);
    let plan = plan::plan(640, 5);
    serve(&server, &data, &plan.ranges, None).await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("model.bin");
    tokio::fs::write(&dest, &data[..100]).await.unwrap();

    let item = DownloadItem {
        url: format!("{}{}", server.uri(), FILE),
        hash: None,
        path: None,
    };
    let downloader = Downloader::new(dir.path().to_path_buf(), quick_config(5), VerifyMode::Auto).unwrap();

    let outcome = downloader.download_file(&item).await;

    assert!(outcome.succeeded, "{}", outcome.summary());
    assert!(!outcome.skipped);
    assert_eq!(outcome.bytes_written, 640);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
}

#[tokio::test]
async fn test_nested_repository_paths_do_not_collide() {
    let server = MockServer::start().await;
    let data = payload(300);
    let plan = plan::plan(300, 3);
    serve(&server, &data, &plan.ranges, None).await;

    let dir = tempdir().unwrap();
    let url = format!("{}{}", server.uri(), FILE);
    let downloader = Downloader::new(dir.path().to_path_buf(), quick_config(3), VerifyMode::Off).unwrap();
    let items = [
        DownloadItem {
            url: url.clone(),
            hash: None,
            path: Some("onnx/model.bin".into()),
        },
        DownloadItem {
            url,
            hash: None,
            path: Some("model.bin".into()),
        },
    ];

    let nested = downloader.download_file(&items[0]).await;
    let flat = downloader.download_file(&items[1]).await;

    assert!(nested.succeeded, "{}", nested.summary());
    assert!(flat.succeeded, "{}", flat.summary());
    assert!(!flat.skipped, "a nested file must not shadow the flat one");
    assert_eq!(nested.destination, dir.path().join("onnx").join("model.bin"));
    assert_eq!(tokio::fs::read(dir.path().join("onnx/model.bin")).await.unwrap(), data);
    assert_eq!(tokio::fs::read(dir.path().join("model.bin")).await.unwrap(), data);
}

#[tokio::test]
async fn test_escaping_repository_path_is_rejected() {
    let dir = tempdir().unwrap();
    let downloader = Downloader::new(dir.path().to_path_buf(), quick_config(2), VerifyMode::Off).unwrap();
    let item = DownloadItem {
        url: "http://127.0.0.1:9/model.bin".into(),
        hash: None,
        path: Some("../outside.bin".into()),
    };

    let outcome = downloader.download_file(&item).await;

    assert!(!outcome.succeeded);
    assert!(outcome.error.as_deref().unwrap().contains("Unsafe repository path"));
}
