//! End-to-end: downloader and verifier running as tasks over one
//! catalogue, driven purely through config files and watch events.

use std::{sync::Arc, time::Duration};

use gantry::{
    spawn_downloader, spawn_verifier,
    state::{
        write_json, DownloadConfig, DownloadState, DownloadStatus, GlobalConfig, ImageSha256,
        SafeName, StateDir, VerifyConfig, VerifyStatus,
    },
    watch::WatchEvent,
    PipelineDirs,
};
use gantry_fetch::mock::{MockFetcher, MockTransfer};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use url::Url;

const PAYLOAD: &[u8] = b"not really a disk image";

fn claim_of(payload: &[u8]) -> ImageSha256 {
    ImageSha256::new(hex::encode(Sha256::digest(payload))).unwrap()
}

async fn setup(base: &std::path::Path, max_space: u64) -> PipelineDirs {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let dirs = PipelineDirs::under(base);
    std::fs::create_dir_all(&dirs.catalog_root).unwrap();
    dirs.downloader_config_dir().ensure().await.unwrap();
    write_json(
        &dirs.downloader_config_dir().path_for_file("global.json"),
        &GlobalConfig { max_space },
    )
    .await
    .unwrap();
    dirs
}

/// Poll a status file until `pred` holds or the deadline passes.
async fn wait_for<T, F>(dir: &StateDir<T>, name: &SafeName, pred: F) -> T
where
    T: serde::Serialize + serde::de::DeserializeOwned,
    F: Fn(&T) -> bool,
{
    for _ in 0..500 {
        if let Some(status) = dir.load(name).await.unwrap() {
            if pred(&status) {
                return status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("status {name} never reached the expected state");
}

#[tokio::test]
async fn download_then_verify_delivers_the_artifact() {
    let tmp = tempfile::tempdir().unwrap();
    let dirs = setup(tmp.path(), 1_048_576).await;
    let name = SafeName::new("img-1").unwrap();
    let sha = claim_of(PAYLOAD);

    let fetcher = Arc::new(MockFetcher::new());
    fetcher.push(MockTransfer::Serve(PAYLOAD.to_vec()));

    let (download_tx, download_task) =
        spawn_downloader(&dirs, fetcher, CancellationToken::new())
            .await
            .unwrap();
    let (verify_tx, verify_task) = spawn_verifier(&dirs).await.unwrap();

    // Desired state: download it.
    let download = DownloadConfig {
        safe_name: name.clone(),
        download_url: Url::parse("https://images.example.com/img-1").unwrap(),
        image_sha256: sha.clone(),
        max_size: 2048,
        ref_count: 1,
    };
    dirs.downloader_config_dir()
        .store(&name, &download)
        .await
        .unwrap();
    download_tx
        .send(WatchEvent::modified("img-1.json"))
        .await
        .unwrap();

    let status: DownloadStatus = wait_for(&dirs.downloader_status_dir(), &name, |s| {
        s.state == DownloadState::Downloaded
    })
    .await;
    assert_eq!(status.size, 1); // ceil(23 / 1024)

    // Only after Downloaded: desired state for the verifier.
    let verify = VerifyConfig {
        safe_name: name.clone(),
        download_url: download.download_url.clone(),
        image_sha256: sha.clone(),
    };
    dirs.verifier_config_dir()
        .store(&name, &verify)
        .await
        .unwrap();
    verify_tx
        .send(WatchEvent::modified("img-1.json"))
        .await
        .unwrap();

    let _: VerifyStatus = wait_for(&dirs.verifier_status_dir(), &name, |s| {
        s.state == DownloadState::Delivered
    })
    .await;

    let verified = dirs.catalog().verified_file(&sha, &name);
    assert_eq!(std::fs::read(&verified).unwrap(), PAYLOAD);

    drop(download_tx);
    drop(verify_tx);
    download_task.await.unwrap();
    verify_task.await.unwrap();
}

#[tokio::test]
async fn corrupted_transfer_is_caught_by_the_verifier() {
    let tmp = tempfile::tempdir().unwrap();
    let dirs = setup(tmp.path(), 1_048_576).await;
    let name = SafeName::new("img-1").unwrap();
    // Claim the digest of what the image should be; serve corruption.
    let sha = claim_of(PAYLOAD);

    let fetcher = Arc::new(MockFetcher::new());
    fetcher.push(MockTransfer::Serve(b"corrupted bytes".to_vec()));

    let (download_tx, _download_task) =
        spawn_downloader(&dirs, fetcher, CancellationToken::new())
            .await
            .unwrap();
    let (verify_tx, _verify_task) = spawn_verifier(&dirs).await.unwrap();

    let download = DownloadConfig {
        safe_name: name.clone(),
        download_url: Url::parse("https://images.example.com/img-1").unwrap(),
        image_sha256: sha.clone(),
        max_size: 2048,
        ref_count: 1,
    };
    dirs.downloader_config_dir()
        .store(&name, &download)
        .await
        .unwrap();
    download_tx
        .send(WatchEvent::modified("img-1.json"))
        .await
        .unwrap();

    // The downloader does not check digests; it happily stages the
    // corrupt bytes.
    wait_for(&dirs.downloader_status_dir(), &name, |s: &DownloadStatus| {
        s.state == DownloadState::Downloaded
    })
    .await;

    let verify = VerifyConfig {
        safe_name: name.clone(),
        download_url: download.download_url.clone(),
        image_sha256: sha.clone(),
    };
    dirs.verifier_config_dir()
        .store(&name, &verify)
        .await
        .unwrap();
    verify_tx
        .send(WatchEvent::modified("img-1.json"))
        .await
        .unwrap();

    let status: VerifyStatus = wait_for(&dirs.verifier_status_dir(), &name, |s| {
        s.state == DownloadState::Initial && !s.last_err.is_empty()
    })
    .await;
    assert!(status.last_err.starts_with("got "));

    // Stranded in staging, never delivered.
    assert!(dirs.catalog().staging_file(&sha, &name).exists());
    assert!(!dirs.catalog().verified_file(&sha, &name).exists());
}
