mod common;

use common::{
    download_target, failed, fetcher, ok, test_config, version_body, write_download, FakeRunner,
    EMPTY_SHA256, TEST_CONTENT_SHA256,
};
use mockito::Server;
use nexis_downloader::civitai::FailureKind;
use nexis_downloader::error::{ChecksumError, FetchError, ToolError};
use nexis_downloader::models::{process_civitai_downloads, Category, FetchOutcome};
use tempfile::TempDir;

#[tokio::test]
async fn test_download_with_matching_checksum() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/model-versions/42")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(version_body(
            "model.safetensors",
            Some(TEST_CONTENT_SHA256.to_ascii_uppercase().as_str()),
        ))
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::healthy("test content", TEST_CONTENT_SHA256);
    let fetcher = fetcher(&config, runner.clone());

    let outcome = fetcher
        .fetch("42", Category::Checkpoints, None)
        .await
        .unwrap();

    let expected_path = temp_dir.path().join("checkpoints/model.safetensors");
    assert_eq!(outcome, FetchOutcome::Downloaded(expected_path.clone()));
    assert_eq!(std::fs::read_to_string(&expected_path).unwrap(), "test content");

    let downloads = runner.calls_to("aria2c");
    assert_eq!(downloads.len(), 1);
    assert_eq!(
        downloads[0].args.last().unwrap(),
        &format!(
            "{}/api/download/models/42?type=Model&format=SafeTensor",
            server.url()
        )
    );
    assert_eq!(runner.calls_to("sha256sum").len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_checksum_mismatch_removes_file() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/model-versions/7")
        .with_status(200)
        .with_body(version_body("lora.safetensors", Some(EMPTY_SHA256)))
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::healthy("test content", TEST_CONTENT_SHA256);
    let fetcher = fetcher(&config, runner);

    let result = fetcher.fetch("7", Category::Loras, None).await;

    match result {
        Err(FetchError::ChecksumFailed { filename, source }) => {
            assert_eq!(filename, "lora.safetensors");
            assert_eq!(
                source,
                ChecksumError::Mismatch {
                    expected: EMPTY_SHA256.to_string(),
                    actual: TEST_CONTENT_SHA256.to_string(),
                }
            );
        }
        other => panic!("expected checksum failure, got {other:?}"),
    }
    assert!(!temp_dir.path().join("loras/lora.safetensors").exists());
}

#[tokio::test]
async fn test_no_hash_skips_verification() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/model-versions/8")
        .with_status(200)
        .with_body(version_body("vae.safetensors", None))
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::healthy("test content", TEST_CONTENT_SHA256);
    let fetcher = fetcher(&config, runner.clone());

    let outcome = fetcher.fetch("8", Category::Vae, None).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Downloaded(_)));
    assert!(runner.calls_to("sha256sum").is_empty());
}

#[tokio::test]
async fn test_null_hashes_still_downloads() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/model-versions/9")
        .with_status(200)
        .with_body(r#"{"id": 9, "files": [{"name": "null.safetensors", "hashes": null}]}"#)
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::healthy("test content", TEST_CONTENT_SHA256);
    let fetcher = fetcher(&config, runner.clone());

    let outcome = fetcher.fetch("9", Category::Loras, None).await.unwrap();
    assert_eq!(
        outcome,
        FetchOutcome::Downloaded(temp_dir.path().join("loras/null.safetensors"))
    );
    assert_eq!(runner.calls_to("aria2c").len(), 1);
    assert!(runner.calls_to("sha256sum").is_empty());
}

#[tokio::test]
async fn test_existing_file_is_not_downloaded_again() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/model-versions/42")
        .with_status(200)
        .with_body(version_body("model.safetensors", Some(EMPTY_SHA256)))
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let existing = temp_dir.path().join("checkpoints/model.safetensors");
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, "already here").unwrap();

    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::healthy("new content", TEST_CONTENT_SHA256);
    let fetcher = fetcher(&config, runner.clone());

    let outcome = fetcher
        .fetch("42", Category::Checkpoints, None)
        .await
        .unwrap();

    assert_eq!(outcome, FetchOutcome::Skipped(existing.clone()));
    assert!(runner.calls().is_empty(), "no downloader or digest call expected");
    assert_eq!(std::fs::read_to_string(&existing).unwrap(), "already here");
}

#[tokio::test]
async fn test_empty_existing_file_is_downloaded() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/model-versions/42")
        .with_status(200)
        .with_body(version_body("model.safetensors", None))
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let existing = temp_dir.path().join("checkpoints/model.safetensors");
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, "").unwrap();

    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::healthy("test content", TEST_CONTENT_SHA256);
    let fetcher = fetcher(&config, runner.clone());

    let outcome = fetcher
        .fetch("42", Category::Checkpoints, None)
        .await
        .unwrap();
    assert_eq!(outcome, FetchOutcome::Downloaded(existing));
    assert_eq!(runner.calls_to("aria2c").len(), 1);
}

#[tokio::test]
async fn test_empty_id_has_no_side_effects() {
    let server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::healthy("test content", TEST_CONTENT_SHA256);
    let fetcher = fetcher(&config, runner.clone());

    let outcome = fetcher.fetch("", Category::Loras, None).await.unwrap();

    assert_eq!(outcome, FetchOutcome::Empty);
    assert!(runner.calls().is_empty());
    assert!(!temp_dir.path().join("loras").exists());
}

#[tokio::test]
async fn test_metadata_404_counts_as_failure() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/model-versions/404")
        .with_status(404)
        .with_body(r#"{"error": "No model with id 404"}"#)
        .expect(2)
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::healthy("test content", TEST_CONTENT_SHA256);
    let fetcher = fetcher(&config, runner.clone());

    let result = fetcher.fetch("404", Category::Checkpoints, None).await;
    assert!(matches!(
        result,
        Err(FetchError::MetadataUnavailable { ref model_id }) if model_id == "404"
    ));

    let tally = process_civitai_downloads(&fetcher, "404", Category::Checkpoints, None).await;
    assert_eq!(tally.succeeded, 0);
    assert_eq!(tally.failed, 1);
    assert!(runner.calls().is_empty());

    // One request per lookup: a 404 is never retried
    mock.assert_async().await;
}

#[tokio::test]
async fn test_payload_without_files_is_a_failure() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/model-versions/5")
        .with_status(200)
        .with_body(r#"{"id": 5, "files": []}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/api/v1/model-versions/6")
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;
    server
        .mock("GET", "/api/v1/model-versions/9")
        .with_status(200)
        .with_body(version_body("../escape.safetensors", None))
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::healthy("test content", TEST_CONTENT_SHA256);
    let fetcher = fetcher(&config, runner.clone());

    for id in ["5", "6", "9"] {
        let result = fetcher.fetch(id, Category::Vae, None).await;
        assert!(
            matches!(result, Err(FetchError::MetadataUnavailable { .. })),
            "id {id}: {result:?}"
        );
    }
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_token_sent_as_header_and_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/model-versions/42")
        .match_header("authorization", "Bearer secret-token")
        .with_status(200)
        .with_body(version_body("model.safetensors", None))
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::healthy("test content", TEST_CONTENT_SHA256);
    let fetcher = fetcher(&config, runner.clone());

    fetcher
        .fetch("42", Category::Checkpoints, Some(" secret-token "))
        .await
        .unwrap();

    let download = &runner.calls_to("aria2c")[0];
    assert!(download
        .args
        .last()
        .unwrap()
        .ends_with("format=SafeTensor&token=secret-token"));
    assert!(!download.to_string().contains("secret-token"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_downloader_failure_removes_partial_file() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/model-versions/42")
        .with_status(200)
        .with_body(version_body("model.safetensors", Some(TEST_CONTENT_SHA256)))
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::new(|spec| {
        write_download(spec, "partial");
        Ok(failed(3, "errorCode=3 Resource not found"))
    });
    let fetcher = fetcher(&config, runner.clone());

    let result = fetcher.fetch("42", Category::Checkpoints, None).await;

    match result {
        Err(FetchError::DownloadFailed {
            filename,
            kind,
            exit_code,
        }) => {
            assert_eq!(filename, "model.safetensors");
            assert_eq!(kind, FailureKind::NotFound);
            assert_eq!(exit_code, Some(3));
        }
        other => panic!("expected download failure, got {other:?}"),
    }
    let target = download_target(&runner.calls_to("aria2c")[0]);
    assert!(!target.exists());
    assert!(runner.calls_to("sha256sum").is_empty());
}

#[tokio::test]
async fn test_failure_classified_from_stderr() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/model-versions/42")
        .with_status(200)
        .with_body(version_body("model.safetensors", None))
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::new(|_| Ok(failed(22, "status=403 Forbidden")));
    let fetcher = fetcher(&config, runner);

    let result = fetcher.fetch("42", Category::Checkpoints, None).await;
    assert!(matches!(
        result,
        Err(FetchError::DownloadFailed {
            kind: FailureKind::Forbidden,
            ..
        })
    ));
}

#[tokio::test]
async fn test_missing_downloader_is_a_tool_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v1/model-versions/42")
        .with_status(200)
        .with_body(version_body("model.safetensors", None))
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::new(|spec| {
        Err(ToolError::NotFound {
            program: spec.program.clone(),
        })
    });
    let fetcher = fetcher(&config, runner);

    let result = fetcher.fetch("42", Category::Checkpoints, None).await;
    assert!(matches!(
        result,
        Err(FetchError::Tool(ToolError::NotFound { ref program })) if program == "aria2c"
    ));
}

#[tokio::test]
async fn test_batch_processes_ids_in_order() {
    let mut server = Server::new_async().await;
    for (id, name) in [("abc", "a.safetensors"), ("def", "d.safetensors")] {
        server
            .mock("GET", format!("/api/v1/model-versions/{id}").as_str())
            .with_status(200)
            .with_body(version_body(name, None))
            .create_async()
            .await;
    }

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), temp_dir.path());
    let runner = FakeRunner::new(|spec| {
        write_download(spec, "x");
        Ok(ok(""))
    });
    let fetcher = fetcher(&config, runner.clone());

    let tally = process_civitai_downloads(&fetcher, " abc , , def ", Category::Loras, None).await;

    assert_eq!(tally.succeeded, 2);
    assert_eq!(tally.failed, 0);
    let outs: Vec<String> = runner
        .calls_to("aria2c")
        .iter()
        .filter_map(|c| common::flag_value(c, "--out"))
        .collect();
    assert_eq!(outs, vec!["a.safetensors", "d.safetensors"]);
}
