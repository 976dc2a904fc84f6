//! End-to-end fetch → stage → load against in-memory store and sink.

use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;
use gwlog_common::{DateRange, Error, Marker};
use gwlog_config::{IngestConfig, ValidationPolicy};
use gwlog_core::pipeline::{run_fetch, run_load, FetchRequest};
use gwlog_core::{MemoryAccessLogSink, MemoryObjectStore, StoreError};
use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const IDS: [&str; 3] = [
    "0f8fad5b-d9cb-469f-a165-70867728950e",
    "7c9e6679-7425-40de-944b-e07fc1f90ae7",
    "9b2a8a4f-3c1d-4e6f-8a7b-5d4c3b2a1f0e",
];

fn entry(request_id: &str, epoch_ms: i64) -> Value {
    json!({
        "requestId": request_id,
        "apiKey": "key",
        "apiKeyId": "kid",
        "requestTime": "02/Jan/2024:03:04:05 +0000",
        "requestTimeEpoch": epoch_ms.to_string(),
        "apiId": "abc123",
        "stage": "prod",
        "httpMethod": "POST",
        "protocol": "HTTP/1.1",
        "domainName": "api.example.com",
        "path": "/v1/orders",
        "resourcePath": "/v1/orders",
        "userAgent": "curl/8.0",
        "status": 200,
        "responseLatency": "35",
        "errorMessage": "-",
        "responseType": "-",
        "responseLength": 120,
        "integrationStatus": "200",
        "integrationLatency": "-",
        "integrationError": "-",
        "ip": "10.0.0.1",
        "caller": "-",
        "user": "-"
    })
}

fn gzip_lines(lines: &[String]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for line in lines {
        writeln!(encoder, "{line}").unwrap();
    }
    encoder.finish().unwrap()
}

fn log_lines(entries: &[Value]) -> Vec<String> {
    entries
        .iter()
        .map(|e| format!("2024-01-02T03:04:05.000Z {e}"))
        .collect()
}

fn config(staging: &Path) -> IngestConfig {
    IngestConfig {
        staging_dir: staging.to_path_buf(),
        ..Default::default()
    }
}

fn request(start: (i32, u32, u32), end: (i32, u32, u32), marker: Marker) -> FetchRequest {
    let date = |(y, m, d): (i32, u32, u32)| NaiveDate::from_ymd_opt(y, m, d).unwrap();
    FetchRequest {
        environment: "prod".to_string(),
        range: DateRange::new(date(start), date(end)).unwrap(),
        marker,
    }
}

fn json_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|x| x == "json"))
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn test_end_to_end_single_object() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let entries: Vec<Value> = IDS
        .iter()
        .enumerate()
        .map(|(i, id)| entry(id, 1_704_164_645_000 + i as i64))
        .collect();
    let store = Arc::new(MemoryObjectStore::new().with_object(
        "2024/1/2/part-0001.gz",
        gzip_lines(&log_lines(&entries)),
    ));
    let day = request((2024, 1, 2), (2024, 1, 3), Marker::start());

    let report = run_fetch(&config, store, &day).await.unwrap();
    assert_eq!(report.bucket, "prod-iapigw-access-logs");
    assert_eq!(report.prefixes, 1);
    assert_eq!(report.staging.files, 1);
    assert_eq!(report.staging.records, 3);

    let staged = json_files(tmp.path());
    assert_eq!(staged.len(), 1);
    let array: Vec<Value> = serde_json::from_str(&fs::read_to_string(&staged[0]).unwrap()).unwrap();
    assert_eq!(array, entries);

    let sink = MemoryAccessLogSink::new();
    let report = run_load(&config, &sink).await.unwrap();
    assert_eq!(report.records.inserted, 3);
    assert_eq!(report.loaded_files, 1);

    let rows = sink.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].request_id.to_string(), IDS[0]);
    assert_eq!(
        rows[2].request_time.to_rfc3339(),
        "2024-01-02T03:04:05.002+00:00"
    );
    assert!(rows.iter().all(|r| r.integration_status == 200));
    assert!(rows.iter().all(|r| r.integration_latency == 0));

    assert!(json_files(tmp.path()).is_empty());
    assert_eq!(json_files(&tmp.path().join("loaded")).len(), 1);
}

#[tokio::test]
async fn test_credential_expiry_then_resume() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let first = gzip_lines(&log_lines(&[entry(IDS[0], 1_704_164_645_000)]));
    let second = gzip_lines(&log_lines(&[entry(IDS[1], 1_704_164_646_000)]));

    let failing = Arc::new(
        MemoryObjectStore::new()
            .with_object("2024/1/2/a.gz", first.clone())
            .with_object("2024/1/2/b.gz", second.clone())
            .fail_get("2024/1/2/b.gz", StoreError::Credentials("ExpiredToken".into())),
    );
    let day = request((2024, 1, 2), (2024, 1, 3), Marker::start());
    let err = run_fetch(&config, failing, &day).await.unwrap_err();
    assert!(matches!(err, Error::Credential { .. }));
    let resume = err.resume_point().unwrap().clone();
    assert_eq!(resume.prefix, "2024/1/2/");
    assert_eq!(resume.marker, Marker::from("2024/1/2/a.gz"));
    assert_eq!(json_files(tmp.path()).len(), 1);

    let healthy = Arc::new(
        MemoryObjectStore::new()
            .with_object("2024/1/2/a.gz", first)
            .with_object("2024/1/2/b.gz", second),
    );
    let resumed = request((2024, 1, 2), (2024, 1, 3), resume.marker);
    let report = run_fetch(&config, healthy.clone(), &resumed).await.unwrap();
    assert_eq!(report.staging.files, 1);
    let fetched: Vec<String> = healthy.get_calls().iter().map(|k| k.to_string()).collect();
    assert_eq!(fetched, vec!["2024/1/2/b.gz"]);

    let sink = MemoryAccessLogSink::new();
    let load = run_load(&config, &sink).await.unwrap();
    assert_eq!(load.records.inserted, 2);
}

#[tokio::test]
async fn test_invalid_gzip_aborts_with_format_error() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(
        MemoryObjectStore::new()
            .with_object("2024/1/2/a.gz", b"{\"not\": \"compressed\"}".to_vec()),
    );
    let err = run_fetch(
        &config(tmp.path()),
        store,
        &request((2024, 1, 2), (2024, 1, 3), Marker::start()),
    )
    .await
    .unwrap_err();
    match err {
        Error::Format { key, resume } => {
            assert_eq!(key, "2024/1/2/a.gz");
            assert!(resume.marker.is_start());
        }
        other => panic!("expected format error, got {other:?}"),
    }
    assert!(json_files(tmp.path()).is_empty());
}

#[tokio::test]
async fn test_skip_point_gets_past_corrupt_object() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let store = Arc::new(
        MemoryObjectStore::new()
            .with_object("2024/1/2/bad.gz", b"junk".to_vec())
            .with_object(
                "2024/1/2/good.gz",
                gzip_lines(&log_lines(&[entry(IDS[0], 1_704_164_645_000)])),
            ),
    );
    let day = request((2024, 1, 2), (2024, 1, 3), Marker::start());

    let err = run_fetch(&config, store.clone(), &day).await.unwrap_err();
    assert_eq!(err.resume_point().unwrap().marker, Marker::start());
    let retry = run_fetch(&config, store.clone(), &day).await.unwrap_err();
    assert!(matches!(retry, Error::Format { .. }));

    let skip = err.skip_point().unwrap();
    assert_eq!(skip.marker, Marker::from("2024/1/2/bad.gz"));
    let resumed = request((2024, 1, 2), (2024, 1, 3), skip.marker);
    let report = run_fetch(&config, store, &resumed).await.unwrap();
    assert_eq!(report.staging.files, 1);
    assert_eq!(report.staging.records, 1);
}

#[tokio::test]
async fn test_zero_byte_object_does_not_abort_fetch() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(
        MemoryObjectStore::new()
            .with_object("2024/1/2/empty.gz", Vec::new())
            .with_object(
                "2024/1/2/full.gz",
                gzip_lines(&log_lines(&[entry(IDS[0], 1_704_164_645_000)])),
            ),
    );
    let report = run_fetch(
        &config(tmp.path()),
        store,
        &request((2024, 1, 2), (2024, 1, 3), Marker::start()),
    )
    .await
    .unwrap();
    assert_eq!(report.fetch.fetched, 2);
    assert_eq!(report.staging.files, 2);
    assert_eq!(report.staging.records, 1);
}

#[tokio::test]
async fn test_multi_day_range_with_pages() {
    let tmp = TempDir::new().unwrap();
    let mut store = MemoryObjectStore::new().with_page_size(1);
    for (day, id) in [(2, IDS[0]), (3, IDS[1]), (4, IDS[2])] {
        store = store.with_object(
            format!("2024/1/{day}/a.gz"),
            gzip_lines(&log_lines(&[entry(id, 1_704_164_645_000)])),
        );
    }
    let report = run_fetch(
        &config(tmp.path()),
        Arc::new(store),
        &request((2024, 1, 2), (2024, 1, 5), Marker::start()),
    )
    .await
    .unwrap();
    assert_eq!(report.prefixes, 3);
    assert_eq!(report.fetch.fetched, 3);
    assert_eq!(json_files(tmp.path()).len(), 3);
}

#[tokio::test]
async fn test_load_skip_policy_counts_invalid_records() {
    let tmp = TempDir::new().unwrap();
    let mut bad = entry(IDS[1], 1_704_164_645_000);
    bad.as_object_mut().unwrap().remove("stage");
    fs::write(
        tmp.path().join("a.json"),
        serde_json::to_string(&vec![entry(IDS[0], 1_704_164_645_000), bad]).unwrap(),
    )
    .unwrap();

    let config = IngestConfig {
        validation_policy: ValidationPolicy::Skip,
        ..config(tmp.path())
    };
    let sink = MemoryAccessLogSink::new();
    let report = run_load(&config, &sink).await.unwrap();
    assert_eq!(report.records.inserted, 1);
    assert_eq!(report.records.skipped, 1);
    assert_eq!(report.loaded_files, 1);
}

#[tokio::test]
async fn test_load_abort_leaves_file_pending() {
    let tmp = TempDir::new().unwrap();
    let mut bad = entry(IDS[1], 1_704_164_645_000);
    bad["requestId"] = json!("not-a-uuid");
    fs::write(
        tmp.path().join("a.json"),
        serde_json::to_string(&vec![entry(IDS[0], 1_704_164_645_000), bad]).unwrap(),
    )
    .unwrap();

    let sink = MemoryAccessLogSink::new();
    let err = run_load(&config(tmp.path()), &sink).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(sink.rows().len(), 1);
    assert_eq!(json_files(tmp.path()).len(), 1);
}
