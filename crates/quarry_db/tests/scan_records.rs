use chrono::{TimeZone, Utc};
use quarry_db::{ScanDb, ScanRecord};
use quarry_protocol::ArtifactId;

fn record(id_byte: &str, score: i64) -> ScanRecord {
    ScanRecord {
        artifact_id: ArtifactId::parse(&id_byte.repeat(32)).unwrap(),
        last_scan_at: Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
        score,
        last_error: None,
        last_success: "matched: test_rule".to_string(),
        rules_fingerprint: "[\"aa\"]".to_string(),
    }
}

#[tokio::test]
async fn get_record_returns_none_for_unknown_artifact() {
    let db = ScanDb::open_in_memory().await.unwrap();
    let id = ArtifactId::parse(&"0".repeat(64)).unwrap();
    assert!(db.get_record(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_creates_then_overwrites() {
    let db = ScanDb::open_in_memory().await.unwrap();

    let mut rec = record("ab", 0);
    db.upsert_scan(&rec).await.unwrap();
    assert_eq!(db.count_records().await.unwrap(), 1);

    rec.score = 30;
    rec.last_success = "matched: other_rule".to_string();
    db.upsert_scan(&rec).await.unwrap();

    // Still one row per identifier
    assert_eq!(db.count_records().await.unwrap(), 1);
    let stored = db.get_record(&rec.artifact_id).await.unwrap().unwrap();
    assert_eq!(stored.score, 30);
    assert_eq!(stored.last_success, "matched: other_rule");
}

#[tokio::test]
async fn qualifying_records_filters_on_positive_score() {
    let db = ScanDb::open_in_memory().await.unwrap();

    db.upsert_scan(&record("aa", 0)).await.unwrap();
    db.upsert_scan(&record("bb", 10)).await.unwrap();
    db.upsert_scan(&record("cc", 80)).await.unwrap();

    let qualifying = db.qualifying_records().await.unwrap();
    assert_eq!(qualifying.len(), 2);
    assert!(qualifying.iter().all(|r| r.score > 0));
    assert_eq!(db.count_qualifying().await.unwrap(), 2);
    assert_eq!(db.count_records().await.unwrap(), 3);
}

#[tokio::test]
async fn qualifying_order_is_stable() {
    let db = ScanDb::open_in_memory().await.unwrap();

    db.upsert_scan(&record("cc", 5)).await.unwrap();
    db.upsert_scan(&record("aa", 5)).await.unwrap();

    let first = db.qualifying_records().await.unwrap();
    let second = db.qualifying_records().await.unwrap();
    assert_eq!(first, second);
    assert!(first[0].artifact_id.as_str() < first[1].artifact_id.as_str());
}

#[tokio::test]
async fn round_trips_error_and_fingerprint_fields() {
    let db = ScanDb::open_in_memory().await.unwrap();

    let mut rec = record("dd", 4);
    rec.last_error = Some("engine exited with code 2".to_string());
    db.upsert_scan(&rec).await.unwrap();

    let stored = db.get_record(&rec.artifact_id).await.unwrap().unwrap();
    assert_eq!(stored, rec);
}

#[tokio::test]
async fn open_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("records.sqlite3");
    let db = ScanDb::open(&path).await.unwrap();
    db.upsert_scan(&record("ee", 1)).await.unwrap();
    assert!(path.exists());
}
