//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the reservation platform (and,
//! where needed, a PostgREST sink) and run the full harvest end-to-end.

use serde_json::json;
use slotscout::config::{parse_config, Config};
use slotscout::crawler::{Coordinator, Credentials};
use slotscout::storage::{PostgrestStore, RecordStore, SqliteStore};
use slotscout::{ItemId, RunState};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SITE: &str = "testsite";

const LANDING: &str = r#"<html><head>
<script type="text/javascript">window.__csrfToken = "csrf-test-token";</script>
</head><body>My Account</body></html>"#;

/// Creates a test configuration pointing at the mock platform
fn create_test_config(base_url: &str, db_path: &str) -> Config {
    parse_config(&format!(
        r#"
[platform]
base-url = "{base_url}"
site = "{SITE}"

[listing]
facility-type-ids = [39, 115]
page-size = 2

[crawler]
max-concurrent-requests = 4
request-delay-ms = 0
timezone = "America/Los_Angeles"
request-timeout-secs = 5

[retry.fetch]
max-attempts = 2
delay-ms = 10

[retry.persistence]
max-attempts = 2
delay-ms = 10

[sink]
kind = "sqlite"
database-path = "{db_path}"
table = "courts"
"#
    ))
    .expect("test config should be valid")
}

fn api_path(suffix: &str) -> String {
    format!("/{}/rest/{}", SITE, suffix)
}

/// Mounts the landing page and a successful sign-in
async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/myaccount", SITE)))
        .respond_with(ResponseTemplate::new(200).set_body_string(LANDING))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(api_path("user/signin")))
        .and(header("x-csrf-token", "csrf-test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"body": {}})))
        .expect(1)
        .mount(server)
        .await;
}

/// Mounts a two-page listing: ids 101 and 102, then 103
async fn mount_listing(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(api_path("reservation/resource")))
        .and(body_partial_json(json!({"start_index": 0, "page_size": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": {
                "items": [{"id": 101}, {"id": 102}],
                "next_start_index": 2,
                "total": 3
            }
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(api_path("reservation/resource")))
        .and(body_partial_json(json!({"start_index": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": {
                "items": [{"id": 103}],
                "next_start_index": null,
                "total": 3
            }
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, id: i64) {
    Mock::given(method("GET"))
        .and(path(api_path(&format!("reservation/resource/detail/{}", id))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": {
                "resource_detail": {
                    "general_information": {
                        "facility_name": format!("Court {}", id),
                        "facility_type": "Tennis Court",
                        "center_name": "Rainier Playfield",
                        "address1": "3700 S Alaska St",
                        "city": "Seattle",
                        "state": "WA",
                        "zip_code": "98118"
                    }
                }
            }
        })))
        .mount(server)
        .await;
}

async fn mount_availability(server: &MockServer, id: i64) {
    Mock::given(method("GET"))
        .and(path(api_path(&format!(
            "reservation/resource/availability/daily/{}",
            id
        ))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": {
                "details": {
                    "daily_details": [{
                        "date": "2024-03-15",
                        "times": [
                            {"available": true, "start_time": "07:00:00", "end_time": "08:00:00"},
                            {"available": false, "start_time": "08:00:00", "end_time": "09:00:00"},
                            {"available": true, "start_time": "09:00:00", "end_time": "10:00:00"}
                        ]
                    }]
                }
            }
        })))
        .mount(server)
        .await;
}

fn sqlite_store(dir: &TempDir) -> (Arc<SqliteStore>, String) {
    let db_path = dir.path().join("courts.db");
    let store = SqliteStore::new(&db_path, "courts").expect("Failed to open test store");
    (Arc::new(store), db_path.display().to_string())
}

fn credentials() -> Credentials {
    Credentials::new("test@example.com", "hunter2")
}

#[tokio::test]
async fn test_full_harvest_two_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (store, db_path) = sqlite_store(&dir);

    mount_sign_in(&server).await;
    mount_listing(&server).await;
    for id in [101, 102, 103] {
        mount_detail(&server, id).await;
        mount_availability(&server, id).await;
    }

    let config = create_test_config(&server.uri(), &db_path);
    let mut coordinator = Coordinator::new(config, credentials(), store.clone());
    let report = coordinator.run(CancellationToken::new()).await;

    assert_eq!(report.state, RunState::Done, "fatal: {:?}", report.fatal);
    assert_eq!(report.items_seen, 3);
    assert_eq!(report.successes, 3);
    assert_eq!(report.write_failures, 0);
    assert!(report.skips.is_empty());
    assert!(report.fatal.is_none());

    assert_eq!(store.count_records().unwrap(), 3);
    let record = store
        .get_record(&ItemId::from(102))
        .unwrap()
        .expect("record 102 should be stored");
    assert_eq!(record.title, "Court 102");
    assert_eq!(record.facility_type, "Tennis Court");
    assert_eq!(
        record.address,
        "Rainier Playfield 3700 S Alaska St Seattle, WA, 98118"
    );
    assert_eq!(record.canonical_addr, "rainierplayfield3700salaskastseattlewa98118");
    assert_eq!(
        record.available_dates,
        "2024-03-15  07:00:00-08:00:00\n2024-03-15  09:00:00-10:00:00"
    );
}

#[tokio::test]
async fn test_unreachable_availability_skips_item() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (store, db_path) = sqlite_store(&dir);

    mount_sign_in(&server).await;
    mount_listing(&server).await;
    for id in [101, 102, 103] {
        mount_detail(&server, id).await;
    }
    mount_availability(&server, 101).await;
    mount_availability(&server, 103).await;

    // Every attempt for 102 fails
    Mock::given(method("GET"))
        .and(path(api_path("reservation/resource/availability/daily/102")))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(2)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &db_path);
    let mut coordinator = Coordinator::new(config, credentials(), store.clone());
    let report = coordinator.run(CancellationToken::new()).await;

    assert_eq!(report.state, RunState::Done, "fatal: {:?}", report.fatal);
    assert_eq!(report.items_seen, 3);
    assert_eq!(report.successes, 2);
    assert_eq!(report.skips.len(), 1);
    assert_eq!(report.skips[0].id, Some(ItemId::from(102)));
    assert!(report.skips[0].reason.contains("availability"));

    assert_eq!(store.count_records().unwrap(), 2);
    assert!(store.get_record(&ItemId::from(102)).unwrap().is_none());
}

#[tokio::test]
async fn test_rejected_sign_in_fails_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (store, db_path) = sqlite_store(&dir);

    Mock::given(method("GET"))
        .and(path(format!("/{}/myaccount", SITE)))
        .respond_with(ResponseTemplate::new(200).set_body_string(LANDING))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(api_path("user/signin")))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .expect(1)
        .mount(&server)
        .await;

    // No listing request may be issued
    Mock::given(method("POST"))
        .and(path(api_path("reservation/resource")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"body": {}})))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &db_path);
    let mut coordinator = Coordinator::new(config, credentials(), store.clone());
    let report = coordinator.run(CancellationToken::new()).await;

    assert_eq!(report.state, RunState::Failed);
    assert_eq!(coordinator.state(), RunState::Failed);
    let fatal = report.fatal.expect("a failed run names its fatal error");
    assert!(fatal.contains("401"), "unexpected fatal error: {}", fatal);
    assert_eq!(report.items_seen, 0);
    assert_eq!(store.count_records().unwrap(), 0);
}

#[tokio::test]
async fn test_stalled_listing_fails_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (store, db_path) = sqlite_store(&dir);

    mount_sign_in(&server).await;
    mount_detail(&server, 101).await;
    mount_availability(&server, 101).await;

    // The cursor never moves past the first page
    Mock::given(method("POST"))
        .and(path(api_path("reservation/resource")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": {
                "items": [{"id": 101}],
                "next_start_index": 0,
                "total": 10
            }
        })))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &db_path);
    let mut coordinator = Coordinator::new(config, credentials(), store);
    let report = coordinator.run(CancellationToken::new()).await;

    assert_eq!(report.state, RunState::Failed);
    let fatal = report.fatal.expect("a failed run names its fatal error");
    assert!(fatal.contains("did not advance"), "unexpected fatal error: {}", fatal);
}

#[tokio::test]
async fn test_unreachable_listing_page_aborts_in_flight_items() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (store, db_path) = sqlite_store(&dir);

    mount_sign_in(&server).await;

    Mock::given(method("POST"))
        .and(path(api_path("reservation/resource")))
        .and(body_partial_json(json!({"start_index": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": {
                "items": [{"id": 101}, {"id": 102}],
                "next_start_index": 2,
                "total": 4
            }
        })))
        .mount(&server)
        .await;

    // Every attempt at the second page fails
    Mock::given(method("POST"))
        .and(path(api_path("reservation/resource")))
        .and(body_partial_json(json!({"start_index": 2})))
        .respond_with(ResponseTemplate::new(503).set_body_string("listing down"))
        .expect(2)
        .mount(&server)
        .await;

    // Detail responses are slow enough that both items are still in flight
    for id in [101, 102] {
        Mock::given(method("GET"))
            .and(path(api_path(&format!("reservation/resource/detail/{}", id))))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"body": {}}))
                    .set_delay(std::time::Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path_regex(r"^/testsite/rest/reservation/resource/availability/daily/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"body": {}})))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &db_path);
    let mut coordinator = Coordinator::new(config, credentials(), store.clone());

    let started = std::time::Instant::now();
    let report = coordinator.run(CancellationToken::new()).await;
    let elapsed = started.elapsed();

    assert_eq!(report.state, RunState::Failed);
    let fatal = report.fatal.expect("a failed run names its fatal error");
    assert!(
        fatal.contains("Listing page at index 2 unreachable after 2 attempt(s)"),
        "unexpected fatal error: {}",
        fatal
    );
    assert_eq!(report.items_seen, 2);
    assert_eq!(report.successes, 0);
    assert_eq!(store.count_records().unwrap(), 0);
    assert!(
        elapsed < std::time::Duration::from_millis(1500),
        "run did not abort in-flight items promptly: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_harvest_into_postgrest_sink() {
    let server = MockServer::start().await;

    mount_sign_in(&server).await;
    mount_listing(&server).await;
    for id in [101, 102, 103] {
        mount_detail(&server, id).await;
        mount_availability(&server, id).await;
    }

    Mock::given(method("POST"))
        .and(path("/rest/v1/courts"))
        .and(header("apikey", "service-key"))
        .and(header("prefer", "resolution=merge-duplicates,return=minimal"))
        .respond_with(ResponseTemplate::new(201))
        .expect(3)
        .mount(&server)
        .await;

    let store: Arc<dyn RecordStore> =
        Arc::new(PostgrestStore::new(&server.uri(), "courts", "service-key").unwrap());
    let config = create_test_config(&server.uri(), "unused.db");
    let mut coordinator =
        Coordinator::new(config, credentials(), store).with_config_hash("cafebabe");
    let report = coordinator.run(CancellationToken::new()).await;

    assert_eq!(report.state, RunState::Done, "fatal: {:?}", report.fatal);
    assert_eq!(report.successes, 3);
    assert_eq!(report.config_hash, "cafebabe");
}

#[tokio::test]
async fn test_write_failures_are_skips() {
    let server = MockServer::start().await;

    mount_sign_in(&server).await;
    mount_listing(&server).await;
    for id in [101, 102, 103] {
        mount_detail(&server, id).await;
        mount_availability(&server, id).await;
    }

    Mock::given(method("POST"))
        .and(path("/rest/v1/courts"))
        .respond_with(ResponseTemplate::new(503).set_body_string("database unavailable"))
        .expect(6)
        .mount(&server)
        .await;

    let store: Arc<dyn RecordStore> =
        Arc::new(PostgrestStore::new(&server.uri(), "courts", "service-key").unwrap());
    let config = create_test_config(&server.uri(), "unused.db");
    let mut coordinator = Coordinator::new(config, credentials(), store);
    let report = coordinator.run(CancellationToken::new()).await;

    assert_eq!(report.state, RunState::Done, "fatal: {:?}", report.fatal);
    assert_eq!(report.successes, 0);
    assert_eq!(report.write_failures, 3);
    assert_eq!(report.skips.len(), 3);
    assert!(report
        .skips
        .iter()
        .all(|skip| skip.reason.contains("2 attempt(s)")));
}

#[tokio::test]
async fn test_cancellation_fails_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (store, db_path) = sqlite_store(&dir);

    // The landing page hangs long enough for the cancel to win
    Mock::given(method("GET"))
        .and(path_regex(r"^/testsite/myaccount$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LANDING)
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &db_path);
    let mut coordinator = Coordinator::new(config, credentials(), store);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let report = coordinator.run(cancel).await;

    assert_eq!(report.state, RunState::Failed);
    assert_eq!(report.fatal.as_deref(), Some("Run cancelled"));
}
