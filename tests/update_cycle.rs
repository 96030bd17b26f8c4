//! Integration tests for the update cycle against mocked catalog and webhook
//! servers.
//!
//! Each test creates its own in-memory SQLite database and its own mock
//! servers, so the whole stack (HTTP catalog, checker, webhook notifier,
//! storage) is exercised end-to-end.

use chapterwatch::catalog::HttpCatalog;
use chapterwatch::checker::{CheckerSettings, TitleOutcome, UpdateChecker, ZeroSubscriberPolicy};
use chapterwatch::notify::WebhookNotifier;
use chapterwatch::storage::{Database, WatchlistEntry};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn checker(db: &Database, catalog: &MockServer, webhook: &MockServer) -> UpdateChecker {
    let catalog = HttpCatalog::new(&catalog.uri(), Duration::from_secs(5), 3).unwrap();
    let notifier = WebhookNotifier::new(
        reqwest::Client::new(),
        SecretString::from(format!("{}/hook", webhook.uri())),
        Duration::from_secs(5),
    );
    UpdateChecker::new(
        db.clone(),
        Arc::new(catalog),
        Arc::new(notifier),
        CheckerSettings {
            channel_id: "release-feed".to_string(),
            reader_base_url: "https://reader.example.com".to_string(),
            title_delay: Duration::ZERO,
            zero_subscriber_policy: ZeroSubscriberPolicy::Hold,
        },
    )
}

async fn mount_latest(server: &MockServer, title_id: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/chapter/{}/list", title_id)))
        .and(query_param("page", "1"))
        .and(query_param("page_size", "1"))
        .and(query_param("sort_order", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, title_id: &str, name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/manga/detail/{}", title_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "manga_id": title_id,
                "title": name,
                "cover_image_url": format!("https://img.example.com/{}.jpg", title_id)
            }
        })))
        .mount(server)
        .await;
}

async fn baseline(db: &Database, title_id: &str) -> Option<String> {
    db.get_baseline(title_id)
        .await
        .unwrap()
        .and_then(|b| b.latest_known_chapter_id)
}

// ============================================================================
// Detection and Dispatch
// ============================================================================

#[tokio::test]
async fn test_new_chapter_is_announced_once() {
    let db = test_db().await;
    let catalog = MockServer::start().await;
    let webhook = MockServer::start().await;

    db.subscribe(&WatchlistEntry::new("t1", "111", "Alpha"), Some("c5"))
        .await
        .unwrap();
    db.subscribe(&WatchlistEntry::new("t1", "222", "Alpha"), Some("c5"))
        .await
        .unwrap();

    mount_latest(
        &catalog,
        "t1",
        r#"{"data":[{"chapter_id":"c6","chapter_number":6,"release_date":"2026-01-02T03:04:05Z"}]}"#,
    )
    .await;
    mount_detail(&catalog, "t1", "Alpha").await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(serde_json::json!({
            "channel": "release-feed",
            "content": "<@111> <@222>",
            "notification": {
                "title_name": "Alpha",
                "chapter_id": "c6",
                "chapter_label": "6.0",
                "chapter_url": "https://reader.example.com/chapter/c6",
                "cover_url": "https://img.example.com/t1.jpg"
            }
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&webhook)
        .await;

    let checker = checker(&db, &catalog, &webhook);
    let (_tx, rx) = watch::channel(false);

    let report = checker.run_cycle(&rx).await;
    assert_eq!(report.outcome("t1"), Some(TitleOutcome::Notified));
    assert_eq!(baseline(&db, "t1").await.as_deref(), Some("c6"));

    // Same latest chapter on the next cycle: no second dispatch
    let report = checker.run_cycle(&rx).await;
    assert_eq!(report.outcome("t1"), Some(TitleOutcome::Unchanged));
}

#[tokio::test]
async fn test_known_chapter_sends_nothing() {
    let db = test_db().await;
    let catalog = MockServer::start().await;
    let webhook = MockServer::start().await;

    db.subscribe(&WatchlistEntry::new("t1", "111", "Alpha"), Some("c5"))
        .await
        .unwrap();
    mount_latest(
        &catalog,
        "t1",
        r#"{"data":[{"chapter_id":"c5","chapter_number":5}]}"#,
    )
    .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&webhook)
        .await;

    let (_tx, rx) = watch::channel(false);
    let report = checker(&db, &catalog, &webhook).run_cycle(&rx).await;
    assert_eq!(report.outcome("t1"), Some(TitleOutcome::Unchanged));
}

// ============================================================================
// Failure Containment
// ============================================================================

#[tokio::test]
async fn test_webhook_failure_keeps_baseline() {
    let db = test_db().await;
    let catalog = MockServer::start().await;
    let webhook = MockServer::start().await;

    db.subscribe(&WatchlistEntry::new("t1", "111", "Alpha"), Some("c5"))
        .await
        .unwrap();
    mount_latest(
        &catalog,
        "t1",
        r#"{"data":[{"chapter_id":"c6","chapter_number":6}]}"#,
    )
    .await;
    mount_detail(&catalog, "t1", "Alpha").await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&webhook)
        .await;

    let (_tx, rx) = watch::channel(false);
    let report = checker(&db, &catalog, &webhook).run_cycle(&rx).await;
    assert_eq!(report.outcome("t1"), Some(TitleOutcome::DispatchFailed));
    assert_eq!(baseline(&db, "t1").await.as_deref(), Some("c5"));
}

#[tokio::test]
async fn test_catalog_outage_skips_title_and_continues() {
    let db = test_db().await;
    let catalog = MockServer::start().await;
    let webhook = MockServer::start().await;

    db.subscribe(&WatchlistEntry::new("t1", "111", "Alpha"), Some("c1"))
        .await
        .unwrap();
    db.subscribe(&WatchlistEntry::new("t2", "111", "Beta"), Some("d1"))
        .await
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/chapter/t1/list"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&catalog)
        .await;
    mount_latest(
        &catalog,
        "t2",
        r#"{"data":[{"chapter_id":"d2","chapter_number":2}]}"#,
    )
    .await;
    mount_detail(&catalog, "t2", "Beta").await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&webhook)
        .await;

    let (_tx, rx) = watch::channel(false);
    let report = checker(&db, &catalog, &webhook).run_cycle(&rx).await;
    assert_eq!(report.outcome("t1"), Some(TitleOutcome::FetchFailed));
    assert_eq!(report.outcome("t2"), Some(TitleOutcome::Notified));
    assert_eq!(baseline(&db, "t1").await.as_deref(), Some("c1"));
    assert_eq!(baseline(&db, "t2").await.as_deref(), Some("d2"));
}

#[tokio::test]
async fn test_missing_detail_still_notifies_with_stored_name() {
    let db = test_db().await;
    let catalog = MockServer::start().await;
    let webhook = MockServer::start().await;

    db.subscribe(&WatchlistEntry::new("t1", "111", "Alpha (stored)"), Some("c1"))
        .await
        .unwrap();
    mount_latest(
        &catalog,
        "t1",
        r#"{"data":[{"chapter_id":"c2","chapter_number":2.5}]}"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v1/manga/detail/t1"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&catalog)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "notification": {"title_name": "Alpha (stored)", "chapter_label": "2.5", "cover_url": null}
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&webhook)
        .await;

    let (_tx, rx) = watch::channel(false);
    let report = checker(&db, &catalog, &webhook).run_cycle(&rx).await;
    assert_eq!(report.outcome("t1"), Some(TitleOutcome::Notified));
}

#[tokio::test]
async fn test_unsubscribed_titles_are_not_checked() {
    let db = test_db().await;
    let catalog = MockServer::start().await;
    let webhook = MockServer::start().await;

    db.subscribe(&WatchlistEntry::new("t1", "111", "Alpha"), Some("c1"))
        .await
        .unwrap();
    db.unsubscribe("t1", "111").await.unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&catalog)
        .await;

    let (_tx, rx) = watch::channel(false);
    let report = checker(&db, &catalog, &webhook).run_cycle(&rx).await;
    assert!(report.outcomes.is_empty());
    assert!(!report.interrupted);
}
