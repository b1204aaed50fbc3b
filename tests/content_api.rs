use folio::client::fallback::{ContentService, Origin};
use folio::client::{ApiClient, ClientError, FailureKind};
use folio::config::AppConfig;
use folio::entities::Section;
use folio::http::{self, ApiContext};
use folio::storage::FileStorage;
use folio::store::CmsStore;
use serde_json::json;
use tempfile::TempDir;

async fn spawn_server(dir: &TempDir) -> ApiClient {
    let cfg = AppConfig::new(
        dir.path().to_str().unwrap(),
        "uploads",
        "127.0.0.1:0",
        "http://placeholder",
    )
    .unwrap();
    let mut store = CmsStore::new(&cfg, FileStorage::new(cfg.wal_path.clone()));
    store.init().await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = http::app(ApiContext::new(cfg, store));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    ApiClient::new(format!("http://{addr}"))
}

#[tokio::test]
async fn sections_round_trip_and_publish() {
    let dir = tempfile::tempdir().unwrap();
    let client = spawn_server(&dir).await;

    let hero = json!({ "title": "Hello", "subtitle": "A portfolio.", "ctaLabel": "Say hi", "ctaUrl": "/contact" });
    client.put_section(Section::Hero, &hero).await.unwrap();

    let fetched = client.get_section(Section::Hero).await.unwrap();
    assert_eq!(fetched, hero);

    let published = client.publish().await.unwrap();
    assert_eq!(published["published"].as_array().unwrap().len(), Section::ALL.len());
    assert!(published["at"].is_string());

    let health = client.services_health().await.unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["sections"], 1);
    assert_eq!(health["media"], 0);
}

#[tokio::test]
async fn unset_sections_answer_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let client = spawn_server(&dir).await;

    let services = client.get_section(Section::Services).await.unwrap();
    assert!(services.as_array().is_some());
    assert!(!services.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_section_content_is_a_422() {
    let dir = tempfile::tempdir().unwrap();
    let client = spawn_server(&dir).await;

    let err = client
        .put_section(Section::Hero, &json!({ "title": "", "subtitle": "x" }))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Http(FailureKind::UnprocessableEntity)));
    assert_eq!(err.to_string(), "The upload was rejected as invalid.");
}

#[tokio::test]
async fn unknown_section_is_a_404() {
    let dir = tempfile::tempdir().unwrap();
    let client = spawn_server(&dir).await;

    let url = format!("{}/api/services/navbar", client.base_url());
    let response = reqwest::get(url).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn offline_edits_flush_once_the_api_is_back() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache_path = cache_dir.path().join("content-local.json");

    // No server yet: the write lands in the local cache.
    let offline = ContentService::new(ApiClient::new("http://127.0.0.1:9"), cache_path.clone());
    let hero = json!({ "title": "Saved offline", "subtitle": "Synced later." });
    assert_eq!(offline.put(Section::Hero, hero.clone()).await.unwrap(), Origin::Local);

    // Server comes up; the same cache flushes to it.
    let client = spawn_server(&dir).await;
    let online = ContentService::new(client.clone(), cache_path);
    assert_eq!(online.flush().await.unwrap(), 1);

    let remote = client.get_section(Section::Hero).await.unwrap();
    assert_eq!(remote, hero);

    let (content, origin) = online.get(Section::Hero).await.unwrap();
    assert_eq!(origin, Origin::Remote);
    assert_eq!(content, hero);
}

#[tokio::test]
async fn ping_answers() {
    let dir = tempfile::tempdir().unwrap();
    let client = spawn_server(&dir).await;
    assert!(client.ping().await.unwrap());
}
