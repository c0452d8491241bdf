//! Dropbox media buffer and analytics collection against a mock server

use std::sync::Arc;

use libastrum::analytics::AnalyticsCollector;
use libastrum::config::Endpoints;
use libastrum::media::MediaBuffer;
use libastrum::storage::{JsonFileStore, SharedStore};
use libastrum::types::{MediaStatus, MediaType};
use libastrum::{KeyStore, PlatformId};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    store: SharedStore,
    key_store: Arc<KeyStore>,
    endpoints: Endpoints,
    _temp_dir: TempDir,
}

fn fixture(server: &MockServer) -> Fixture {
    let temp_dir = TempDir::new().unwrap();
    let store: SharedStore = Arc::new(JsonFileStore::new(temp_dir.path().to_path_buf()));
    let key_store = Arc::new(KeyStore::new(Arc::clone(&store)));
    Fixture {
        store,
        key_store,
        endpoints: Endpoints::all(&server.uri()),
        _temp_dir: temp_dir,
    }
}

impl Fixture {
    fn media(&self) -> MediaBuffer {
        MediaBuffer::new(
            Arc::clone(&self.store),
            Arc::clone(&self.key_store),
            self.endpoints.clone(),
            reqwest::Client::new(),
        )
    }

    fn analytics(&self) -> AnalyticsCollector {
        AnalyticsCollector::new(
            Arc::clone(&self.store),
            Arc::clone(&self.key_store),
            self.endpoints.clone(),
            reqwest::Client::new(),
        )
    }
}

#[tokio::test]
async fn test_upload_reuses_existing_shared_link() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/upload"))
        .and(header("Authorization", "Bearer dbx-token"))
        .and(header_exists("Dropbox-API-Arg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path_display": "/astrumverse/instagram/1700000000000_cover.png"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/sharing/create_shared_link_with_settings"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error_summary": "shared_link_already_exists/..",
            "error": {
                ".tag": "shared_link_already_exists",
                "shared_link_already_exists": {
                    "metadata": {"url": "https://www.dropbox.com/s/abc/cover.png?dl=0"}
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fixture = fixture(&server);
    fixture
        .key_store
        .update(|c| c.dropbox.access_token = "dbx-token".to_string())
        .unwrap();
    let media = fixture.media();

    let item = media
        .upload("cover.png", vec![0x89, 0x50, 0x4e, 0x47], "instagram")
        .await
        .expect("upload should succeed");

    assert_eq!(item.url, "https://www.dropbox.com/s/abc/cover.png?raw=1");
    assert_eq!(item.remote_path, "/astrumverse/instagram/1700000000000_cover.png");
    assert_eq!(item.media_type, MediaType::Image);
    assert_eq!(item.status, MediaStatus::Uploaded);
    assert_eq!(media.unused("instagram").unwrap(), vec![item]);
}

#[tokio::test]
async fn test_failed_upload_records_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/upload"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error_summary": "expired_access_token/"})),
        )
        .mount(&server)
        .await;

    let fixture = fixture(&server);
    fixture
        .key_store
        .update(|c| c.dropbox.access_token = "stale".to_string())
        .unwrap();
    let media = fixture.media();

    assert!(media.upload("clip.mp4", vec![1, 2, 3], "youtube").await.is_none());
    assert!(media.list(None).unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_remote() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/upload"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"path_display": "/astrumverse/youtube/clip.mp4"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/sharing/create_shared_link_with_settings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"url": "https://www.dropbox.com/s/x/clip.mp4?dl=0"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/delete_v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"metadata": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let fixture = fixture(&server);
    fixture
        .key_store
        .update(|c| c.dropbox.access_token = "dbx-token".to_string())
        .unwrap();
    let media = fixture.media();

    let item = media.upload("clip.mp4", vec![0; 16], "youtube").await.unwrap();
    assert_eq!(item.media_type, MediaType::Video);
    assert!(media.delete_remote(&item).await);
    assert!(media.remove(&item.id).unwrap());
}

#[tokio::test]
async fn test_collect_analytics_from_ready_platforms() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles/me"))
        .and(header("api-key", "dev-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"page_views_count": 100, "public_reactions_count": 7, "comments_count": 2},
            {"page_views_count": 50, "public_reactions_count": 3, "comments_count": 0}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/users/me"))
        .and(query_param("user.fields", "public_metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"public_metrics": {"followers_count": 321, "like_count": 12}}
        })))
        .mount(&server)
        .await;

    let fixture = fixture(&server);
    fixture
        .key_store
        .update(|c| {
            c.devto.api_key = "dev-key".to_string();
            c.twitter.bearer_token = "bearer".to_string();
            c.twitter.api_key = "key".to_string();
            c.twitter.api_key_secret = "secret".to_string();
        })
        .unwrap();
    let analytics = fixture.analytics();

    let snapshots = analytics.collect().await.unwrap();
    assert_eq!(snapshots.len(), 2);

    let devto = &analytics.history(Some(PlatformId::Devto)).unwrap()[0];
    assert_eq!((devto.views, devto.likes, devto.comments), (150, 10, 2));
    let twitter = &analytics.history(Some(PlatformId::Twitter)).unwrap()[0];
    assert_eq!(twitter.followers, 321);

    // Collecting again the same day replaces rather than appends
    analytics.collect().await.unwrap();
    assert_eq!(analytics.history(None).unwrap().len(), 2);
}

#[tokio::test]
async fn test_failing_platform_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/channels"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"message": "quotaExceeded"}
        })))
        .mount(&server)
        .await;

    let fixture = fixture(&server);
    fixture
        .key_store
        .update(|c| {
            c.youtube.access_token = "yt".to_string();
            c.youtube.client_id = "client".to_string();
        })
        .unwrap();

    let snapshots = fixture.analytics().collect().await.unwrap();
    assert!(snapshots.is_empty());
}
