//! Content enhancer against mocked AI providers

use std::sync::Arc;

use libastrum::config::Endpoints;
use libastrum::credentials::{AiProviderKind, CredentialSet};
use libastrum::enhancer::ContentEnhancer;
use libastrum::quota::QuotaRotator;
use libastrum::storage::MemoryStore;
use libastrum::{KeyStore, PlatformId};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn enhancer(server: &MockServer, credentials: CredentialSet) -> (ContentEnhancer, Arc<KeyStore>) {
    let key_store = Arc::new(KeyStore::new(MemoryStore::shared()));
    key_store.save(&credentials).unwrap();
    let enhancer = ContentEnhancer::new(
        QuotaRotator::new(Arc::clone(&key_store)),
        Endpoints::all(&server.uri()),
        reqwest::Client::new(),
    );
    (enhancer, key_store)
}

fn openai_answer(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": text}}]
    }))
}

fn with_openai_key() -> CredentialSet {
    let mut credentials = CredentialSet::default();
    credentials.openai.api_key = "sk-primary".to_string();
    credentials
}

#[tokio::test]
async fn test_unstructured_tag_answer_falls_back_to_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-primary"))
        .respond_with(openai_answer("Great post!"))
        .expect(1)
        .mount(&server)
        .await;

    let (enhancer, key_store) = enhancer(&server, with_openai_key());
    let result = enhancer.generate_tags("Some content", None).await;

    assert!(result.success);
    assert_eq!(result.tags, vec!["general", "content", "post"]);
    assert!(result.error.is_none());
    assert_eq!(key_store.load().unwrap().openai.usage_count, 1);
}

#[tokio::test]
async fn test_fenced_json_tags_are_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(openai_answer(
            "```json\n{\"tags\": [\"#Rust\", \"async\", \"rust\"]}\n```",
        ))
        .mount(&server)
        .await;

    let (enhancer, _) = enhancer(&server, with_openai_key());
    let result = enhancer
        .generate_tags("Async Rust in practice", Some(PlatformId::Devto))
        .await;
    assert_eq!(result.tags, vec!["rust", "async"]);
}

#[tokio::test]
async fn test_exhausted_primary_rotates_to_gemini_backup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .and(query_param("key", "x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{
                "text": "{\"correctedText\": \"I am here.\", \"suggestions\": [\"is -> am\"]}"
            }]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut credentials = with_openai_key();
    credentials.openai.usage_count = 100;
    credentials.openai.daily_limit = 100;
    credentials.backup_ai1.provider = AiProviderKind::Gemini;
    credentials.backup_ai1.api_key = "x".to_string();
    credentials.backup_ai1.daily_limit = 10;

    let (enhancer, key_store) = enhancer(&server, credentials);
    let result = enhancer.check_grammar("I is here.").await;

    assert!(result.success);
    assert_eq!(result.corrected_text, "I am here.");
    assert_eq!(result.suggestions, vec!["is -> am"]);

    let stored = key_store.load().unwrap();
    assert_eq!(stored.backup_ai1.usage_count, 1);
    assert_eq!(stored.openai.usage_count, 100);
}

#[tokio::test]
async fn test_no_provider_is_reported_not_raised() {
    let server = MockServer::start().await;
    let (enhancer, _) = enhancer(&server, CredentialSet::default());

    let result = enhancer.check_grammar("text").await;
    assert!(!result.success);
    assert_eq!(result.corrected_text, "text");
    assert_eq!(
        result.error.as_deref(),
        Some("No AI provider configured with remaining quota")
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_provider_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({"error": {"message": "Rate limit reached"}})),
        )
        .mount(&server)
        .await;

    let (enhancer, _) = enhancer(&server, with_openai_key());
    let result = enhancer
        .optimize_content("Long text", PlatformId::Twitter)
        .await;

    assert!(!result.success);
    assert_eq!(result.optimized_text, "Long text");
    assert_eq!(
        result.error.as_deref(),
        Some("OpenAI API error: 429 - Rate limit reached")
    );
}

#[tokio::test]
async fn test_answer_without_text_keeps_original() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        })))
        .mount(&server)
        .await;

    let (enhancer, _) = enhancer(&server, with_openai_key());
    let result = enhancer.check_grammar("Keep this body.").await;

    assert!(!result.success);
    assert_eq!(result.corrected_text, "Keep this body.");
    assert_eq!(
        result.error.as_deref(),
        Some("OpenAI API error: empty response")
    );
}

#[tokio::test]
async fn test_gemini_without_candidates_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let mut credentials = CredentialSet::default();
    credentials.backup_ai1.provider = AiProviderKind::Gemini;
    credentials.backup_ai1.api_key = "g-key".to_string();
    credentials.backup_ai1.daily_limit = 10;

    let (enhancer, _) = enhancer(&server, credentials);
    let result = enhancer.generate_tags("Some content", None).await;

    assert!(!result.success);
    assert!(result.tags.is_empty());
    assert_eq!(
        result.error.as_deref(),
        Some("Gemini API error: empty response")
    );
}
