#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end pipeline tests with mocked embedding and completion services:
// build the artifacts from a small corpus, then retrieve and answer.

use medrag::RagError;
use medrag::config::{Config, GenerationConfig, OllamaConfig};
use medrag::corpus::ReviewRecord;
use medrag::generation::CompletionClient;
use medrag::indexer::IndexBuilder;
use medrag::retrieval::RetrievalEngine;
use serde_json::json;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn scenario_corpus() -> Vec<ReviewRecord> {
    vec![
        ReviewRecord {
            drug_name: "Fluoxetine".to_string(),
            condition: "Depression".to_string(),
            gender: "Female".to_string(),
            age_group: "30-40".to_string(),
            time_on_drug: "6 months".to_string(),
            rating_overall: 9.0,
            review_text: "Really helped my depression.".to_string(),
        },
        ReviewRecord {
            drug_name: "Bupropion".to_string(),
            condition: "Smoking Cessation".to_string(),
            gender: "Male".to_string(),
            age_group: "40-50".to_string(),
            time_on_drug: "2 months".to_string(),
            rating_overall: 7.0,
            review_text: "Helped me quit smoking.".to_string(),
        },
        ReviewRecord {
            drug_name: "Lexapro".to_string(),
            condition: "Depression".to_string(),
            gender: "Male".to_string(),
            age_group: "20-30".to_string(),
            time_on_drug: "1 year".to_string(),
            rating_overall: 8.0,
            review_text: "Positive experience overall.".to_string(),
        },
    ]
}

fn test_config(base_dir: &std::path::Path, mock_uri: &str) -> Config {
    let url = Url::parse(mock_uri).expect("mock server uri should parse");
    Config {
        ollama: OllamaConfig {
            host: url.host_str().expect("mock host").to_string(),
            port: url.port().expect("mock port"),
            embedding_dimension: 2,
            ..OllamaConfig::default()
        },
        generation: GenerationConfig {
            base_url: format!("{}/v1", mock_uri),
            api_key: Some("test-key".to_string()),
            ..GenerationConfig::default()
        },
        base_dir: base_dir.to_path_buf(),
    }
}

/// Corpus embeddings for the batch endpoint, query embedding for the single
/// endpoint. Fluoxetine sits closest to the query vector, then Lexapro.
async fn mock_embedding_service(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_string_contains("\"input\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0], [0.0, 1.0], [0.6, 0.4]]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_string_contains("\"prompt\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [0.95, 0.05]
        })))
        .mount(server)
        .await;
}

async fn build_artifacts(config: &Config) {
    let mut builder = IndexBuilder::new(config.clone())
        .await
        .expect("should create index builder");
    let stats = builder
        .build(&scenario_corpus())
        .await
        .expect("build should succeed");
    assert_eq!(stats.records_indexed, 3);
    assert_eq!(stats.vector_dimension, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn build_then_retrieve_ranks_fluoxetine_first() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let server = MockServer::start().await;
    mock_embedding_service(&server).await;

    let config = test_config(temp_dir.path(), &server.uri());
    build_artifacts(&config).await;

    let engine = RetrievalEngine::open(&config)
        .await
        .expect("should open engine");
    assert_eq!(engine.review_count(), 3);

    let results = engine
        .retrieve("best drug for depression in women 30 to 40", 2)
        .await
        .expect("should retrieve");

    assert_eq!(results.len(), 2);
    assert!(results[0].combined_text.contains("Drug Name: Fluoxetine"));
    assert!(results[1].combined_text.contains("Drug Name: Lexapro"));
    assert!(results[0].distance <= results[1].distance);
}

#[tokio::test(flavor = "multi_thread")]
async fn build_then_answer_generates_from_context() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let server = MockServer::start().await;
    mock_embedding_service(&server).await;

    // The answer prompt must carry the nearest review as grounding context
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains(
            "expert assistant for depression drug recommendations",
        ))
        .and(body_string_contains("Drug Name: Fluoxetine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [ { "message": {
                "role": "assistant",
                "content": "Fluoxetine has the strongest reviews for depression in women aged 30-40."
            } } ]
        })))
        .mount(&server)
        .await;

    let config = test_config(temp_dir.path(), &server.uri());
    build_artifacts(&config).await;

    let engine = RetrievalEngine::open(&config)
        .await
        .expect("should open engine");
    let completion = CompletionClient::new(&config).expect("should create completion client");

    let answer = engine
        .answer(&completion, "best drug for depression in women 30 to 40", 5)
        .await
        .expect("should generate answer");

    assert_eq!(
        answer,
        "Fluoxetine has the strongest reviews for depression in women aged 30-40."
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn querying_before_building_fails_with_metadata_load() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let server = MockServer::start().await;

    let config = test_config(temp_dir.path(), &server.uri());
    let err = RetrievalEngine::open(&config)
        .await
        .expect_err("should fail before any build");

    assert!(matches!(err, RagError::MetadataLoad(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn rebuilding_replaces_artifacts_in_place() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let server = MockServer::start().await;
    mock_embedding_service(&server).await;

    let config = test_config(temp_dir.path(), &server.uri());
    build_artifacts(&config).await;
    build_artifacts(&config).await;

    let engine = RetrievalEngine::open(&config)
        .await
        .expect("should open engine after rebuild");
    assert_eq!(engine.review_count(), 3);

    let results = engine
        .retrieve("depression", 50)
        .await
        .expect("should retrieve");
    assert_eq!(results.len(), 3);
}
