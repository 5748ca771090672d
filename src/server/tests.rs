use super::*;
use crate::config::{Config, GenerationConfig, OllamaConfig};
use crate::database::sqlite::models::NewReviewRow;
use serde_json::json;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

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

async fn seed_artifacts(base_dir: &std::path::Path) {
    let database = crate::database::sqlite::Database::create(base_dir.join("metadata.db"))
        .await
        .expect("should create metadata database");

    let rows = vec![
        NewReviewRow {
            drug_name: "Fluoxetine".to_string(),
            condition: "Depression".to_string(),
            gender: "Female".to_string(),
            age_group: "30-40".to_string(),
            time_on_drug: "6 months".to_string(),
            rating_overall: 9.0,
            review_text: "Worked well.".to_string(),
            combined_text: "Drug Name: Fluoxetine | Condition: Depression".to_string(),
        },
        NewReviewRow {
            drug_name: "Lexapro".to_string(),
            condition: "Depression".to_string(),
            gender: "Male".to_string(),
            age_group: "20-30".to_string(),
            time_on_drug: "1 year".to_string(),
            rating_overall: 8.0,
            review_text: "Improved steadily.".to_string(),
            combined_text: "Drug Name: Lexapro | Condition: Depression".to_string(),
        },
    ];
    database
        .replace_reviews(&rows)
        .await
        .expect("should insert rows");
    database
        .save_manifest(&crate::database::sqlite::queries::new_manifest(
            "all-minilm:latest",
            2,
            rows.len(),
        ))
        .await
        .expect("should save manifest");

    let mut store = crate::database::lancedb::VectorStore::create(&base_dir.join("vectors"))
        .await
        .expect("should create vector store");
    store
        .replace_vectors(&[vec![1.0, 0.0], vec![0.0, 1.0]])
        .await
        .expect("should store vectors");
}

async fn build_state(base_dir: &std::path::Path, mock_uri: &str) -> Arc<AppState> {
    let config = test_config(base_dir, mock_uri);
    let engine = RetrievalEngine::open(&config)
        .await
        .expect("should open engine");
    let completion = CompletionClient::new(&config).expect("should create completion client");

    Arc::new(AppState { engine, completion })
}

async fn mock_relevance(server: &MockServer, verdict: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Respond with 'Yes' or 'No' only"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [ { "message": { "role": "assistant", "content": verdict } } ]
        })))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_review_count() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    seed_artifacts(temp_dir.path()).await;

    let server = MockServer::start().await;
    let state = build_state(temp_dir.path(), &server.uri()).await;

    let Json(response) = health(State(state)).await;
    assert_eq!(response.status, "ok");
    assert_eq!(response.reviews, 2);
    assert_eq!(response.embedding_model, "all-minilm:latest");
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_query_is_rejected() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    seed_artifacts(temp_dir.path()).await;

    let server = MockServer::start().await;
    let state = build_state(temp_dir.path(), &server.uri()).await;

    let result = recommend(
        State(state),
        Json(RecommendRequest {
            query: "   ".to_string(),
        }),
    )
    .await;

    let (status, Json(body)) = result.expect_err("should reject blank query");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.detail.contains("empty"));
}

#[tokio::test(flavor = "multi_thread")]
async fn off_topic_query_gets_clarification() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    seed_artifacts(temp_dir.path()).await;

    let server = MockServer::start().await;
    mock_relevance(&server, "No").await;

    let state = build_state(temp_dir.path(), &server.uri()).await;

    let Json(response) = recommend(
        State(state),
        Json(RecommendRequest {
            query: "how do I fix my bicycle?".to_string(),
        }),
    )
    .await
    .expect("off-topic queries are a valid response, not an error");

    assert_eq!(response.response, OFF_TOPIC_RESPONSE);
}

#[tokio::test(flavor = "multi_thread")]
async fn relevant_query_returns_generated_answer() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    seed_artifacts(temp_dir.path()).await;

    let server = MockServer::start().await;
    mock_relevance(&server, "Yes").await;

    // Query embedding: nearest to the Fluoxetine vector
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [0.9, 0.1]
        })))
        .mount(&server)
        .await;

    // Answer prompt carries the retrieved context
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("expert assistant for depression drug recommendations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [ { "message": {
                "role": "assistant",
                "content": "Fluoxetine is well reviewed for depression."
            } } ]
        })))
        .mount(&server)
        .await;

    let state = build_state(temp_dir.path(), &server.uri()).await;

    let Json(response) = recommend(
        State(state),
        Json(RecommendRequest {
            query: "Which drug works best for depression in women?".to_string(),
        }),
    )
    .await
    .expect("should answer relevant query");

    assert_eq!(
        response.response,
        "Fluoxetine is well reviewed for depression."
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_failure_maps_to_internal_error() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    seed_artifacts(temp_dir.path()).await;

    let server = MockServer::start().await;
    mock_relevance(&server, "Yes").await;
    // No /api/embed mock: the query embedding call fails downstream

    let state = build_state(temp_dir.path(), &server.uri()).await;

    let result = recommend(
        State(state),
        Json(RecommendRequest {
            query: "Which drug works best for depression?".to_string(),
        }),
    )
    .await;

    let (status, Json(body)) = result.expect_err("should surface pipeline failure");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.detail.contains("An error occurred"));
}
