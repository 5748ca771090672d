#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance with an embedding
// model pulled. Run with: cargo test --test integration_ollama -- --ignored

use medrag::config::{Config, GenerationConfig, OllamaConfig};
use medrag::embeddings::ollama::OllamaClient;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const TEST_MODEL: &str = "all-minilm:latest";
const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn create_integration_test_client() -> OllamaClient {
    let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    let port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);
    let model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| TEST_MODEL.to_string());

    let config = Config {
        ollama: OllamaConfig {
            host,
            port,
            model,
            batch_size: 5, // Smaller batch size for testing
            ..OllamaConfig::default()
        },
        generation: GenerationConfig::default(),
        base_dir: PathBuf::new(),
    };

    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(60)) // Longer timeout for embedding generation
        .with_retry_attempts(3)
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    let client = create_integration_test_client();
    client
        .health_check()
        .expect("health check should pass against a running Ollama");
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_embedding_is_deterministic() {
    let client = create_integration_test_client();

    let text = "Drug Name: Fluoxetine | Condition: Depression | Review: Helped a lot.";
    let first = client.embed_text(text).expect("should embed text");
    let second = client.embed_text(text).expect("should embed text again");

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert!((a - b).abs() < 1e-5, "embeddings should be numerically equivalent");
    }
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_batch_embedding_matches_corpus_size() {
    let client = create_integration_test_client();

    let texts: Vec<String> = (0..7)
        .map(|i| format!("Review number {} mentions improved mood.", i))
        .collect();
    let embeddings = client.embed_texts(&texts).expect("should embed batch");

    assert_eq!(embeddings.len(), texts.len());
    let dimension = embeddings[0].len();
    assert!(dimension > 0);
    assert!(embeddings.iter().all(|v| v.len() == dimension));
}
