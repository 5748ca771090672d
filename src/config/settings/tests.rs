use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config {
        ollama: OllamaConfig::default(),
        generation: GenerationConfig::default(),
        base_dir: PathBuf::new(),
    };
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.model, "all-minilm:latest");
    assert_eq!(config.ollama.embedding_dimension, 384);
    assert_eq!(config.generation.model, "gpt-3.5-turbo");
    assert_eq!(config.generation.max_tokens, 300);
    assert!(config.generation.api_key.is_none());
}

#[test]
fn config_validation() {
    let config = Config {
        ollama: OllamaConfig::default(),
        generation: GenerationConfig::default(),
        base_dir: PathBuf::new(),
    };
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.temperature = 3.0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.max_tokens = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.generation.max_context_tokens = 10;
    assert!(invalid_config.validate().is_err());
}

#[test]
fn ollama_url_generation() {
    let config = OllamaConfig::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn completions_url_generation() {
    let config = GenerationConfig::default();
    let url = config
        .completions_url()
        .expect("should generate completions url successfully");
    assert_eq!(url.as_str(), "https://api.openai.com/v1/chat/completions");

    let trailing = GenerationConfig {
        base_url: "http://localhost:8080/v1/".to_string(),
        ..GenerationConfig::default()
    };
    let url = trailing
        .completions_url()
        .expect("should tolerate trailing slash");
    assert_eq!(url.as_str(), "http://localhost:8080/v1/chat/completions");
}

#[test]
fn toml_round_trip() {
    let config = Config {
        ollama: OllamaConfig::default(),
        generation: GenerationConfig::default(),
        base_dir: PathBuf::new(),
    };
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config.ollama, parsed_config.ollama);
    assert_eq!(config.generation, parsed_config.generation);
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_model("new-model".to_string()).is_ok());
    assert!(config.set_batch_size(128).is_ok());

    assert!(config.set_port(0).is_err());
    assert!(config.set_model(String::new()).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_batch_size(1001).is_err());
}

#[test]
fn load_missing_config_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config = Config::load(temp_dir.path()).expect("should load config successfully");
    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(config.generation, GenerationConfig::default());
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let mut config = Config::load(temp_dir.path()).expect("should load defaults");
    config.ollama.model = "all-minilm:l6-v2".to_string();
    config.generation.max_tokens = 256;
    config.save().expect("should save config");

    let reloaded = Config::load(temp_dir.path()).expect("should reload config");
    assert_eq!(reloaded.ollama.model, "all-minilm:l6-v2");
    assert_eq!(reloaded.generation.max_tokens, 256);
}

#[test]
fn artifact_paths_derive_from_base_dir() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert_eq!(
        config.metadata_path().expect("metadata path"),
        temp_dir.path().join("metadata.db")
    );
    assert_eq!(
        config.vector_index_path().expect("vector path"),
        temp_dir.path().join("vectors")
    );
}
