use serial_test::serial;
use tempfile::TempDir;

use super::load_existing_config as load_existing_config_impl;

#[test]
#[serial]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    // SAFETY: guarded by #[serial]; no other thread touches the environment
    unsafe {
        std::env::set_var("MEDRAG_HOME", temp_dir.path());
    }

    let config = load_existing_config_impl().expect("config loaded successfully");
    assert!(!config.ollama.host.is_empty());
    assert!(config.ollama.port > 0);
    assert!(!config.ollama.model.is_empty());
    assert!(config.ollama.batch_size > 0);
    assert!(!config.generation.model.is_empty());

    // SAFETY: guarded by #[serial]
    unsafe {
        std::env::remove_var("MEDRAG_HOME");
    }
}
