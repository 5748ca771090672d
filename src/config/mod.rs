// Configuration management module
// Handles TOML configuration loading, validation, and interactive setup

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, GenerationConfig, OllamaConfig};

/// Get the configuration directory path
///
/// Honors the `MEDRAG_HOME` environment variable, falling back to `~/.medrag`.
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os("MEDRAG_HOME") {
        return Ok(std::path::PathBuf::from(dir));
    }

    dirs::home_dir()
        .map(|home| home.join(".medrag"))
        .ok_or(ConfigError::DirectoryError)
}
