//! Configuration module for the narrator server
//!
//! Configuration comes from environment variables (a `.env` file is honoured)
//! and, optionally, a YAML file given with `--config`. When both are present
//! YAML values take priority over environment values, which take priority over
//! the built-in defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use narrator::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from a YAML file layered over the environment
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::audio::{DEFAULT_BITRATE_KBPS, TargetCodec, Transcoder};
use crate::core::candidates::CandidateResolver;
use crate::core::synthesis::{BackoffPolicy, Credential, OutputFormat};
use crate::core::upstream::DEFAULT_GEMINI_BASE_URL;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Model used when the caller does not pick one.
pub const DEFAULT_MODEL_NICKNAME: &str = "flash";

/// Concrete Gemini TTS model identifiers.
pub const GEMINI_FLASH_TTS: &str = "gemini-2.5-flash-preview-tts";
pub const GEMINI_PRO_TTS: &str = "gemini-2.5-pro-preview-tts";

/// Built-in nickname map: each nickname prefers its own model and falls back to the other.
pub fn default_models() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            "flash".to_string(),
            vec![GEMINI_FLASH_TTS.to_string(), GEMINI_PRO_TTS.to_string()],
        ),
        (
            "pro".to_string(),
            vec![GEMINI_PRO_TTS.to_string(), GEMINI_FLASH_TTS.to_string()],
        ),
    ])
}

/// Server configuration
///
/// Contains all configuration needed to run the narrator server:
/// - Server settings (host, port)
/// - Gemini credentials pool and API root
/// - Model nickname map
/// - Retry/backoff policy
/// - Output packaging (format, bitrate, channels)
/// - Request limits
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Upstream settings
    pub gemini_api_keys: Vec<String>,
    pub gemini_base_url: String,
    pub language_code: Option<String>,

    // Candidate selection
    pub default_model: String,
    pub models: BTreeMap<String, Vec<String>>,
    pub shuffle_credentials: bool,

    // Retry policy
    pub max_attempts_per_candidate: u32,
    pub retry_base_delay_ms: u64,
    pub retry_jitter_ms: u64,

    // Output packaging
    pub output_format: OutputFormat,
    pub mp3_bitrate_kbps: u32,
    pub output_channels: u16,

    // Request limits
    pub max_text_chars: usize,
    pub request_timeout_seconds: u64,

    // Text pre-processing; `None` leaves the text untouched
    pub allowed_tags: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            gemini_api_keys: Vec::new(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            language_code: None,
            default_model: DEFAULT_MODEL_NICKNAME.to_string(),
            models: default_models(),
            shuffle_credentials: true,
            max_attempts_per_candidate: 3,
            retry_base_delay_ms: 2000,
            retry_jitter_ms: 1000,
            output_format: OutputFormat::Compressed,
            mp3_bitrate_kbps: DEFAULT_BITRATE_KBPS,
            output_channels: 1,
            max_text_chars: 5000,
            request_timeout_seconds: 120,
            allowed_tags: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file layered over environment variables
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables
    /// 3. Default values
    ///
    /// The `.env` file is not read here: the YAML file is the source of truth
    /// and only real environment variables fill the gaps it leaves.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn credentials(&self) -> Vec<Credential> {
        self.gemini_api_keys
            .iter()
            .map(|key| Credential::new(key.as_str()))
            .collect()
    }

    pub fn candidate_resolver(&self) -> CandidateResolver {
        CandidateResolver::new(
            self.models.clone(),
            self.credentials(),
            self.default_model.as_str(),
            self.shuffle_credentials,
        )
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_jitter_ms),
        )
    }

    pub fn transcoder(&self) -> Transcoder {
        Transcoder::new(TargetCodec::Mp3, self.mp3_bitrate_kbps, self.output_channels)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    fn cleanup_env_vars() {
        unsafe {
            for var in [
                "HOST",
                "PORT",
                "GEMINI_API_KEY",
                "GEMINI_API_KEYS",
                "OUTPUT_FORMAT",
                "MAX_ATTEMPTS_PER_CANDIDATE",
                "NARRATOR_MODEL_FLASH",
            ] {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "0.0.0.0:8080");
        assert_eq!(config.output_format, OutputFormat::Compressed);
        assert_eq!(config.models["flash"][0], GEMINI_FLASH_TTS);
        assert_eq!(config.models["pro"][0], GEMINI_PRO_TTS);
        assert_eq!(config.backoff_policy(), BackoffPolicy::default());
        assert_eq!(config.transcoder(), Transcoder::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_candidate_resolver_uses_pool() {
        let config = ServerConfig {
            gemini_api_keys: vec!["k1".to_string(), "k2".to_string()],
            shuffle_credentials: false,
            ..Default::default()
        };
        let candidates = config.candidate_resolver().resolve(Some("pro")).unwrap();
        assert_eq!(candidates.len(), 4);
        assert_eq!(candidates[0].model_id, GEMINI_PRO_TTS);
        assert_eq!(candidates[0].credential.expose(), "k1");
        assert_eq!(candidates[3].model_id, GEMINI_FLASH_TTS);
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 9090

gemini:
  api_keys: ["yaml-key-1", "yaml-key-2"]

output:
  format: wav
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.gemini_api_keys, vec!["yaml-key-1", "yaml-key-2"]);
        assert_eq!(config.output_format, OutputFormat::RawContainer);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  port: 9090

gemini:
  api_key: "yaml-key"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "10.0.0.1");
            env::set_var("PORT", "7000");
            env::set_var("GEMINI_API_KEY", "env-key");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML wins over ENV
        assert_eq!(config.port, 9090);
        assert_eq!(config.gemini_api_keys, vec!["yaml-key"]);
        // ENV used when YAML is silent
        assert_eq!(config.host, "10.0.0.1");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let result = ServerConfig::from_file(&PathBuf::from("/nonexistent/config.yaml"));
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_yaml() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "invalid: yaml: [content").unwrap();

        let result = ServerConfig::from_file(&config_path);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_from_file_validation_failure() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            "gemini:\n  api_key: \"k\"\nsynthesis:\n  max_attempts_per_candidate: 0\n",
        )
        .unwrap();

        let err = ServerConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("MAX_ATTEMPTS_PER_CANDIDATE"));
    }
}
