use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::core::synthesis::OutputFormat;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration; anything left out
/// is taken from the environment or the defaults.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///
/// gemini:
///   api_key: "primary-key"
///   api_keys: ["second-key", "third-key"]
///   base_url: "https://generativelanguage.googleapis.com/v1beta"
///   language_code: "pt-BR"
///
/// synthesis:
///   default_model: "flash"
///   max_attempts_per_candidate: 3
///   retry_base_delay_ms: 2000
///   retry_jitter_ms: 1000
///   shuffle_credentials: true
///   max_text_chars: 5000
///   request_timeout_seconds: 120
///
/// output:
///   format: mp3
///   mp3_bitrate_kbps: 64
///   channels: 1
///
/// text:
///   allowed_tags: ["break"]
///
/// models:
///   flash: ["gemini-2.5-flash-preview-tts", "gemini-2.5-pro-preview-tts"]
///   pro: ["gemini-2.5-pro-preview-tts", "gemini-2.5-flash-preview-tts"]
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub gemini: Option<GeminiYaml>,
    pub synthesis: Option<SynthesisYaml>,
    pub output: Option<OutputYaml>,
    pub text: Option<TextYaml>,
    pub models: Option<BTreeMap<String, Vec<String>>>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Gemini upstream configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeminiYaml {
    pub api_key: Option<String>,
    pub api_keys: Vec<String>,
    pub base_url: Option<String>,
    pub language_code: Option<String>,
}

/// Retry and candidate settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SynthesisYaml {
    pub default_model: Option<String>,
    pub max_attempts_per_candidate: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub retry_jitter_ms: Option<u64>,
    pub shuffle_credentials: Option<bool>,
    pub max_text_chars: Option<usize>,
    pub request_timeout_seconds: Option<u64>,
}

/// Output packaging from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OutputYaml {
    pub format: Option<OutputFormat>,
    pub mp3_bitrate_kbps: Option<u32>,
    pub channels: Option<u16>,
}

/// Text pre-processing from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TextYaml {
    pub allowed_tags: Option<Vec<String>>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }

    /// Keys declared in the `gemini` section, single key first.
    pub fn api_keys(&self) -> Vec<String> {
        let Some(gemini) = &self.gemini else {
            return Vec::new();
        };
        gemini
            .api_key
            .iter()
            .chain(gemini.api_keys.iter())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect()
    }
}
