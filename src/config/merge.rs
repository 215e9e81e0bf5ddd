use std::collections::BTreeMap;
use std::env;

use super::utils::{dedup_preserving_order, parse_bool, parse_list, parse_value};
use super::yaml::YamlConfig;
use super::{DEFAULT_MODEL_NICKNAME, ServerConfig, default_models};
use crate::core::audio::DEFAULT_BITRATE_KBPS;
use crate::core::synthesis::OutputFormat;
use crate::core::upstream::DEFAULT_GEMINI_BASE_URL;

/// Prefix of the environment variables that declare model nicknames.
const MODEL_ENV_PREFIX: &str = "NARRATOR_MODEL_";

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. YAML configuration values
/// 2. Environment variables
/// 3. Default values
///
/// This allows environment variables to provide base configuration while YAML
/// can override specific values for different deployment environments.
///
/// # Arguments
/// * `yaml_config` - Optional YAML configuration to use as overrides
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml_config.unwrap_or_default();

    // Helper macro to get value with priority: YAML > ENV > Default
    macro_rules! get_value {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            $yaml_value
                .or_else(|| env::var($env_var).ok())
                .unwrap_or_else(|| $default.to_string())
        };
    }

    // Helper macro for optional values: YAML > ENV
    macro_rules! get_optional {
        ($env_var:expr, $yaml_value:expr) => {
            $yaml_value.or_else(|| env::var($env_var).ok())
        };
    }

    // Helper macro for typed values: YAML > parsed ENV > Default
    macro_rules! get_parsed {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            match $yaml_value {
                Some(value) => value,
                None => match env::var($env_var) {
                    Ok(raw) => parse_value($env_var, &raw)?,
                    Err(_) => $default,
                },
            }
        };
    }

    let server = yaml.server.clone().unwrap_or_default();
    let gemini = yaml.gemini.clone().unwrap_or_default();
    let synthesis = yaml.synthesis.clone().unwrap_or_default();
    let output = yaml.output.clone().unwrap_or_default();

    // Server configuration
    let host = get_value!("HOST", server.host, "0.0.0.0");
    let port: u16 = get_parsed!("PORT", server.port, 8080);

    // Gemini configuration
    let yaml_keys = yaml.api_keys();
    let gemini_api_keys = if yaml_keys.is_empty() {
        env_api_keys()
    } else {
        dedup_preserving_order(yaml_keys)
    };

    let gemini_base_url = get_value!(
        "GEMINI_BASE_URL",
        gemini.base_url,
        DEFAULT_GEMINI_BASE_URL
    );
    let language_code =
        get_optional!("LANGUAGE_CODE", gemini.language_code).filter(|code| !code.trim().is_empty());

    // Candidate selection
    let default_model = get_value!(
        "DEFAULT_MODEL",
        synthesis.default_model,
        DEFAULT_MODEL_NICKNAME
    )
    .trim()
    .to_ascii_lowercase();
    let models = merge_models(yaml.models.clone());
    let shuffle_credentials = match synthesis.shuffle_credentials {
        Some(value) => value,
        None => match env::var("SHUFFLE_CREDENTIALS") {
            Ok(raw) => parse_bool(&raw)
                .ok_or_else(|| format!("Invalid SHUFFLE_CREDENTIALS value '{raw}'"))?,
            Err(_) => true,
        },
    };

    // Retry policy
    let max_attempts_per_candidate: u32 = get_parsed!(
        "MAX_ATTEMPTS_PER_CANDIDATE",
        synthesis.max_attempts_per_candidate,
        3
    );
    let retry_base_delay_ms: u64 =
        get_parsed!("RETRY_BASE_DELAY_MS", synthesis.retry_base_delay_ms, 2000);
    let retry_jitter_ms: u64 = get_parsed!("RETRY_JITTER_MS", synthesis.retry_jitter_ms, 1000);

    // Output packaging
    let output_format: OutputFormat =
        get_parsed!("OUTPUT_FORMAT", output.format, OutputFormat::Compressed);
    let mp3_bitrate_kbps: u32 =
        get_parsed!("MP3_BITRATE_KBPS", output.mp3_bitrate_kbps, DEFAULT_BITRATE_KBPS);
    let output_channels: u16 = get_parsed!("OUTPUT_CHANNELS", output.channels, 1);

    // Request limits
    let max_text_chars: usize = get_parsed!("MAX_TEXT_CHARS", synthesis.max_text_chars, 5000);
    let request_timeout_seconds: u64 = get_parsed!(
        "REQUEST_TIMEOUT_SECONDS",
        synthesis.request_timeout_seconds,
        120
    );

    // Text pre-processing
    let allowed_tags = yaml
        .text
        .as_ref()
        .and_then(|t| t.allowed_tags.clone())
        .or_else(|| env::var("ALLOWED_TAGS").ok().map(|raw| parse_list(&raw)));

    Ok(ServerConfig {
        host,
        port,
        gemini_api_keys,
        gemini_base_url,
        language_code,
        default_model,
        models,
        shuffle_credentials,
        max_attempts_per_candidate,
        retry_base_delay_ms,
        retry_jitter_ms,
        output_format,
        mp3_bitrate_kbps,
        output_channels,
        max_text_chars,
        request_timeout_seconds,
        allowed_tags,
    })
}

/// Credential pool from `GEMINI_API_KEY` followed by `GEMINI_API_KEYS`.
fn env_api_keys() -> Vec<String> {
    let single = env::var("GEMINI_API_KEY")
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());
    let pool = env::var("GEMINI_API_KEYS")
        .map(|raw| parse_list(&raw))
        .unwrap_or_default();

    dedup_preserving_order(single.into_iter().chain(pool))
}

/// Nickname map: defaults, overlaid by `NARRATOR_MODEL_<NICKNAME>` variables, overlaid by YAML.
///
/// Variables whose name or value is not valid UTF-8 are skipped.
fn merge_models(yaml_models: Option<BTreeMap<String, Vec<String>>>) -> BTreeMap<String, Vec<String>> {
    let mut models = default_models();

    let utf8_vars = env::vars_os()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)));

    for (name, value) in utf8_vars {
        if let Some(nickname) = name.strip_prefix(MODEL_ENV_PREFIX)
            && !nickname.is_empty()
        {
            models.insert(nickname.to_ascii_lowercase(), parse_list(&value));
        }
    }

    for (nickname, ids) in yaml_models.unwrap_or_default() {
        let ids = ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        models.insert(nickname.trim().to_ascii_lowercase(), ids);
    }

    models
}
