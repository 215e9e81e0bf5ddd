use std::collections::BTreeMap;

use super::ServerConfig;
use crate::core::audio::SUPPORTED_BITRATES_KBPS;

/// Validate the fully merged configuration
pub fn validate_config(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_credentials(&config.gemini_api_keys)?;
    validate_models(&config.models, &config.default_model)?;
    validate_retry(config.max_attempts_per_candidate)?;
    validate_output(config.mp3_bitrate_kbps, config.output_channels)?;
    validate_limits(config.max_text_chars, config.request_timeout_seconds)?;
    Ok(())
}

/// At least one Gemini API key must be configured
pub fn validate_credentials(api_keys: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    if api_keys.iter().all(|key| key.trim().is_empty()) {
        return Err("At least one Gemini API key is required (GEMINI_API_KEY or GEMINI_API_KEYS)".into());
    }
    Ok(())
}

/// Every nickname needs at least one model and the default nickname must exist
pub fn validate_models(
    models: &BTreeMap<String, Vec<String>>,
    default_model: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some((nickname, _)) = models.iter().find(|(_, ids)| ids.is_empty()) {
        return Err(format!("Model nickname '{nickname}' has no model identifiers").into());
    }

    if !models.contains_key(default_model) {
        let available: Vec<&str> = models.keys().map(String::as_str).collect();
        return Err(format!(
            "DEFAULT_MODEL '{default_model}' is not a configured nickname (available: {})",
            available.join(", ")
        )
        .into());
    }

    Ok(())
}

/// Each candidate must be attempted at least once
pub fn validate_retry(max_attempts_per_candidate: u32) -> Result<(), Box<dyn std::error::Error>> {
    if max_attempts_per_candidate == 0 {
        return Err("MAX_ATTEMPTS_PER_CANDIDATE must be at least 1".into());
    }
    Ok(())
}

/// The encoder only supports fixed bitrates and mono or stereo output
pub fn validate_output(
    mp3_bitrate_kbps: u32,
    output_channels: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    if !SUPPORTED_BITRATES_KBPS.contains(&mp3_bitrate_kbps) {
        return Err(format!(
            "MP3_BITRATE_KBPS {mp3_bitrate_kbps} is not supported (expected one of {SUPPORTED_BITRATES_KBPS:?})"
        )
        .into());
    }

    if !matches!(output_channels, 1 | 2) {
        return Err(format!("OUTPUT_CHANNELS must be 1 or 2, got {output_channels}").into());
    }

    Ok(())
}

/// Request limits must be positive
pub fn validate_limits(
    max_text_chars: usize,
    request_timeout_seconds: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    if max_text_chars == 0 {
        return Err("MAX_TEXT_CHARS must be greater than 0".into());
    }
    if request_timeout_seconds == 0 {
        return Err("REQUEST_TIMEOUT_SECONDS must be greater than 0".into());
    }
    Ok(())
}
