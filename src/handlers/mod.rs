//! HTTP request handlers
//!
//! - `api` - Health check endpoint
//! - `generate` - Text-to-speech generation returning an audio file

pub mod api;
pub mod generate;

pub use generate::{GenerateAudioRequest, MODEL_ID_HEADER, MODEL_USED_HEADER, generate_audio};
