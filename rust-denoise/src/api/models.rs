//! API request and response models (DTOs).

use serde::{Deserialize, Serialize};

/// Query parameters of the inline denoise endpoint.
///
/// # Example
///
/// ```text
/// POST /denoise?output_format=mp3&input_format=wav
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DenoiseQuery {
    /// Output format token (default `raw`).
    pub output_format: Option<String>,
    /// Path of a model file on the server host.
    pub model: Option<String>,
    /// Declared format of the uploaded bytes (default `pcm`).
    pub input_format: Option<String>,
}

/// Body of the object storage denoise endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenoiseS3Request {
    pub input_s3_uri: String,
    pub output_s3_uri: String,
    #[serde(default)]
    pub model_s3_uri: Option<String>,
    /// `raw` for PCM, or `wav`, `mp3`, `flac`, ...
    #[serde(default)]
    pub output_format: Option<String>,
}

/// Acknowledgement returned once the output has been uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenoiseS3Response {
    pub status: String,
    pub input: String,
    pub output: String,
    pub output_format: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Jobs currently holding a slot.
    pub active_requests: usize,
    pub max_concurrency: usize,
    pub version: String,
    pub uptime_secs: u64,
}
