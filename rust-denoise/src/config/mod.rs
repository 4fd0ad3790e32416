//! Service configuration.
//!
//! Everything is read from environment variables once at startup. A `.env`
//! file in the working directory is honoured. Parsing goes through a lookup
//! function so tests never touch the real process environment.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::api::server::ApiServerConfig;
use crate::{Error, Result};

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_DENOISER_BIN: &str = "/opt/rnnoise/bin/rnnoise_wrapper_demo";
pub const DEFAULT_MODEL_PATH: &str = "/opt/rnnoise/models/weights_blob.bin";
pub const DEFAULT_FFMPEG_BIN: &str = "ffmpeg";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Runtime configuration for the denoise service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Number of jobs allowed to run at once.
    pub max_concurrency: usize,
    /// RNNoise wrapper executable.
    pub denoiser_bin: PathBuf,
    /// Model used when a request does not supply one, if the file exists.
    pub default_model: PathBuf,
    /// ffmpeg executable.
    pub ffmpeg_bin: PathBuf,
    pub aws_region: String,
    /// Custom S3-compatible endpoint (MinIO and similar).
    pub s3_endpoint: Option<String>,
    /// Parent directory for job workspaces; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
    /// Kill stage processes that run longer than this. Unset means no limit.
    pub stage_timeout: Option<Duration>,
    pub api: ApiServerConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            denoiser_bin: PathBuf::from(DEFAULT_DENOISER_BIN),
            default_model: PathBuf::from(DEFAULT_MODEL_PATH),
            ffmpeg_bin: PathBuf::from(DEFAULT_FFMPEG_BIN),
            aws_region: DEFAULT_AWS_REGION.to_string(),
            s3_endpoint: None,
            scratch_dir: None,
            stage_timeout: None,
            api: ApiServerConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Unset and blank variables take their defaults; malformed values are
    /// configuration errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_concurrency =
            parse_var(&lookup, "MAX_CONCURRENCY")?.unwrap_or(defaults.max_concurrency);
        if max_concurrency == 0 {
            return Err(Error::config("MAX_CONCURRENCY must be at least 1"));
        }

        let stage_timeout = match parse_var::<u64, _>(&lookup, "STAGE_TIMEOUT_SECS")? {
            Some(0) => return Err(Error::config("STAGE_TIMEOUT_SECS must be at least 1")),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(Self {
            max_concurrency,
            denoiser_bin: var(&lookup, "RNNOISE_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.denoiser_bin),
            default_model: var(&lookup, "RNNOISE_MODEL")
                .map(PathBuf::from)
                .unwrap_or(defaults.default_model),
            ffmpeg_bin: var(&lookup, "FFMPEG_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_bin),
            aws_region: var(&lookup, "AWS_REGION").unwrap_or(defaults.aws_region),
            s3_endpoint: var(&lookup, "S3_ENDPOINT_URL"),
            scratch_dir: var(&lookup, "SCRATCH_DIR").map(PathBuf::from),
            stage_timeout,
            api: ApiServerConfig::from_lookup(&lookup)?,
        })
    }
}

/// Non-blank value of `key`.
pub(crate) fn var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parsed value of `key`, `None` when unset or blank.
pub(crate) fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    var(lookup, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| Error::config(format!("{key}={raw:?} is invalid: {e}")))
        })
        .transpose()
}
