//! The normalize → denoise → encode pipeline.
//!
//! Each stage is an external process: `ffmpeg` converts between arbitrary
//! audio and the fixed PCM interchange format, and the RNNoise wrapper binary
//! denoises PCM. [`Pipeline`] sequences the stages for one job inside that
//! job's workspace; [`StageRunner`] executes individual invocations.

mod format;
mod orchestrator;
mod runner;
mod tools;

use serde::Serialize;

pub use format::{OutputFormat, is_raw_pcm};
pub use orchestrator::Pipeline;
pub use runner::{ProcessRunner, StageRunner};
pub use tools::{Denoiser, StageInvocation, Transcoder};

/// A discrete pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Decode the input to PCM.
    Normalize,
    /// Run the noise suppressor.
    Denoise,
    /// Encode PCM into the requested output format.
    Encode,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Denoise => "denoise",
            Stage::Encode => "encode",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
