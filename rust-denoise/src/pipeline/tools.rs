//! Argument conventions for the external tools.

use std::path::{Path, PathBuf};

use super::Stage;
use super::format::PCM_CODEC;

/// Sample rate of the PCM interchange format.
pub const PCM_SAMPLE_RATE: u32 = 48_000;
/// Channel count of the PCM interchange format.
pub const PCM_CHANNELS: u32 = 1;
/// ffmpeg container name for headerless 16-bit little-endian PCM.
const PCM_CONTAINER: &str = "s16le";

/// One external process execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInvocation {
    pub stage: Stage,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Artifact the process reads; must exist before it starts.
    pub input: PathBuf,
    /// Artifact the process writes; only valid after a successful exit.
    pub output: PathBuf,
}

/// The ffmpeg transcoder.
#[derive(Debug, Clone)]
pub struct Transcoder {
    program: PathBuf,
}

impl Transcoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Decode anything ffmpeg understands into the PCM interchange format.
    pub fn decode_to_pcm(&self, src: &Path, dst: &Path) -> StageInvocation {
        let args = vec![
            "-i".to_string(),
            path_arg(src),
            "-acodec".to_string(),
            PCM_CODEC.to_string(),
            "-ar".to_string(),
            PCM_SAMPLE_RATE.to_string(),
            "-ac".to_string(),
            PCM_CHANNELS.to_string(),
            "-f".to_string(),
            PCM_CONTAINER.to_string(),
            "-y".to_string(),
            path_arg(dst),
        ];

        StageInvocation {
            stage: Stage::Normalize,
            program: self.program.clone(),
            args,
            input: src.to_path_buf(),
            output: dst.to_path_buf(),
        }
    }

    /// Encode interchange PCM with `codec`; the container follows `dst`'s extension.
    pub fn encode_from_pcm(&self, src: &Path, dst: &Path, codec: &str) -> StageInvocation {
        // Raw PCM has no header, so the input format must precede `-i`.
        let args = vec![
            "-f".to_string(),
            PCM_CONTAINER.to_string(),
            "-ar".to_string(),
            PCM_SAMPLE_RATE.to_string(),
            "-ac".to_string(),
            PCM_CHANNELS.to_string(),
            "-i".to_string(),
            path_arg(src),
            "-acodec".to_string(),
            codec.to_string(),
            "-y".to_string(),
            path_arg(dst),
        ];

        StageInvocation {
            stage: Stage::Encode,
            program: self.program.clone(),
            args,
            input: src.to_path_buf(),
            output: dst.to_path_buf(),
        }
    }
}

/// The RNNoise wrapper binary: `<bin> <noisy.pcm> <denoised.pcm> [model]`.
#[derive(Debug, Clone)]
pub struct Denoiser {
    program: PathBuf,
}

impl Denoiser {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Without a model the argument is left off entirely and the binary uses
    /// its built-in weights.
    pub fn denoise(&self, src: &Path, dst: &Path, model: Option<&Path>) -> StageInvocation {
        let mut args = vec![path_arg(src), path_arg(dst)];
        if let Some(model) = model {
            args.push(path_arg(model));
        }

        StageInvocation {
            stage: Stage::Denoise,
            program: self.program.clone(),
            args,
            input: src.to_path_buf(),
            output: dst.to_path_buf(),
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
