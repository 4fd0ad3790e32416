//! Stage sequencing for a single job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::format::{OutputFormat, is_raw_pcm};
use super::runner::StageRunner;
use super::tools::{Denoiser, StageInvocation, Transcoder};
use crate::utils::fs;
use crate::workspace::Workspace;
use crate::{Error, Result};

/// Position of a job in the pipeline.
///
/// Transitions are strictly linear. A failing stage returns an error instead
/// of advancing, which aborts every later stage.
#[derive(Debug)]
enum PipelineState {
    Ingest { input: PathBuf },
    Normalize { input: PathBuf, is_pcm: bool },
    Denoise { pcm: PathBuf },
    Encode { denoised: PathBuf },
    Done { output: PathBuf },
}

impl PipelineState {
    fn name(&self) -> &'static str {
        match self {
            Self::Ingest { .. } => "ingest",
            Self::Normalize { .. } => "normalize",
            Self::Denoise { .. } => "denoise",
            Self::Encode { .. } => "encode",
            Self::Done { .. } => "done",
        }
    }
}

/// Runs the normalize → denoise → encode sequence.
#[derive(Clone)]
pub struct Pipeline {
    runner: Arc<dyn StageRunner>,
    transcoder: Transcoder,
    denoiser: Denoiser,
}

impl Pipeline {
    pub fn new(runner: Arc<dyn StageRunner>, transcoder: Transcoder, denoiser: Denoiser) -> Self {
        Self {
            runner,
            transcoder,
            denoiser,
        }
    }

    /// Process `input` inside `workspace` and return the final artifact path.
    ///
    /// Input with a `.pcm`/`.raw` suffix skips decoding. `OutputFormat::Raw`
    /// skips encoding, so the returned path is the denoiser's own output.
    pub async fn run(
        &self,
        workspace: &Workspace,
        input: &Path,
        model: Option<&Path>,
        format: &OutputFormat,
    ) -> Result<PathBuf> {
        let mut state = PipelineState::Ingest {
            input: input.to_path_buf(),
        };

        loop {
            let from = state.name();
            state = match self.advance(state, workspace, model, format).await {
                Ok(PipelineState::Done { output }) => {
                    debug!(output = %output.display(), "Pipeline done");
                    return Ok(output);
                }
                Ok(next) => next,
                Err(e) => {
                    warn!(stage = from, error = %e, "Pipeline failed");
                    return Err(e);
                }
            };
            debug!(from, to = state.name(), "Pipeline transition");
        }
    }

    async fn advance(
        &self,
        state: PipelineState,
        workspace: &Workspace,
        model: Option<&Path>,
        format: &OutputFormat,
    ) -> Result<PipelineState> {
        let next = match state {
            PipelineState::Ingest { input } => {
                let is_pcm = is_raw_pcm(&input);
                PipelineState::Normalize { input, is_pcm }
            }
            PipelineState::Normalize {
                input,
                is_pcm: true,
            } => PipelineState::Denoise { pcm: input },
            PipelineState::Normalize {
                input,
                is_pcm: false,
            } => {
                let pcm = workspace.normalized_path();
                self.invoke(self.transcoder.decode_to_pcm(&input, &pcm))
                    .await?;
                PipelineState::Denoise { pcm }
            }
            PipelineState::Denoise { pcm } => {
                let denoised = workspace.denoised_path();
                self.invoke(self.denoiser.denoise(&pcm, &denoised, model))
                    .await?;
                PipelineState::Encode { denoised }
            }
            PipelineState::Encode { denoised } => match format.codec() {
                None => PipelineState::Done { output: denoised },
                Some(codec) => {
                    let encoded = workspace.encoded_path(format.extension());
                    self.invoke(self.transcoder.encode_from_pcm(&denoised, &encoded, codec))
                        .await?;
                    PipelineState::Done { output: encoded }
                }
            },
            done @ PipelineState::Done { .. } => done,
        };
        Ok(next)
    }

    async fn invoke(&self, invocation: StageInvocation) -> Result<()> {
        if !fs::exists(&invocation.input).await? {
            return Err(Error::MissingArtifact {
                stage: invocation.stage,
                path: invocation.input,
            });
        }
        self.runner.run(&invocation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Copies input to output and records what it ran.
    #[derive(Default)]
    struct CopyRunner {
        calls: Mutex<Vec<StageInvocation>>,
        fail_at: Option<Stage>,
    }

    #[async_trait]
    impl StageRunner for CopyRunner {
        async fn run(&self, invocation: &StageInvocation) -> Result<()> {
            self.calls.lock().unwrap().push(invocation.clone());
            if self.fail_at == Some(invocation.stage) {
                return Err(Error::StageFailed {
                    stage: invocation.stage,
                    exit_code: Some(1),
                    stderr: "boom".to_string(),
                });
            }
            tokio::fs::copy(&invocation.input, &invocation.output).await?;
            Ok(())
        }
    }

    fn pipeline(runner: Arc<CopyRunner>) -> Pipeline {
        Pipeline::new(runner, Transcoder::new("ffmpeg"), Denoiser::new("rnnoise"))
    }

    #[tokio::test]
    async fn pcm_to_raw_runs_only_denoise() {
        let runner = Arc::new(CopyRunner::default());
        let ws = Workspace::open(None).await.unwrap();
        let input = ws.input_path(Some("pcm"));
        fs::write_file(&input, b"pcm").await.unwrap();

        let output = pipeline(runner.clone())
            .run(&ws, &input, None, &OutputFormat::Raw)
            .await
            .unwrap();

        assert_eq!(output, ws.denoised_path());
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].stage, Stage::Denoise);
        assert_eq!(calls[0].input, input);
    }

    #[tokio::test]
    async fn opaque_input_runs_all_stages_in_order() {
        let runner = Arc::new(CopyRunner::default());
        let ws = Workspace::open(None).await.unwrap();
        let input = ws.input_path(Some("mp3"));
        fs::write_file(&input, b"mp3").await.unwrap();

        let output = pipeline(runner.clone())
            .run(&ws, &input, None, &OutputFormat::Flac)
            .await
            .unwrap();

        assert_eq!(output, ws.encoded_path("flac"));
        let stages: Vec<_> = runner.calls.lock().unwrap().iter().map(|c| c.stage).collect();
        assert_eq!(stages, [Stage::Normalize, Stage::Denoise, Stage::Encode]);
    }

    #[tokio::test]
    async fn failure_aborts_later_stages() {
        let runner = Arc::new(CopyRunner {
            fail_at: Some(Stage::Denoise),
            ..Default::default()
        });
        let ws = Workspace::open(None).await.unwrap();
        let input = ws.input_path(Some("wav"));
        fs::write_file(&input, b"wav").await.unwrap();

        let err = pipeline(runner.clone())
            .run(&ws, &input, None, &OutputFormat::Mp3)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::StageFailed { stage: Stage::Denoise, .. }));
        let stages: Vec<_> = runner.calls.lock().unwrap().iter().map(|c| c.stage).collect();
        assert_eq!(stages, [Stage::Normalize, Stage::Denoise]);
    }

    #[tokio::test]
    async fn missing_input_never_starts_a_stage() {
        let runner = Arc::new(CopyRunner::default());
        let ws = Workspace::open(None).await.unwrap();
        let input = ws.input_path(Some("pcm"));

        let err = pipeline(runner.clone())
            .run(&ws, &input, None, &OutputFormat::Raw)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingArtifact { stage: Stage::Denoise, .. }));
        assert!(runner.calls.lock().unwrap().is_empty());
    }
}
