//! Per-request job driver.
//!
//! [`JobCoordinator::run`] takes a validated [`Job`], claims an admission slot,
//! and executes the job in its own task: open a workspace, materialize the
//! inputs, run the pipeline, deliver the result. The slot and the workspace
//! belong to that task, so both are released however the job ends, including
//! when the caller stops waiting for it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::admission::AdmissionController;
use crate::config::ServiceConfig;
use crate::pipeline::{Denoiser, OutputFormat, Pipeline, StageRunner, Transcoder};
use crate::storage::{ObjectGateway, ObjectRef};
use crate::utils::fs;
use crate::workspace::Workspace;
use crate::{Error, Result};

/// Declared form of inline uploads when the request does not name one.
pub const DEFAULT_INLINE_FORMAT: &str = "pcm";

/// Where a job's audio comes from.
#[derive(Debug, Clone)]
pub enum JobInput {
    /// Bytes uploaded with the request, with the format they were declared as.
    Inline { data: Bytes, declared_format: String },
    Remote(ObjectRef),
}

/// Request-supplied model weights.
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// A file already on this host.
    Local(PathBuf),
    Remote(ObjectRef),
}

/// Where a job's result goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    /// Hand the bytes back to the caller.
    Return,
    Remote(ObjectRef),
}

/// One processing request.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub input: JobInput,
    pub model: Option<ModelSource>,
    pub output_format: OutputFormat,
    pub output: JobOutput,
}

impl Job {
    /// A job over uploaded bytes whose result is returned to the caller.
    ///
    /// A blank `model` counts as no model.
    pub fn inline(
        data: Bytes,
        input_format: Option<&str>,
        model: Option<&str>,
        output_format: OutputFormat,
    ) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::validation("Empty body"));
        }

        let declared_format = non_blank(input_format)
            .unwrap_or(DEFAULT_INLINE_FORMAT)
            .to_ascii_lowercase();

        Ok(Self {
            id: Uuid::new_v4(),
            input: JobInput::Inline {
                data,
                declared_format,
            },
            model: non_blank(model).map(|path| ModelSource::Local(PathBuf::from(path))),
            output_format,
            output: JobOutput::Return,
        })
    }

    /// A job reading from and writing to object storage.
    ///
    /// All references are parsed here, so a malformed one is rejected before
    /// any slot is taken or any network call is made. A blank `model_uri`
    /// counts as no model.
    pub fn remote(
        input_uri: &str,
        output_uri: &str,
        model_uri: Option<&str>,
        output_format: OutputFormat,
    ) -> Result<Self> {
        let input = ObjectRef::parse(input_uri)?;
        let output = ObjectRef::parse(output_uri)?;
        let model = non_blank(model_uri)
            .map(ObjectRef::parse)
            .transpose()?
            .map(ModelSource::Remote);

        Ok(Self {
            id: Uuid::new_v4(),
            input: JobInput::Remote(input),
            model,
            output_format,
            output: JobOutput::Remote(output),
        })
    }
}

/// Result of a successful job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Bytes { data: Vec<u8>, format: OutputFormat },
    Published { output: ObjectRef, format: OutputFormat },
}

/// Paths the coordinator needs besides its collaborators.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorSettings {
    /// Model used when a job does not bring one, if the file exists.
    pub default_model: Option<PathBuf>,
    /// Parent directory for workspaces.
    pub scratch_dir: Option<PathBuf>,
}

/// Drives jobs end to end. Cheap to clone.
#[derive(Clone)]
pub struct JobCoordinator {
    admission: AdmissionController,
    inner: Arc<JobContext>,
}

/// Everything a running job needs, shared with its task.
struct JobContext {
    pipeline: Pipeline,
    gateway: Arc<dyn ObjectGateway>,
    settings: CoordinatorSettings,
}

impl JobCoordinator {
    pub fn new(
        admission: AdmissionController,
        pipeline: Pipeline,
        gateway: Arc<dyn ObjectGateway>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            admission,
            inner: Arc::new(JobContext {
                pipeline,
                gateway,
                settings,
            }),
        }
    }

    /// Wire a coordinator from service configuration.
    pub fn from_config(
        config: &ServiceConfig,
        runner: Arc<dyn StageRunner>,
        gateway: Arc<dyn ObjectGateway>,
    ) -> Self {
        let pipeline = Pipeline::new(
            runner,
            Transcoder::new(&config.ffmpeg_bin),
            Denoiser::new(&config.denoiser_bin),
        );
        Self::new(
            AdmissionController::new(config.max_concurrency),
            pipeline,
            gateway,
            CoordinatorSettings {
                default_model: Some(config.default_model.clone()),
                scratch_dir: config.scratch_dir.clone(),
            },
        )
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Run `job` to completion.
    ///
    /// Returns [`Error::Busy`] without doing any work when no slot is free.
    /// Once admitted the job runs in a separate task that finishes even if
    /// this future is dropped.
    pub async fn run(&self, job: Job) -> Result<JobOutcome> {
        let slot = self.admission.try_acquire()?;

        let job_id = job.id;
        let context = self.inner.clone();
        let admission = self.admission.clone();
        let span = info_span!("job", job_id = %job_id);

        let task = tokio::spawn(
            async move {
                let start = Instant::now();
                info!(format = %job.output_format, "Job started");

                let result = context.execute(&job).await;
                match &result {
                    Ok(_) => info!(
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Job finished"
                    ),
                    Err(e) => warn!(
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        kind = ?e.kind(),
                        error = %e,
                        "Job failed"
                    ),
                }

                admission.release(slot);
                result
            }
            .instrument(span),
        );

        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(%job_id, error = %e, "Job task aborted");
                Err(Error::Other(format!("Job {job_id} aborted: {e}")))
            }
        }
    }
}

impl JobContext {
    async fn execute(&self, job: &Job) -> Result<JobOutcome> {
        let workspace = Workspace::open(self.settings.scratch_dir.as_deref()).await?;
        let result = self.process(&workspace, job).await;

        // A leftover directory does not change the job's outcome.
        if let Err(e) = workspace.close().await {
            warn!(error = %e, "Failed to remove workspace");
        }

        result
    }

    async fn process(&self, workspace: &Workspace, job: &Job) -> Result<JobOutcome> {
        let input = self.materialize_input(workspace, &job.input).await?;
        let model = self.resolve_model(workspace, job.model.as_ref()).await?;

        let artifact = self
            .pipeline
            .run(workspace, &input, model.as_deref(), &job.output_format)
            .await?;

        match &job.output {
            JobOutput::Return => Ok(JobOutcome::Bytes {
                data: fs::read_file(&artifact).await?,
                format: job.output_format.clone(),
            }),
            JobOutput::Remote(object) => {
                self.gateway.publish(&artifact, object).await?;
                Ok(JobOutcome::Published {
                    output: object.clone(),
                    format: job.output_format.clone(),
                })
            }
        }
    }

    /// Remote inputs keep the key's extension, which drives PCM detection.
    async fn materialize_input(&self, workspace: &Workspace, input: &JobInput) -> Result<PathBuf> {
        match input {
            JobInput::Inline {
                data,
                declared_format,
            } => {
                let path = workspace.input_path(Some(declared_format.as_str()));
                fs::write_file(&path, data).await?;
                Ok(path)
            }
            JobInput::Remote(object) => {
                let path = workspace.input_path(object.extension());
                self.gateway.fetch(object, &path).await?;
                Ok(path)
            }
        }
    }

    /// Request model, else the default model if it is present, else none.
    async fn resolve_model(
        &self,
        workspace: &Workspace,
        model: Option<&ModelSource>,
    ) -> Result<Option<PathBuf>> {
        match model {
            Some(ModelSource::Local(path)) => Ok(Some(path.clone())),
            Some(ModelSource::Remote(object)) => {
                let path = workspace.model_path();
                self.gateway.fetch(object, &path).await?;
                Ok(Some(path))
            }
            None => Ok(self.default_model().await),
        }
    }

    async fn default_model(&self) -> Option<PathBuf> {
        let path = self.settings.default_model.as_deref()?;
        present(path).await.then(|| path.to_path_buf())
    }
}

/// Trimmed value, `None` when absent or blank.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

async fn present(path: &Path) -> bool {
    matches!(fs::exists(path).await, Ok(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_job_defaults_to_pcm() {
        let job = Job::inline(Bytes::from_static(b"abc"), None, None, OutputFormat::Raw).unwrap();
        match job.input {
            JobInput::Inline {
                declared_format, ..
            } => assert_eq!(declared_format, "pcm"),
            other => panic!("unexpected input: {other:?}"),
        }
        assert_eq!(job.output, JobOutput::Return);
    }

    #[test]
    fn blank_models_count_as_absent() {
        let job = Job::inline(Bytes::from_static(b"abc"), None, Some("  "), OutputFormat::Raw)
            .unwrap();
        assert!(job.model.is_none());

        let job = Job::inline(Bytes::from_static(b"abc"), None, Some("/m.bin"), OutputFormat::Raw)
            .unwrap();
        assert!(matches!(job.model, Some(ModelSource::Local(p)) if p == PathBuf::from("/m.bin")));

        let job = Job::remote("s3://in/a.wav", "s3://out/a.wav", Some(""), OutputFormat::Wav)
            .unwrap();
        assert!(job.model.is_none());
    }

    #[test]
    fn inline_job_rejects_empty_body() {
        let err = Job::inline(Bytes::new(), None, None, OutputFormat::Raw).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn remote_job_parses_every_reference() {
        let job = Job::remote(
            "s3://in/a.wav",
            "s3://out/a.mp3",
            Some("s3://models/m.bin"),
            OutputFormat::Mp3,
        )
        .unwrap();
        assert!(matches!(job.model, Some(ModelSource::Remote(_))));

        let err = Job::remote("s3://in/a.wav", "s3://out/a.mp3", Some("s3://models"), OutputFormat::Mp3)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidObjectRef(_)));

        assert!(Job::remote("s3://in", "s3://out/a", None, OutputFormat::Raw).is_err());
        assert!(Job::remote("s3://in/a", "out/a", None, OutputFormat::Raw).is_err());
    }
}
