//! Test doubles shared by the integration tests.
//!
//! `ScriptedRunner` stands in for ffmpeg and the denoiser: it copies each
//! stage's input to its output and records the invocation. `MemoryGateway`
//! stands in for S3. Both append to one shared event log so tests can assert
//! the relative order of transfers and stages.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Semaphore;

use rust_denoise::admission::AdmissionController;
use rust_denoise::coordinator::{CoordinatorSettings, JobCoordinator};
use rust_denoise::pipeline::{Denoiser, Pipeline, Stage, StageInvocation, StageRunner, Transcoder};
use rust_denoise::storage::{ObjectGateway, ObjectRef, StorageError};
use rust_denoise::{Error, Result};

pub type EventLog = Arc<Mutex<Vec<String>>>;

pub struct ScriptedRunner {
    events: EventLog,
    calls: Mutex<Vec<StageInvocation>>,
    fail_at: Option<Stage>,
    /// When set, every invocation waits for a permit before doing any work.
    gate: Option<Arc<Semaphore>>,
    /// One permit is added each time an invocation starts.
    entered: Arc<Semaphore>,
}

impl ScriptedRunner {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            calls: Mutex::new(Vec::new()),
            fail_at: None,
            gate: None,
            entered: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn failing_at(mut self, stage: Stage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<StageInvocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until `n` invocations have started.
    pub async fn wait_entered(&self, n: u32) {
        self.entered.acquire_many(n).await.unwrap().forget();
    }
}

#[async_trait]
impl StageRunner for ScriptedRunner {
    async fn run(&self, invocation: &StageInvocation) -> Result<()> {
        self.calls.lock().unwrap().push(invocation.clone());
        self.events
            .lock()
            .unwrap()
            .push(invocation.stage.to_string());
        self.entered.add_permits(1);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        if self.fail_at == Some(invocation.stage) {
            return Err(Error::StageFailed {
                stage: invocation.stage,
                exit_code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }

        tokio::fs::copy(&invocation.input, &invocation.output).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Fetch(String),
    Publish(String),
}

#[derive(Default)]
pub struct MemoryGateway {
    events: EventLog,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl MemoryGateway {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    pub fn put(&self, uri: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(uri.to_string(), data.to_vec());
    }

    pub fn get(&self, uri: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(uri).cloned()
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectGateway for MemoryGateway {
    async fn fetch(&self, object: &ObjectRef, dest: &Path) -> Result<u64> {
        let uri = object.to_string();
        self.calls.lock().unwrap().push(GatewayCall::Fetch(uri.clone()));
        self.events.lock().unwrap().push(format!("fetch {uri}"));

        let data = self
            .get(&uri)
            .ok_or(StorageError::NotFound { uri: uri.clone() })?;
        tokio::fs::write(dest, &data).await?;
        Ok(data.len() as u64)
    }

    async fn publish(&self, src: &Path, object: &ObjectRef) -> Result<()> {
        let uri = object.to_string();
        self.calls
            .lock()
            .unwrap()
            .push(GatewayCall::Publish(uri.clone()));
        self.events.lock().unwrap().push(format!("publish {uri}"));

        let data = tokio::fs::read(src).await?;
        self.put(&uri, &data);
        Ok(())
    }
}

/// A coordinator over the test doubles, with workspaces under its own
/// scratch directory.
pub struct Harness {
    pub coordinator: JobCoordinator,
    pub runner: Arc<ScriptedRunner>,
    pub gateway: Arc<MemoryGateway>,
    pub events: EventLog,
    pub scratch: TempDir,
}

impl Harness {
    pub fn new(max_concurrency: usize) -> Self {
        Self::build(max_concurrency, |runner| runner, None)
    }

    pub fn build(
        max_concurrency: usize,
        configure: impl FnOnce(ScriptedRunner) -> ScriptedRunner,
        default_model: Option<PathBuf>,
    ) -> Self {
        let events: EventLog = Arc::default();
        let runner = Arc::new(configure(ScriptedRunner::new(events.clone())));
        let gateway = Arc::new(MemoryGateway::new(events.clone()));
        let scratch = TempDir::new().unwrap();

        let pipeline = Pipeline::new(
            runner.clone(),
            Transcoder::new("ffmpeg"),
            Denoiser::new("rnnoise"),
        );
        let coordinator = JobCoordinator::new(
            AdmissionController::new(max_concurrency),
            pipeline,
            gateway.clone(),
            CoordinatorSettings {
                default_model,
                scratch_dir: Some(scratch.path().to_path_buf()),
            },
        );

        Self {
            coordinator,
            runner,
            gateway,
            events,
            scratch,
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Entries left in the scratch directory.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}
