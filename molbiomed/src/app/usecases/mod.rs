// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;
use std::sync::Arc;

use crate::app::ports::{
    BackendResolverPort, BatchStorePort, ClockPort, ExecCapture, ScriptRunnerPort, TelemetryPort,
};

mod md_batch;
mod mmpbsa;

/// Filesystem locations and interpreter the orchestrator works with.
#[derive(Clone, Debug)]
pub struct OrchestratorSettings {
    pub workspace_dir: PathBuf,
    pub protocols_dir: PathBuf,
    pub mmpbsa_workdir: PathBuf,
    pub shell: String,
}

#[derive(Clone)]
pub struct UseCases {
    pub(crate) scripts: Arc<dyn ScriptRunnerPort>,
    pub(crate) backends: Arc<dyn BackendResolverPort>,
    pub(crate) batches: Arc<dyn BatchStorePort>,
    pub(crate) clock: Arc<dyn ClockPort>,
    pub(crate) telemetry: Arc<dyn TelemetryPort>,
    pub(crate) settings: OrchestratorSettings,
}

impl UseCases {
    pub fn new(
        scripts: Arc<dyn ScriptRunnerPort>,
        backends: Arc<dyn BackendResolverPort>,
        batches: Arc<dyn BatchStorePort>,
        clock: Arc<dyn ClockPort>,
        telemetry: Arc<dyn TelemetryPort>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            scripts,
            backends,
            batches,
            clock,
            telemetry,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    fn timestamp(&self) -> Option<String> {
        self.clock.submission_stamp()
    }
}

/// Emits non-empty generator output as diagnostics.
fn log_captured(label: &str, capture: &ExecCapture) {
    let stdout = capture.stdout_lossy();
    let stdout = stdout.trim_end();
    if !stdout.is_empty() {
        tracing::info!("{label} stdout:\n{stdout}");
    }
    let stderr = capture.stderr_lossy();
    let stderr = stderr.trim_end();
    if !stderr.is_empty() {
        tracing::info!("{label} stderr:\n{stderr}");
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::{HashMap, VecDeque};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use time::OffsetDateTime;

    use super::{OrchestratorSettings, UseCases};
    use crate::app::errors::{AppError, AppResult};
    use crate::app::ports::{
        BackendResolverPort, BatchStorePort, ClockPort, ExecCapture, ExecutionBackend,
        NoopTelemetry, ScriptInvocation, ScriptRunnerPort,
    };
    use crate::app::types::{BackendId, BatchState, JobId, batch_slug};

    /// Records invocations and plays back scripted exit codes (0 once the queue is empty).
    /// Successful runs leave `preprod/`, `prod/` and `script.sh` behind like the real generator.
    #[derive(Default)]
    pub struct RecordingRunner {
        pub calls: Mutex<Vec<ScriptInvocation>>,
        pub exit_codes: Mutex<VecDeque<i32>>,
        pub produce_outputs: bool,
    }

    impl RecordingRunner {
        pub fn producing() -> Self {
            Self {
                produce_outputs: true,
                ..Self::default()
            }
        }

        pub fn with_exit_codes(codes: &[i32]) -> Self {
            let runner = Self::producing();
            runner.exit_codes.lock().unwrap().extend(codes.iter().copied());
            runner
        }

        pub fn calls(&self) -> Vec<ScriptInvocation> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ScriptRunnerPort for RecordingRunner {
        async fn run(&self, invocation: &ScriptInvocation) -> AppResult<ExecCapture> {
            self.calls.lock().unwrap().push(invocation.clone());
            let code = self.exit_codes.lock().unwrap().pop_front().unwrap_or(0);
            if code != 0 {
                return Ok(ExecCapture {
                    stdout: Vec::new(),
                    stderr: b"generator exploded".to_vec(),
                    exit_code: code,
                });
            }
            if self.produce_outputs {
                for sub in ["preprod", "prod"] {
                    std::fs::create_dir_all(invocation.cwd.join(sub)).unwrap();
                }
                std::fs::write(invocation.cwd.join("script.sh"), "#!/bin/bash\n").unwrap();
            }
            Ok(ExecCapture {
                stdout: b"setup complete".to_vec(),
                stderr: Vec::new(),
                exit_code: 0,
            })
        }
    }

    /// In-memory backend that records every call.
    pub struct FakeBackend {
        pub id: BackendId,
        pub work_dir: String,
        pub commands: Mutex<Vec<String>>,
        pub pushes: Mutex<Vec<(PathBuf, String)>>,
        pub pulls: Mutex<Vec<(String, PathBuf)>>,
        pub submits: Mutex<Vec<String>>,
        pub fail_pulls_for: Mutex<Vec<String>>,
        /// 1-based push number that fails.
        pub fail_push_at: Mutex<Option<usize>>,
    }

    impl FakeBackend {
        pub fn new(id: BackendId) -> Self {
            Self {
                id,
                work_dir: "/scratch/user".to_string(),
                commands: Mutex::new(Vec::new()),
                pushes: Mutex::new(Vec::new()),
                pulls: Mutex::new(Vec::new()),
                submits: Mutex::new(Vec::new()),
                fail_pulls_for: Mutex::new(Vec::new()),
                fail_push_at: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ExecutionBackend for FakeBackend {
        fn id(&self) -> BackendId {
            self.id
        }

        fn is_local(&self) -> bool {
            self.id.is_local()
        }

        fn work_dir(&self) -> &str {
            &self.work_dir
        }

        async fn run_command(&self, command: &str) -> AppResult<ExecCapture> {
            self.commands.lock().unwrap().push(command.to_string());
            Ok(ExecCapture::default())
        }

        async fn push_dir(&self, local_dir: &Path, remote_parent: &str) -> AppResult<String> {
            let mut pushes = self.pushes.lock().unwrap();
            pushes.push((local_dir.to_path_buf(), remote_parent.to_string()));
            if *self.fail_push_at.lock().unwrap() == Some(pushes.len()) {
                return Err(AppError::remote("rsync exited with 12: connection reset"));
            }
            let name = local_dir.file_name().unwrap().to_string_lossy();
            Ok(format!("{remote_parent}/{name}"))
        }

        async fn pull_dir(&self, remote_path: &str, local_path: &Path) -> AppResult<()> {
            self.pulls
                .lock()
                .unwrap()
                .push((remote_path.to_string(), local_path.to_path_buf()));
            if self
                .fail_pulls_for
                .lock()
                .unwrap()
                .iter()
                .any(|p| remote_path.starts_with(p.as_str()))
            {
                return Err(AppError::remote(format!("rsync failed for {remote_path}")));
            }
            std::fs::create_dir_all(local_path).unwrap();
            std::fs::write(local_path.join("md.out"), "frames").unwrap();
            Ok(())
        }

        async fn submit_job(&self, descriptor: &str) -> AppResult<JobId> {
            let mut submits = self.submits.lock().unwrap();
            submits.push(descriptor.to_string());
            Ok(JobId(format!("{}", 1000 + submits.len())))
        }
    }

    #[derive(Default)]
    pub struct FakeResolver {
        pub backends: HashMap<BackendId, Arc<FakeBackend>>,
    }

    impl FakeResolver {
        pub fn with(backend: Arc<FakeBackend>) -> Self {
            let mut backends = HashMap::new();
            backends.insert(backend.id, backend);
            Self { backends }
        }
    }

    impl BackendResolverPort for FakeResolver {
        fn resolve(&self, id: BackendId) -> AppResult<Arc<dyn ExecutionBackend>> {
            self.backends
                .get(&id)
                .cloned()
                .map(|b| b as Arc<dyn ExecutionBackend>)
                .ok_or_else(|| {
                    AppError::MissingRequiredInput(format!("no configuration for backend '{id}'"))
                })
        }
    }

    #[derive(Default)]
    pub struct MemoryStore {
        pub states: Mutex<HashMap<String, BatchState>>,
        pub saves: Mutex<usize>,
    }

    #[async_trait]
    impl BatchStorePort for MemoryStore {
        async fn save(&self, state: &BatchState) -> AppResult<()> {
            *self.saves.lock().unwrap() += 1;
            self.states
                .lock()
                .unwrap()
                .insert(batch_slug(&state.batch_name), state.clone());
            Ok(())
        }

        async fn load(&self, batch_name: &str) -> AppResult<Option<BatchState>> {
            Ok(self.states.lock().unwrap().get(&batch_slug(batch_name)).cloned())
        }
    }

    pub struct FixedClock;

    impl ClockPort for FixedClock {
        fn now_utc(&self) -> OffsetDateTime {
            OffsetDateTime::from_unix_timestamp(1_760_000_000).unwrap()
        }
    }

    pub fn settings(base: &Path) -> OrchestratorSettings {
        OrchestratorSettings {
            workspace_dir: base.join("workspaces"),
            protocols_dir: base.join("protocols"),
            mmpbsa_workdir: base.join("mmpbsa"),
            shell: "bash".to_string(),
        }
    }

    pub fn usecases(
        base: &Path,
        runner: Arc<RecordingRunner>,
        resolver: FakeResolver,
        store: Arc<MemoryStore>,
    ) -> UseCases {
        UseCases::new(
            runner,
            Arc::new(resolver),
            store,
            Arc::new(FixedClock),
            Arc::new(NoopTelemetry),
            settings(base),
        )
    }
}
