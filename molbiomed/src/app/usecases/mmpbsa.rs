// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use super::{UseCases, log_captured};
use crate::app::errors::{AppError, AppResult};
use crate::app::ports::{ScriptInvocation, TelemetryEvent};
use crate::app::services::invocation::{
    MMPBSA_INPUT, MMPBSA_SCRIPT, mmpbsa_generator_script, mmpbsa_invocation,
};
use crate::app::types::{BackendId, MMPBSA_BACKENDS, MmpbsaRequest, MmpbsaSetup};

impl UseCases {
    /// Generates the MM-PBSA input and job script in the fixed MM-PBSA workdir,
    /// optionally running the script right away.
    pub async fn setup_mmpbsa(&self, request: &MmpbsaRequest) -> AppResult<MmpbsaSetup> {
        let cluster = BackendId::parse_supported(&request.cluster, MMPBSA_BACKENDS)?;
        let workdir = &self.settings.mmpbsa_workdir;
        tokio::fs::create_dir_all(workdir).await.map_err(|e| {
            AppError::local(format!("failed to create {}: {e}", workdir.display()))
        })?;

        let invocation = mmpbsa_invocation(
            &self.settings.shell,
            &mmpbsa_generator_script(&self.settings.protocols_dir),
            workdir,
            request,
            cluster,
        );
        tracing::info!("executing MM-PBSA setup: {}", invocation.command_line());
        let capture = self.scripts.run(&invocation).await?;
        if !capture.success() {
            self.report_failure(&request.job_name, cluster);
            return Err(AppError::ExternalScriptFailure {
                replica: None,
                exit_code: Some(capture.exit_code),
                stderr: capture.stderr_lossy(),
                submitted: Vec::new(),
            });
        }
        log_captured("mmpbsa setup", &capture);

        let input_file = workdir.join(MMPBSA_INPUT);
        let script_file = workdir.join(MMPBSA_SCRIPT);
        let mut executed = false;
        if request.run_now {
            if script_file.is_file() {
                let run = ScriptInvocation {
                    program: self.settings.shell.clone(),
                    script: script_file.clone(),
                    args: Vec::new(),
                    cwd: workdir.clone(),
                };
                tracing::info!("running {}", run.command_line());
                let capture = self.scripts.run(&run).await?;
                if !capture.success() {
                    self.report_failure(&request.job_name, cluster);
                    return Err(AppError::ExternalScriptFailure {
                        replica: None,
                        exit_code: Some(capture.exit_code),
                        stderr: capture.stderr_lossy(),
                        submitted: Vec::new(),
                    });
                }
                log_captured(MMPBSA_SCRIPT, &capture);
                executed = true;
            } else {
                tracing::warn!(
                    "{} was not generated; skipping immediate run",
                    script_file.display()
                );
            }
        }

        self.telemetry.event(
            "mmpbsa.setup.succeeded",
            TelemetryEvent {
                batch: Some(request.job_name.clone()),
                backend: Some(cluster.to_string()),
                ..TelemetryEvent::default()
            },
        );
        Ok(MmpbsaSetup {
            input_file,
            script_file,
            executed,
        })
    }

    fn report_failure(&self, job_name: &str, cluster: BackendId) {
        self.telemetry.event(
            "mmpbsa.setup.failed",
            TelemetryEvent {
                batch: Some(job_name.to_string()),
                backend: Some(cluster.to_string()),
                ..TelemetryEvent::default()
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::fakes::{FakeResolver, MemoryStore, RecordingRunner, usecases};
    use super::*;
    use tempfile::TempDir;

    fn request() -> MmpbsaRequest {
        MmpbsaRequest::new("/data/complex.prmtop", "/data/prod.nc")
    }

    #[tokio::test]
    async fn setup_runs_generator_in_fixed_workdir() {
        let tmp = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let uc = usecases(
            tmp.path(),
            runner.clone(),
            FakeResolver::default(),
            Arc::new(MemoryStore::default()),
        );

        let setup = uc.setup_mmpbsa(&request()).await.unwrap();

        let workdir = tmp.path().join("mmpbsa");
        assert!(workdir.is_dir());
        assert_eq!(setup.input_file, workdir.join("mmpbsa.in"));
        assert_eq!(setup.script_file, workdir.join("script_mmpbsa.sh"));
        assert!(!setup.executed);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].cwd, workdir);
        assert_eq!(
            calls[0].script,
            tmp.path().join("protocols/MM-PBSA/mmpbsa_setup.sh")
        );
        assert_eq!(calls[0].args.last().map(String::as_str), Some("local"));
    }

    #[tokio::test]
    async fn slurm_is_not_an_mmpbsa_cluster() {
        let tmp = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let uc = usecases(
            tmp.path(),
            runner.clone(),
            FakeResolver::default(),
            Arc::new(MemoryStore::default()),
        );
        let mut req = request();
        req.cluster = "slurm".to_string();
        let err = uc.setup_mmpbsa(&req).await.unwrap_err();
        assert!(matches!(err, AppError::UnsupportedBackend { .. }));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn generator_failure_surfaces_stderr() {
        let tmp = TempDir::new().unwrap();
        let uc = usecases(
            tmp.path(),
            Arc::new(RecordingRunner::with_exit_codes(&[1])),
            FakeResolver::default(),
            Arc::new(MemoryStore::default()),
        );
        let err = uc.setup_mmpbsa(&request()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "generator script failed with exit code 1: generator exploded"
        );
    }

    #[tokio::test]
    async fn run_now_executes_generated_script() {
        let tmp = TempDir::new().unwrap();
        let workdir = tmp.path().join("mmpbsa");
        std::fs::create_dir_all(&workdir).unwrap();
        std::fs::write(workdir.join("script_mmpbsa.sh"), "#!/bin/bash\n").unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let uc = usecases(
            tmp.path(),
            runner.clone(),
            FakeResolver::default(),
            Arc::new(MemoryStore::default()),
        );
        let mut req = request();
        req.run_now = true;
        req.cluster = "picard".to_string();

        let setup = uc.setup_mmpbsa(&req).await.unwrap();
        assert!(setup.executed);
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].script, workdir.join("script_mmpbsa.sh"));
        assert!(calls[1].args.is_empty());
    }

    #[tokio::test]
    async fn run_now_without_script_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let uc = usecases(
            tmp.path(),
            runner.clone(),
            FakeResolver::default(),
            Arc::new(MemoryStore::default()),
        );
        let mut req = request();
        req.run_now = true;
        let setup = uc.setup_mmpbsa(&req).await.unwrap();
        assert!(!setup.executed);
        assert_eq!(runner.calls().len(), 1);
    }
}
