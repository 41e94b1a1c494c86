// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::adapters::process::capture;
use crate::app::errors::{AppError, AppResult};
use crate::app::ports::{ExecCapture, ExecutionBackend};
use crate::app::services::remote_path::remote_join;
use crate::app::services::shell::sh_escape;
use crate::app::services::slurm::{job_id_or_raw, submit_command};
use crate::app::types::{BackendId, JobId};
use crate::config::RemoteConfig;

const CONNECT_TIMEOUT_SECS: u32 = 10;

/// Cluster reached through the system `ssh` and `rsync` binaries.
pub struct OpenSshBackend {
    id: BackendId,
    remote: RemoteConfig,
}

impl OpenSshBackend {
    pub fn new(id: BackendId, remote: RemoteConfig) -> Self {
        Self { id, remote }
    }

    fn user_at_host(&self) -> String {
        format!("{}@{}", self.remote.user, self.remote.host)
    }

    fn ssh_options(&self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.remote.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={CONNECT_TIMEOUT_SECS}"),
        ];
        if let Some(key) = &self.remote.identity_path {
            args.push("-i".to_string());
            args.push(key.to_string_lossy().into_owned());
        }
        args
    }

    /// Arguments for `ssh` running `command` on the cluster.
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = self.ssh_options();
        args.push(self.user_at_host());
        args.push(command.to_string());
        args
    }

    /// Arguments for `rsync` over ssh. Trailing slashes follow rsync semantics.
    pub fn rsync_args(&self, source: &str, dest: &str) -> Vec<String> {
        let transport = std::iter::once("ssh".to_string())
            .chain(self.ssh_options().iter().map(|arg| {
                if arg.contains(char::is_whitespace) {
                    sh_escape(arg)
                } else {
                    arg.clone()
                }
            }))
            .collect::<Vec<_>>()
            .join(" ");
        vec![
            "-az".to_string(),
            "--partial".to_string(),
            "-e".to_string(),
            transport,
            source.to_string(),
            dest.to_string(),
        ]
    }

    fn remote_spec(&self, path: &str) -> String {
        format!("{}:{}", self.user_at_host(), path)
    }

    async fn rsync(&self, source: &str, dest: &str) -> AppResult<()> {
        let args = self.rsync_args(source, dest);
        let mut command = Command::new("rsync");
        command.args(&args);
        let result = capture(&mut command)
            .await
            .map_err(|e| AppError::remote(format!("failed to start rsync: {e}")))?;
        if !result.success() {
            return Err(AppError::remote(format!(
                "rsync {source} -> {dest} exited with {}: {}",
                result.exit_code,
                result.stderr_lossy().trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionBackend for OpenSshBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    fn is_local(&self) -> bool {
        false
    }

    fn work_dir(&self) -> &str {
        &self.remote.work_dir
    }

    #[tracing::instrument(skip(self), fields(backend = %self.id))]
    async fn run_command(&self, command_line: &str) -> AppResult<ExecCapture> {
        let mut command = Command::new("ssh");
        command.args(self.ssh_args(command_line));
        capture(&mut command).await.map_err(|e| {
            AppError::remote(format!("failed to start ssh to {}: {e}", self.remote.host))
        })
    }

    #[tracing::instrument(skip(self), fields(backend = %self.id))]
    async fn push_dir(&self, local_dir: &Path, remote_parent: &str) -> AppResult<String> {
        let name = local_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AppError::local(format!("{} has no directory name", local_dir.display()))
            })?;
        // no trailing slash on the source: rsync recreates the directory itself
        let source = local_dir.to_string_lossy().trim_end_matches('/').to_string();
        let dest = self.remote_spec(&format!("{}/", remote_parent.trim_end_matches('/')));
        self.rsync(&source, &dest).await?;
        Ok(remote_join(remote_parent, &name))
    }

    #[tracing::instrument(skip(self), fields(backend = %self.id))]
    async fn pull_dir(&self, remote_path: &str, local_path: &Path) -> AppResult<()> {
        tokio::fs::create_dir_all(local_path).await.map_err(|e| {
            AppError::local(format!("failed to create {}: {e}", local_path.display()))
        })?;
        let source = self.remote_spec(&format!("{}/", remote_path.trim_end_matches('/')));
        let dest = format!("{}/", local_path.to_string_lossy().trim_end_matches('/'));
        self.rsync(&source, &dest).await
    }

    #[tracing::instrument(skip(self), fields(backend = %self.id))]
    async fn submit_job(&self, descriptor: &str) -> AppResult<JobId> {
        let dir = Path::new(descriptor)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|p| !p.is_empty());
        let command_line = submit_command(&self.remote.submit_command, descriptor, dir.as_deref());
        let result = self.run_command(&command_line).await?;
        if !result.success() {
            return Err(AppError::remote(format!(
                "'{command_line}' on {} exited with {}: {}",
                self.id,
                result.exit_code,
                result.stderr_lossy().trim()
            )));
        }
        let job_id = job_id_or_raw(&result.stdout_lossy()).ok_or_else(|| {
            AppError::remote(format!("'{command_line}' on {} did not report a job id", self.id))
        })?;
        tracing::debug!(job_id = %job_id, "remote job submitted");
        Ok(job_id)
    }
}
