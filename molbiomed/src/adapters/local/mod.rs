// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use walkdir::WalkDir;

use crate::adapters::process::capture;
use crate::app::errors::{AppError, AppResult};
use crate::app::ports::{ExecCapture, ExecutionBackend};
use crate::app::services::slurm::{job_id_or_raw, submit_command};
use crate::app::types::{BackendId, JobId};

/// Executes job descriptors on this machine.
///
/// With a submit command configured the descriptor goes to that scheduler;
/// otherwise it is started as a detached shell process and its PID is the job id.
pub struct LocalBackend {
    shell: String,
    submit_command: Option<String>,
    work_dir: String,
}

impl LocalBackend {
    pub fn new(shell: &str, submit_command: Option<String>, work_dir: &Path) -> Self {
        Self {
            shell: shell.to_string(),
            submit_command,
            work_dir: work_dir.to_string_lossy().into_owned(),
        }
    }

    async fn submit_to_scheduler(&self, submitter: &str, descriptor: &Path) -> AppResult<JobId> {
        let dir = descriptor_dir(descriptor);
        let command_line = submit_command(
            submitter,
            &descriptor.to_string_lossy(),
            Some(&dir.to_string_lossy()),
        );
        let mut command = Command::new("sh");
        command.arg("-c").arg(&command_line).current_dir(&dir);
        let result = capture(&mut command)
            .await
            .map_err(|e| AppError::local(format!("failed to run '{command_line}': {e}")))?;
        if !result.success() {
            return Err(AppError::local(format!(
                "'{command_line}' exited with {}: {}",
                result.exit_code,
                result.stderr_lossy().trim()
            )));
        }
        job_id_or_raw(&result.stdout_lossy()).ok_or_else(|| {
            AppError::local(format!("'{command_line}' did not report a job id"))
        })
    }

    fn launch_detached(&self, descriptor: &Path) -> AppResult<JobId> {
        let dir = descriptor_dir(descriptor);
        let log = |ext: &str| -> AppResult<fs::File> {
            let mut name = descriptor.as_os_str().to_owned();
            name.push(ext);
            fs::File::create(&name).map_err(|e| {
                AppError::local(format!(
                    "failed to create {}: {e}",
                    Path::new(&name).display()
                ))
            })
        };
        let stdout = log(".out")?;
        let stderr = log(".err")?;
        let child = Command::new(&self.shell)
            .arg(descriptor)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| {
                AppError::local(format!("failed to launch {}: {e}", descriptor.display()))
            })?;
        let pid = child
            .id()
            .ok_or_else(|| AppError::local("launched job exited before reporting a pid"))?;
        Ok(JobId(pid.to_string()))
    }
}

#[async_trait]
impl ExecutionBackend for LocalBackend {
    fn id(&self) -> BackendId {
        BackendId::Local
    }

    fn is_local(&self) -> bool {
        true
    }

    fn work_dir(&self) -> &str {
        &self.work_dir
    }

    async fn run_command(&self, command_line: &str) -> AppResult<ExecCapture> {
        let mut command = Command::new("sh");
        command.arg("-c").arg(command_line);
        capture(&mut command)
            .await
            .map_err(|e| AppError::local(format!("failed to run '{command_line}': {e}")))
    }

    async fn push_dir(&self, local_dir: &Path, remote_parent: &str) -> AppResult<String> {
        let name = local_dir.file_name().ok_or_else(|| {
            AppError::local(format!("{} has no directory name", local_dir.display()))
        })?;
        let target = Path::new(remote_parent).join(name);
        copy_tree_blocking(local_dir.to_path_buf(), target.clone()).await?;
        Ok(target.to_string_lossy().into_owned())
    }

    async fn pull_dir(&self, remote_path: &str, local_path: &Path) -> AppResult<()> {
        copy_tree_blocking(PathBuf::from(remote_path), local_path.to_path_buf()).await
    }

    #[tracing::instrument(skip(self))]
    async fn submit_job(&self, descriptor: &str) -> AppResult<JobId> {
        let descriptor = Path::new(descriptor);
        if !descriptor.is_file() {
            return Err(AppError::local(format!(
                "job descriptor not found at {}",
                descriptor.display()
            )));
        }
        let job_id = match &self.submit_command {
            Some(submitter) => self.submit_to_scheduler(submitter, descriptor).await?,
            None => self.launch_detached(descriptor)?,
        };
        tracing::debug!(job_id = %job_id, "local job submitted");
        Ok(job_id)
    }
}

fn descriptor_dir(descriptor: &Path) -> PathBuf {
    descriptor
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

async fn copy_tree_blocking(src: PathBuf, dst: PathBuf) -> AppResult<()> {
    let label = format!("{} -> {}", src.display(), dst.display());
    tokio::task::spawn_blocking(move || copy_tree(&src, &dst))
        .await
        .map_err(|e| AppError::Internal(format!("copy task failed: {e}")))?
        .map_err(|e| AppError::local(format!("failed to copy {label}: {e}")))
}

/// Recursively copies `src` into `dst`, creating `dst` if needed. Symlinks are followed.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
