// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::app::errors::{AppError, AppResult};
use crate::app::ports::{ExecCapture, ScriptInvocation, ScriptRunnerPort};

/// Runs `command` to completion with piped output streams.
pub async fn capture(command: &mut Command) -> std::io::Result<ExecCapture> {
    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;
    Ok(ExecCapture {
        stdout: output.stdout,
        stderr: output.stderr,
        // killed by a signal
        exit_code: output.status.code().unwrap_or(-1),
    })
}

#[derive(Clone, Default)]
pub struct TokioScriptRunner;

impl TokioScriptRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScriptRunnerPort for TokioScriptRunner {
    #[tracing::instrument(skip_all, fields(script = %invocation.script.display(), cwd = %invocation.cwd.display()))]
    async fn run(&self, invocation: &ScriptInvocation) -> AppResult<ExecCapture> {
        let mut command = Command::new(&invocation.program);
        command
            .arg(&invocation.script)
            .args(&invocation.args)
            .current_dir(&invocation.cwd);
        let result = capture(&mut command).await.map_err(|e| {
            AppError::local(format!(
                "failed to start '{}': {e}",
                invocation.command_line()
            ))
        })?;
        tracing::debug!(exit_code = result.exit_code, "script finished");
        Ok(result)
    }
}
