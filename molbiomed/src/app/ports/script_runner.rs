// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;

use async_trait::async_trait;

use crate::app::errors::AppResult;

#[derive(Debug, Clone, Default)]
pub struct ExecCapture {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl ExecCapture {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// A fully resolved external command: `<program> <script> <args...>` run inside `cwd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    pub program: String,
    pub script: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl ScriptInvocation {
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 2);
        parts.push(self.program.clone());
        parts.push(self.script.to_string_lossy().into_owned());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[async_trait]
/// Synchronous invocation boundary for external generator scripts.
/// Waits for the process to exit and returns both output streams separately.
pub trait ScriptRunnerPort: Send + Sync {
    async fn run(&self, invocation: &ScriptInvocation) -> AppResult<ExecCapture>;
}
