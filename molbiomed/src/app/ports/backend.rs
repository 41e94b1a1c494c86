// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::ports::ExecCapture;
use crate::app::types::{BackendId, JobId};

#[async_trait]
/// Execution environment that accepts job descriptors.
/// Remote implementations also move directories between the local
/// workspace and their own filesystem.
pub trait ExecutionBackend: Send + Sync {
    fn id(&self) -> BackendId;

    fn is_local(&self) -> bool;

    /// Base directory for batch roots on the backend's filesystem.
    fn work_dir(&self) -> &str;

    async fn run_command(&self, command: &str) -> AppResult<ExecCapture>;

    /// Copies `local_dir` into `remote_parent` and returns the path of the copy.
    async fn push_dir(&self, local_dir: &Path, remote_parent: &str) -> AppResult<String>;

    async fn pull_dir(&self, remote_path: &str, local_path: &Path) -> AppResult<()>;

    async fn submit_job(&self, descriptor: &str) -> AppResult<JobId>;
}

/// Maps backend identifiers to configured backends.
pub trait BackendResolverPort: Send + Sync {
    fn resolve(&self, id: BackendId) -> AppResult<Arc<dyn ExecutionBackend>>;
}
