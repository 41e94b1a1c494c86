// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::app::errors::{AppError, AppResult};
use crate::app::ports::BatchStorePort;
use crate::app::types::{BatchState, batch_slug};

const BATCHES_DIR: &str = "batches";

/// One pretty-printed JSON file per batch under `<state_dir>/batches`.
pub struct JsonBatchStore {
    dir: PathBuf,
}

impl JsonBatchStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join(BATCHES_DIR),
        }
    }

    fn path_for(&self, batch_name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", batch_slug(batch_name)))
    }
}

#[async_trait]
impl BatchStorePort for JsonBatchStore {
    async fn save(&self, state: &BatchState) -> AppResult<()> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            AppError::local(format!("failed to create {}: {e}", self.dir.display()))
        })?;
        let body = serde_json::to_vec_pretty(state)
            .map_err(|e| AppError::Internal(format!("failed to encode batch state: {e}")))?;
        let path = self.path_for(&state.batch_name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .await
            .map_err(|e| AppError::local(format!("failed to write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::local(format!("failed to replace {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "batch state saved");
        Ok(())
    }

    async fn load(&self, batch_name: &str) -> AppResult<Option<BatchState>> {
        let path = self.path_for(batch_name);
        let body = match fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::local(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        serde_json::from_slice(&body).map(Some).map_err(|e| {
            AppError::Internal(format!("corrupt batch state {}: {e}", path.display()))
        })
    }
}
