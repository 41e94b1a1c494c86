// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::app::errors::{AppError, AppResult};
use crate::app::types::{Stage, WorkspaceRoot};

/// Wipes and recreates the batch root. Returns whether a previous tree was removed.
pub async fn prepare_clean(root: &WorkspaceRoot) -> AppResult<bool> {
    let path = root.path();
    let existed = fs::try_exists(path)
        .await
        .map_err(|e| AppError::local(format!("failed to inspect {}: {e}", path.display())))?;
    if existed {
        tracing::warn!(
            workspace = %path.display(),
            "removing existing workspace from a previous batch"
        );
        fs::remove_dir_all(path)
            .await
            .map_err(|e| AppError::local(format!("failed to remove {}: {e}", path.display())))?;
    }
    fs::create_dir_all(path)
        .await
        .map_err(|e| AppError::local(format!("failed to create {}: {e}", path.display())))?;
    Ok(existed)
}

pub async fn create_replica_dir(root: &WorkspaceRoot, replica: u32) -> AppResult<PathBuf> {
    let dir = root.replica_dir(replica);
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::local(format!("failed to create {}: {e}", dir.display())))?;
    Ok(dir)
}

/// File name component of an input path.
pub fn input_file_name(path: &Path) -> AppResult<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            AppError::InvalidArgument(format!("'{}' does not name a file", path.display()))
        })
}

/// Fails unless every input is an existing regular file.
pub async fn ensure_input_files(inputs: &[&Path]) -> AppResult<()> {
    for input in inputs {
        input_file_name(input)?;
        let meta = fs::metadata(input).await.map_err(|_| {
            AppError::InvalidArgument(format!("input file '{}' does not exist", input.display()))
        })?;
        if !meta.is_file() {
            return Err(AppError::InvalidArgument(format!(
                "input '{}' is not a regular file",
                input.display()
            )));
        }
    }
    Ok(())
}

/// Copies each input into `dir`, keeping its file name.
pub async fn stage_inputs(dir: &Path, inputs: &[&Path]) -> AppResult<Vec<PathBuf>> {
    let mut staged = Vec::with_capacity(inputs.len());
    for input in inputs {
        let target = dir.join(input_file_name(input)?);
        fs::copy(input, &target).await.map_err(|e| {
            AppError::local(format!(
                "failed to copy {} to {}: {e}",
                input.display(),
                target.display()
            ))
        })?;
        staged.push(target);
    }
    Ok(staged)
}

/// Which expected stage subtrees exist under a replica directory.
pub async fn stage_report(replica_dir: &Path) -> Vec<(Stage, bool)> {
    let mut report = Vec::with_capacity(Stage::ALL.len());
    for stage in Stage::ALL {
        let present = fs::metadata(replica_dir.join(stage.as_str()))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        report.push((stage, present));
    }
    report
}
