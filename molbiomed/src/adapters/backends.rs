// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::local::LocalBackend;
use crate::adapters::ssh::OpenSshBackend;
use crate::app::errors::{AppError, AppResult};
use crate::app::ports::{BackendResolverPort, ExecutionBackend};
use crate::app::types::BackendId;
use crate::config::Config;

/// Backends built once from configuration.
pub struct BackendRegistry {
    local: Arc<dyn ExecutionBackend>,
    remotes: HashMap<BackendId, Arc<dyn ExecutionBackend>>,
}

impl BackendRegistry {
    pub fn from_config(config: &Config) -> Self {
        let local: Arc<dyn ExecutionBackend> = Arc::new(LocalBackend::new(
            &config.shell,
            config.local.submit_command.clone(),
            &config.workspace_dir,
        ));
        let mut remotes: HashMap<BackendId, Arc<dyn ExecutionBackend>> = HashMap::new();
        for id in [BackendId::Picard, BackendId::Csuc, BackendId::Slurm] {
            if let Some(remote) = config.remote(id) {
                remotes.insert(id, Arc::new(OpenSshBackend::new(id, remote.clone())));
            }
        }
        Self { local, remotes }
    }
}

impl BackendResolverPort for BackendRegistry {
    fn resolve(&self, id: BackendId) -> AppResult<Arc<dyn ExecutionBackend>> {
        if id.is_local() {
            return Ok(self.local.clone());
        }
        self.remotes.get(&id).cloned().ok_or_else(|| {
            AppError::MissingRequiredInput(format!(
                "backend '{id}' has no [remotes.{id}] section in the configuration"
            ))
        })
    }
}
