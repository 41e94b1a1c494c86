// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::types::BatchState;

#[async_trait]
/// Persistence for the state bridging the submit and collect phases, keyed by batch name.
pub trait BatchStorePort: Send + Sync {
    async fn save(&self, state: &BatchState) -> AppResult<()>;
    async fn load(&self, batch_name: &str) -> AppResult<Option<BatchState>>;
}
