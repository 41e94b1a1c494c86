// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::ports::{TelemetryEvent, TelemetryPort};

#[derive(Clone, Default)]
pub struct TracingTelemetry;

impl TracingTelemetry {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetryPort for TracingTelemetry {
    fn event(&self, name: &'static str, fields: TelemetryEvent) {
        let TelemetryEvent {
            batch,
            backend,
            replica,
            job_id,
            remote_path,
        } = fields;

        tracing::info!(
            target: "molbiomed::telemetry",
            event = name,
            batch = batch.as_deref(),
            backend = backend.as_deref(),
            replica = replica,
            job_id = job_id.as_deref(),
            remote_path = remote_path.as_deref(),
        );
    }
}
