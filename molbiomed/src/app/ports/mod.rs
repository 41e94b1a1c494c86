// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod backend;
pub mod batch_store;
pub mod clock;
pub mod script_runner;
pub mod telemetry;

pub use backend::{BackendResolverPort, ExecutionBackend};
pub use batch_store::BatchStorePort;
pub use clock::ClockPort;
pub use script_runner::{ExecCapture, ScriptInvocation, ScriptRunnerPort};
pub use telemetry::{NoopTelemetry, TelemetryEvent, TelemetryPort};
