// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod backends;
pub mod cli;
pub mod local;
pub mod process;
pub mod ssh;
pub mod store;
pub mod telemetry;
pub mod time;
