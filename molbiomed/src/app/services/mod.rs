// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod invocation;
pub mod links;
pub mod remote_path;
pub mod shell;
pub mod slurm;
pub mod workspace;
