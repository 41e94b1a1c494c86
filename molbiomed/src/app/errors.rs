// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;

use thiserror::Error as ThisError;

use crate::app::types::ReplicaJob;

pub mod codes {
    pub const UNSUPPORTED_BACKEND: &str = "unsupported_backend";
    pub const MISSING_REQUIRED_INPUT: &str = "missing_required_input";
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
    pub const EXTERNAL_SCRIPT_FAILURE: &str = "external_script_failure";
    pub const WORKSPACE_NOT_FOUND: &str = "workspace_not_found";
    pub const LOCAL_ERROR: &str = "local_error";
    pub const REMOTE_ERROR: &str = "remote_error";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

pub const EXIT_CODE_USAGE: i32 = 2;
pub const EXIT_CODE_OTHER: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorKind {
    Usage,
    NotFound,
    External,
    Local,
    Remote,
    Internal,
}

#[derive(Debug, ThisError)]
pub enum AppError {
    #[error("backend '{backend}' is not supported; supported backends are: {}", .supported.join(", "))]
    UnsupportedBackend {
        backend: String,
        supported: Vec<&'static str>,
    },
    #[error("missing required input: {0}")]
    MissingRequiredInput(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{} script failed{}: {stderr}", replica_label(.replica), exit_label(.exit_code))]
    ExternalScriptFailure {
        replica: Option<u32>,
        exit_code: Option<i32>,
        stderr: String,
        submitted: Vec<ReplicaJob>,
    },
    #[error("replica {replica} could not be submitted: {source}")]
    SubmissionAborted {
        replica: u32,
        source: Box<AppError>,
        submitted: Vec<ReplicaJob>,
    },
    #[error("workspace not found at {}; nothing to collect", .0.display())]
    WorkspaceNotFound(PathBuf),
    #[error("{0}")]
    Local(String),
    #[error("{0}")]
    Remote(String),
    #[error("{0}")]
    Internal(String),
}

fn replica_label(replica: &Option<u32>) -> String {
    match replica {
        Some(idx) => format!("replica {idx}"),
        None => "generator".to_string(),
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => String::new(),
    }
}

impl AppError {
    pub fn local(message: impl Into<String>) -> Self {
        Self::Local(message.into())
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    pub fn kind(&self) -> AppErrorKind {
        match self {
            AppError::UnsupportedBackend { .. }
            | AppError::MissingRequiredInput(_)
            | AppError::InvalidArgument(_) => AppErrorKind::Usage,
            AppError::WorkspaceNotFound(_) => AppErrorKind::NotFound,
            AppError::SubmissionAborted { source, .. } => source.kind(),
            AppError::ExternalScriptFailure { .. } => AppErrorKind::External,
            AppError::Local(_) => AppErrorKind::Local,
            AppError::Remote(_) => AppErrorKind::Remote,
            AppError::Internal(_) => AppErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::UnsupportedBackend { .. } => codes::UNSUPPORTED_BACKEND,
            AppError::MissingRequiredInput(_) => codes::MISSING_REQUIRED_INPUT,
            AppError::InvalidArgument(_) => codes::INVALID_ARGUMENT,
            AppError::ExternalScriptFailure { .. } => codes::EXTERNAL_SCRIPT_FAILURE,
            AppError::WorkspaceNotFound(_) => codes::WORKSPACE_NOT_FOUND,
            AppError::SubmissionAborted { source, .. } => source.code(),
            AppError::Local(_) => codes::LOCAL_ERROR,
            AppError::Remote(_) => codes::REMOTE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            AppErrorKind::Usage => EXIT_CODE_USAGE,
            _ => EXIT_CODE_OTHER,
        }
    }

    /// Jobs that were already submitted when a batch aborted.
    pub fn submitted_jobs(&self) -> &[ReplicaJob] {
        match self {
            AppError::ExternalScriptFailure { submitted, .. }
            | AppError::SubmissionAborted { submitted, .. } => submitted,
            _ => &[],
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
