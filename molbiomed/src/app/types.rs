// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app::errors::{AppError, AppResult};

pub const DEFAULT_BATCH_NAME: &str = "md_custom";
pub const DEFAULT_TEMPERATURE_K: f64 = 300.0;
pub const DEFAULT_LENGTH_NS: u32 = 200;
pub const DEFAULT_REPLICAS: u32 = 1;

/// Execution environment a job descriptor is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    Local,
    Picard,
    Csuc,
    Slurm,
}

/// Backends the MD replica generator knows how to target.
pub const MD_BACKENDS: &[BackendId] = &[
    BackendId::Csuc,
    BackendId::Local,
    BackendId::Picard,
    BackendId::Slurm,
];

/// Clusters the MM-PBSA generator knows how to target.
pub const MMPBSA_BACKENDS: &[BackendId] = &[BackendId::Picard, BackendId::Csuc, BackendId::Local];

impl BackendId {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendId::Local => "local",
            BackendId::Picard => "picard",
            BackendId::Csuc => "csuc",
            BackendId::Slurm => "slurm",
        }
    }

    pub fn is_local(self) -> bool {
        matches!(self, BackendId::Local)
    }

    /// Parses `raw` and checks it against `supported`.
    pub fn parse_supported(raw: &str, supported: &[BackendId]) -> AppResult<BackendId> {
        let trimmed = raw.trim();
        supported
            .iter()
            .copied()
            .find(|id| id.as_str() == trimmed)
            .ok_or_else(|| AppError::UnsupportedBackend {
                backend: raw.to_string(),
                supported: supported.iter().map(|id| id.as_str()).collect(),
            })
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Residue picked in the host's structure viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidueSelection {
    #[serde(default)]
    pub residue: Option<i64>,
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JobBatchRequest {
    pub batch_name: String,
    pub topology: PathBuf,
    pub coordinates: PathBuf,
    pub temperature: f64,
    pub length_ns: u32,
    pub replica_count: u32,
    pub last_residue: Option<i64>,
    pub residue_selection: Option<ResidueSelection>,
    pub backend: String,
}

impl JobBatchRequest {
    pub fn new(topology: impl Into<PathBuf>, coordinates: impl Into<PathBuf>) -> Self {
        Self {
            batch_name: DEFAULT_BATCH_NAME.to_string(),
            topology: topology.into(),
            coordinates: coordinates.into(),
            temperature: DEFAULT_TEMPERATURE_K,
            length_ns: DEFAULT_LENGTH_NS,
            replica_count: DEFAULT_REPLICAS,
            last_residue: None,
            residue_selection: None,
            backend: BackendId::Local.as_str().to_string(),
        }
    }

    /// The explicit index wins over the interactive selection; non-positive values count as unset.
    pub fn resolve_last_residue(&self) -> AppResult<i64> {
        self.last_residue
            .filter(|value| *value > 0)
            .or_else(|| {
                self.residue_selection
                    .as_ref()
                    .and_then(|selection| selection.residue)
                    .filter(|value| *value > 0)
            })
            .ok_or_else(|| {
                AppError::MissingRequiredInput(
                    "last residue must be specified via index or interactive selection".to_string(),
                )
            })
    }
}

/// Root of a batch's local directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceRoot(PathBuf);

impl WorkspaceRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// `<base>/<batch slug>`.
    pub fn for_batch(base: &Path, batch_name: &str) -> Self {
        Self(base.join(batch_slug(batch_name)))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn replica_dir(&self, replica: u32) -> PathBuf {
        self.0.join(replica_tag(replica))
    }

    pub fn aggregate_dir(&self, stage: Stage) -> PathBuf {
        self.0.join(stage.aggregate_dir_name())
    }
}

/// Single path component derived from a batch name.
///
/// Whitespace runs become `_`, anything outside `[A-Za-z0-9_.-]` becomes `_`,
/// and a dot-only result is replaced so the slug never names `.` or `..`.
pub fn batch_slug(batch_name: &str) -> String {
    let slug: String = batch_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if slug.is_empty() {
        DEFAULT_BATCH_NAME.to_string()
    } else if slug.chars().all(|c| c == '.') {
        "_".repeat(slug.len())
    } else {
        slug
    }
}

/// Rejects batch names that look like paths instead of names.
pub fn validate_batch_name(batch_name: &str) -> AppResult<()> {
    let trimmed = batch_name.trim();
    if trimmed.contains(['/', '\\']) {
        return Err(AppError::InvalidArgument(format!(
            "batch name '{batch_name}' must not contain path separators"
        )));
    }
    if !trimmed.is_empty() && trimmed.chars().all(|c| c == '.') {
        return Err(AppError::InvalidArgument(format!(
            "batch name '{batch_name}' is not a valid name"
        )));
    }
    Ok(())
}

pub fn replica_tag(replica: u32) -> String {
    format!("replica_{replica:02}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Preprod,
    Prod,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::Preprod, Stage::Prod];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Preprod => "preprod",
            Stage::Prod => "prod",
        }
    }

    pub fn aggregate_dir_name(self) -> &'static str {
        match self {
            Stage::Preprod => "preprod_replicas",
            Stage::Prod => "prod_replicas",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaJob {
    pub replica: u32,
    pub tag: String,
    pub job_id: JobId,
    pub workdir: PathBuf,
    pub remote_dir: Option<String>,
}

/// Where a submitted replica's remote work directory lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaHandle {
    pub replica: u32,
    pub remote_dir: String,
}

/// Everything collect needs to know about a submitted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchState {
    pub batch_name: String,
    pub backend: BackendId,
    pub workspace_root: WorkspaceRoot,
    pub replica_count: u32,
    #[serde(default)]
    pub jobs: Vec<ReplicaJob>,
    #[serde(default)]
    pub handles: Vec<ReplicaHandle>,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

impl BatchState {
    pub fn new(
        batch_name: &str,
        backend: BackendId,
        workspace_root: WorkspaceRoot,
        replica_count: u32,
    ) -> Self {
        Self {
            batch_name: batch_name.to_string(),
            backend,
            workspace_root,
            replica_count,
            jobs: Vec::new(),
            handles: Vec::new(),
            submitted_at: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchSubmission {
    pub state: BatchState,
}

impl BatchSubmission {
    pub fn jobs(&self) -> &[ReplicaJob] {
        &self.state.jobs
    }

    pub fn handles(&self) -> &[ReplicaHandle] {
        &self.state.handles
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Symlink,
    /// Plain file holding the source path; link-equivalent, not a filesystem link.
    PointerFile,
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedLink {
    pub replica: u32,
    pub stage: Stage,
    pub path: PathBuf,
    pub kind: LinkKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedOutput {
    pub preprod_dir: PathBuf,
    pub prod_dir: PathBuf,
    pub links: Vec<AggregatedLink>,
    pub downloaded: Vec<u32>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadiusSet {
    Mbondi,
    #[default]
    Mbondi2,
    Mbondi3,
}

impl RadiusSet {
    pub fn as_str(self) -> &'static str {
        match self {
            RadiusSet::Mbondi => "mbondi",
            RadiusSet::Mbondi2 => "mbondi2",
            RadiusSet::Mbondi3 => "mbondi3",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MmpbsaRequest {
    pub job_name: String,
    pub trajectory: PathBuf,
    pub frames: u32,
    pub topology: PathBuf,
    pub solvent_mask: String,
    pub ligand_mask: String,
    pub output_prefix: String,
    pub radius_set: RadiusSet,
    pub cluster: String,
    pub run_now: bool,
}

impl MmpbsaRequest {
    pub fn new(topology: impl Into<PathBuf>, trajectory: impl Into<PathBuf>) -> Self {
        Self {
            job_name: "MMPBSA_job".to_string(),
            trajectory: trajectory.into(),
            frames: 5000,
            topology: topology.into(),
            solvent_mask: ":WAT:Na+:Cl-".to_string(),
            ligand_mask: ":LIG".to_string(),
            output_prefix: "mmpbsa_output".to_string(),
            radius_set: RadiusSet::default(),
            cluster: BackendId::Local.as_str().to_string(),
            run_now: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MmpbsaSetup {
    pub input_file: PathBuf,
    pub script_file: PathBuf,
    pub executed: bool,
}
