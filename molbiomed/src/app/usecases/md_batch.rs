// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;
use std::sync::Arc;

use super::{UseCases, log_captured};
use crate::app::errors::{AppError, AppResult};
use crate::app::ports::{ExecutionBackend, TelemetryEvent};
use crate::app::services::invocation::{
    JOB_DESCRIPTOR, MdScriptArgs, md_generator_script, md_invocation,
};
use crate::app::services::links::{link_name, link_once};
use crate::app::services::remote_path::{remote_batch_root, remote_join, remote_stage_path};
use crate::app::services::shell::mkdir_p_command;
use crate::app::services::workspace::{
    create_replica_dir, ensure_input_files, input_file_name, prepare_clean, stage_inputs,
    stage_report,
};
use crate::app::types::{
    AggregatedLink, AggregatedOutput, BackendId, BatchState, BatchSubmission, DEFAULT_REPLICAS,
    JobBatchRequest, MD_BACKENDS, ReplicaHandle, ReplicaJob, Stage, WorkspaceRoot, replica_tag,
    validate_batch_name,
};

impl UseCases {
    /// Prepares, generates and submits every replica of a batch, one at a time.
    ///
    /// The first generator failure aborts the batch. Jobs submitted for earlier
    /// replicas stay submitted and are reported through the returned error.
    pub async fn submit_batch(&self, request: &JobBatchRequest) -> AppResult<BatchSubmission> {
        let backend_id = BackendId::parse_supported(&request.backend, MD_BACKENDS)?;
        let last_residue = request.resolve_last_residue()?;
        validate_batch_name(&request.batch_name)?;
        if request.replica_count == 0 {
            return Err(AppError::InvalidArgument(
                "replica count must be at least 1".to_string(),
            ));
        }
        ensure_input_files(&[&request.topology, &request.coordinates]).await?;
        let topology_name = input_file_name(&request.topology)?;
        let coordinates_name = input_file_name(&request.coordinates)?;
        let backend = self.backends.resolve(backend_id)?;

        let root = WorkspaceRoot::for_batch(&self.settings.workspace_dir, &request.batch_name);
        prepare_clean(&root).await?;

        let total = request.replica_count;
        let mut state = BatchState::new(&request.batch_name, backend_id, root.clone(), total);
        state.submitted_at = self.timestamp();
        self.batches.save(&state).await?;

        self.telemetry.event(
            "md.batch.submit.started",
            TelemetryEvent {
                batch: Some(state.batch_name.clone()),
                backend: Some(backend_id.to_string()),
                ..TelemetryEvent::default()
            },
        );

        let remote_root = if backend.is_local() {
            None
        } else {
            Some(self.ensure_remote_root(backend.as_ref(), &request.batch_name).await?)
        };

        let script = md_generator_script(&self.settings.protocols_dir);
        let ctx = ReplicaContext {
            root: &root,
            script: &script,
            args: MdScriptArgs {
                topology_name: &topology_name,
                coordinates_name: &coordinates_name,
                last_residue,
                temperature: request.temperature,
                length_ns: request.length_ns,
                backend: backend_id,
            },
            inputs: [request.topology.as_path(), request.coordinates.as_path()],
            total,
        };
        for replica in 1..=total {
            let job = match self
                .submit_replica(backend.as_ref(), remote_root.as_deref(), &ctx, replica)
                .await
            {
                Ok(job) => job,
                Err(err) => {
                    self.telemetry.event(
                        "md.batch.submit.failed",
                        TelemetryEvent {
                            batch: Some(state.batch_name.clone()),
                            backend: Some(backend_id.to_string()),
                            replica: Some(replica),
                            ..TelemetryEvent::default()
                        },
                    );
                    return Err(abort_batch(err, replica, state.jobs));
                }
            };
            tracing::info!(
                replica,
                job_id = %job.job_id,
                "replica submitted"
            );
            self.telemetry.event(
                "md.replica.submitted",
                TelemetryEvent {
                    batch: Some(state.batch_name.clone()),
                    backend: Some(backend_id.to_string()),
                    replica: Some(replica),
                    job_id: Some(job.job_id.to_string()),
                    remote_path: job.remote_dir.clone(),
                },
            );
            if let Some(remote_dir) = &job.remote_dir {
                state.handles.push(ReplicaHandle {
                    replica,
                    remote_dir: remote_dir.clone(),
                });
            }
            state.jobs.push(job);
            self.batches.save(&state).await?;
        }

        self.telemetry.event(
            "md.batch.submitted",
            TelemetryEvent {
                batch: Some(state.batch_name.clone()),
                backend: Some(backend_id.to_string()),
                remote_path: remote_root,
                ..TelemetryEvent::default()
            },
        );
        Ok(BatchSubmission { state })
    }

    /// Stages, generates and submits one replica.
    async fn submit_replica(
        &self,
        backend: &dyn ExecutionBackend,
        remote_root: Option<&str>,
        ctx: &ReplicaContext<'_>,
        replica: u32,
    ) -> AppResult<ReplicaJob> {
        let dir = create_replica_dir(ctx.root, replica).await?;
        stage_inputs(&dir, &ctx.inputs).await?;

        let invocation = md_invocation(&self.settings.shell, ctx.script, &dir, &ctx.args);
        tracing::info!(
            "[Replica {replica}/{}] executing script: {}",
            ctx.total,
            invocation.command_line()
        );
        let capture = self.scripts.run(&invocation).await?;
        let tag = replica_tag(replica);
        if !capture.success() {
            return Err(AppError::ExternalScriptFailure {
                replica: Some(replica),
                exit_code: Some(capture.exit_code),
                stderr: capture.stderr_lossy(),
                submitted: Vec::new(),
            });
        }
        log_captured(&tag, &capture);
        for (stage, present) in stage_report(&dir).await {
            if present {
                tracing::info!("  {tag}/{stage}/");
            } else {
                tracing::info!("  {tag}/{stage}/ (not found)");
            }
        }

        let descriptor = dir.join(JOB_DESCRIPTOR);
        if !descriptor.is_file() {
            return Err(AppError::local(format!(
                "job descriptor not found at {}",
                descriptor.display()
            )));
        }
        tracing::info!("job descriptor: {}", descriptor.display());

        match remote_root {
            None => {
                let job_id = backend.submit_job(&descriptor.to_string_lossy()).await?;
                Ok(ReplicaJob {
                    replica,
                    tag,
                    job_id,
                    workdir: dir,
                    remote_dir: None,
                })
            }
            Some(remote_root) => {
                let remote_dir = backend.push_dir(&dir, remote_root).await?;
                let job_id = backend
                    .submit_job(&remote_join(&remote_dir, JOB_DESCRIPTOR))
                    .await?;
                Ok(ReplicaJob {
                    replica,
                    tag,
                    job_id,
                    workdir: dir,
                    remote_dir: Some(remote_dir),
                })
            }
        }
    }

    async fn ensure_remote_root(
        &self,
        backend: &dyn ExecutionBackend,
        batch_name: &str,
    ) -> AppResult<String> {
        let remote_root = remote_batch_root(backend.work_dir(), batch_name);
        let capture = backend.run_command(&mkdir_p_command(&remote_root)).await?;
        if !capture.success() {
            return Err(AppError::remote(format!(
                "failed to create remote directory {remote_root} on {}: {}",
                backend.id(),
                capture.stderr_lossy().trim()
            )));
        }
        tracing::debug!(remote_root = %remote_root, "remote batch root ready");
        Ok(remote_root)
    }

    /// Downloads recorded replicas (remote backends) and links every present stage
    /// subtree into the aggregate directories. Per-replica failures become warnings.
    pub async fn collect_batch(
        &self,
        state: &BatchState,
        replica_count: u32,
    ) -> AppResult<AggregatedOutput> {
        let root = &state.workspace_root;
        if !root.path().is_dir() {
            return Err(AppError::WorkspaceNotFound(root.path().to_path_buf()));
        }

        let mut warnings = Vec::new();
        let mut downloaded = Vec::new();
        if !state.backend.is_local() {
            match self.backends.resolve(state.backend) {
                Ok(backend) => {
                    downloaded = download_replicas(
                        backend,
                        root,
                        &state.handles,
                        replica_count,
                        &mut warnings,
                    )
                    .await;
                }
                Err(err) => {
                    tracing::warn!("skipping downloads: {err}");
                    warnings.push(format!("skipping downloads: {err}"));
                }
            }
        }

        let preprod_dir = root.aggregate_dir(Stage::Preprod);
        let prod_dir = root.aggregate_dir(Stage::Prod);
        for dir in [&preprod_dir, &prod_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| AppError::local(format!("failed to create {}: {e}", dir.display())))?;
        }

        let mut links = Vec::new();
        for replica in 1..=replica_count {
            let tag = replica_tag(replica);
            for stage in Stage::ALL {
                let source = root.replica_dir(replica).join(stage.as_str());
                if !source.is_dir() {
                    continue;
                }
                let target = root.aggregate_dir(stage).join(link_name(&tag, stage));
                match link_once(&source, &target) {
                    Ok(kind) => links.push(AggregatedLink {
                        replica,
                        stage,
                        path: target,
                        kind,
                    }),
                    Err(err) => {
                        tracing::warn!("failed to link {tag}/{stage}: {err}");
                        warnings.push(format!("failed to link {tag}/{stage}: {err}"));
                    }
                }
            }
        }

        self.telemetry.event(
            "md.batch.collected",
            TelemetryEvent {
                batch: Some(state.batch_name.clone()),
                backend: Some(state.backend.to_string()),
                ..TelemetryEvent::default()
            },
        );
        Ok(AggregatedOutput {
            preprod_dir,
            prod_dir,
            links,
            downloaded,
            warnings,
        })
    }

    /// Collects a batch by name using its persisted state.
    ///
    /// Without a record the batch is treated as having no handles: nothing is
    /// downloaded and local replica directories are still aggregated.
    pub async fn collect_stored_batch(
        &self,
        batch_name: &str,
        replica_count: Option<u32>,
        fallback_backend: BackendId,
    ) -> AppResult<AggregatedOutput> {
        validate_batch_name(batch_name)?;
        let (state, missing) = match self.batches.load(batch_name).await? {
            Some(state) => (state, None),
            None => {
                let message = format!(
                    "no recorded state for batch '{batch_name}'; proceeding without handles"
                );
                tracing::warn!("{message}");
                let root = WorkspaceRoot::for_batch(&self.settings.workspace_dir, batch_name);
                let count = replica_count.unwrap_or(DEFAULT_REPLICAS);
                (
                    BatchState::new(batch_name, fallback_backend, root, count),
                    Some(message),
                )
            }
        };
        let count = replica_count.unwrap_or(state.replica_count);
        let mut output = self.collect_batch(&state, count).await?;
        if let Some(message) = missing {
            output.warnings.insert(0, message);
        }
        Ok(output)
    }
}

/// Per-batch inputs shared by every replica of a submission.
struct ReplicaContext<'a> {
    root: &'a WorkspaceRoot,
    script: &'a Path,
    args: MdScriptArgs<'a>,
    inputs: [&'a Path; 2],
    total: u32,
}

/// Attaches the jobs already submitted to the error that stopped the batch.
fn abort_batch(err: AppError, replica: u32, submitted: Vec<ReplicaJob>) -> AppError {
    if !submitted.is_empty() {
        let ids = submitted
            .iter()
            .map(|job| format!("{} ({})", job.tag, job.job_id))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::warn!("batch stopped at replica {replica}; already submitted: {ids}");
    }
    match err {
        AppError::ExternalScriptFailure {
            replica,
            exit_code,
            stderr,
            ..
        } => AppError::ExternalScriptFailure {
            replica,
            exit_code,
            stderr,
            submitted,
        },
        err if submitted.is_empty() => err,
        err => AppError::SubmissionAborted {
            replica,
            source: Box::new(err),
            submitted,
        },
    }
}

async fn download_replicas(
    backend: Arc<dyn ExecutionBackend>,
    root: &WorkspaceRoot,
    handles: &[ReplicaHandle],
    replica_count: u32,
    warnings: &mut Vec<String>,
) -> Vec<u32> {
    if handles.len() != replica_count as usize {
        let message = format!(
            "recorded {} replica handle(s) but {replica_count} replica(s) were requested; downloading what is available",
            handles.len()
        );
        tracing::warn!("{message}");
        warnings.push(message);
    }

    let mut downloaded = Vec::new();
    for handle in handles {
        let local_dir = root.replica_dir(handle.replica);
        if pull_stages(backend.as_ref(), &handle.remote_dir, &local_dir, warnings).await {
            downloaded.push(handle.replica);
        }
    }
    downloaded
}

async fn pull_stages(
    backend: &dyn ExecutionBackend,
    remote_dir: &str,
    local_dir: &Path,
    warnings: &mut Vec<String>,
) -> bool {
    let mut all_ok = true;
    for stage in Stage::ALL {
        let remote = remote_stage_path(remote_dir, stage);
        let local = local_dir.join(stage.as_str());
        tracing::info!("downloading {remote} -> {}", local.display());
        if let Err(err) = backend.pull_dir(&remote, &local).await {
            tracing::warn!("download of {remote} failed: {err}");
            warnings.push(format!("download of {remote} failed: {err}"));
            all_ok = false;
        }
    }
    all_ok
}
