// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use serde_json::json;

use crate::app::errors::AppError;
use crate::app::types::{AggregatedOutput, BatchSubmission, LinkKind, MmpbsaSetup, ReplicaJob};

pub fn format_json(value: serde_json::Value) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&value)?)
}

fn str_width(value: &str) -> usize {
    value.chars().count()
}

fn job_to_json(job: &ReplicaJob) -> serde_json::Value {
    json!({
        "replica": job.replica,
        "tag": job.tag.as_str(),
        "job_id": job.job_id.0.as_str(),
        "workdir": job.workdir.display().to_string(),
        "remote_dir": job.remote_dir.as_deref(),
    })
}

pub fn submission_to_json(submission: &BatchSubmission) -> serde_json::Value {
    let state = &submission.state;
    json!({
        "batch": state.batch_name.as_str(),
        "backend": state.backend.as_str(),
        "workspace_root": state.workspace_root.path().display().to_string(),
        "replica_count": state.replica_count,
        "submitted_at": state.submitted_at.as_deref(),
        "jobs": submission.jobs().iter().map(job_to_json).collect::<Vec<_>>(),
    })
}

/// Replica table followed by the workspace location.
pub fn format_submission(submission: &BatchSubmission) -> String {
    let headers = ["replica", "job id", "workdir"];
    let rows: Vec<[String; 3]> = submission
        .jobs()
        .iter()
        .map(|job| {
            [
                job.tag.clone(),
                job.job_id.to_string(),
                job.remote_dir
                    .clone()
                    .unwrap_or_else(|| job.workdir.display().to_string()),
            ]
        })
        .collect();
    let mut output = format_table(&headers, &rows);
    output.push_str(&format!(
        "\nsubmitted {} replica(s) of '{}' to {}; workspace {}\n",
        submission.jobs().len(),
        submission.state.batch_name,
        submission.state.backend,
        submission.state.workspace_root.path().display()
    ));
    output
}

fn link_kind_str(kind: LinkKind) -> &'static str {
    match kind {
        LinkKind::Symlink => "symlink",
        LinkKind::PointerFile => "pointer file",
        LinkKind::Existing => "existing",
    }
}

pub fn aggregated_to_json(output: &AggregatedOutput) -> serde_json::Value {
    json!({
        "preprod_dir": output.preprod_dir.display().to_string(),
        "prod_dir": output.prod_dir.display().to_string(),
        "downloaded": output.downloaded,
        "links": output.links.iter().map(|link| json!({
            "replica": link.replica,
            "stage": link.stage.as_str(),
            "path": link.path.display().to_string(),
            "kind": link.kind,
        })).collect::<Vec<_>>(),
        "warnings": output.warnings,
    })
}

pub fn format_aggregated(output: &AggregatedOutput) -> String {
    let headers = ["link", "kind"];
    let rows: Vec<[String; 2]> = output
        .links
        .iter()
        .map(|link| {
            [
                link.path.display().to_string(),
                link_kind_str(link.kind).to_string(),
            ]
        })
        .collect();
    let mut text = format_table(&headers, &rows);
    text.push_str(&format!(
        "\npreprod: {}\nprod:    {}\n",
        output.preprod_dir.display(),
        output.prod_dir.display()
    ));
    for warning in &output.warnings {
        text.push_str(&format!("warning: {warning}\n"));
    }
    text
}

pub fn mmpbsa_to_json(setup: &MmpbsaSetup) -> serde_json::Value {
    json!({
        "input_file": setup.input_file.display().to_string(),
        "script_file": setup.script_file.display().to_string(),
        "executed": setup.executed,
    })
}

pub fn format_mmpbsa(setup: &MmpbsaSetup) -> String {
    let mut text = format!(
        "input:  {}\nscript: {}\n",
        setup.input_file.display(),
        setup.script_file.display()
    );
    if setup.executed {
        text.push_str("script executed\n");
    }
    text
}

pub fn error_to_json(err: &AppError) -> serde_json::Value {
    json!({
        "error": {
            "code": err.code(),
            "message": err.to_string(),
            "submitted": err.submitted_jobs().iter().map(job_to_json).collect::<Vec<_>>(),
        }
    })
}

pub fn format_error(err: &AppError) -> String {
    let mut text = format!("error: {err}\n");
    let submitted = err.submitted_jobs();
    if !submitted.is_empty() {
        text.push_str("jobs already submitted for earlier replicas remain queued:\n");
        for job in submitted {
            text.push_str(&format!("  {} job {}\n", job.tag, job.job_id));
        }
    }
    text
}

fn format_table<const N: usize>(headers: &[&str; N], rows: &[[String; N]]) -> String {
    let mut widths = headers.map(str_width);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(str_width(cell));
        }
    }
    let render = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let mut output = render(headers.to_vec());
    output.push('\n');
    for row in rows {
        output.push_str(&render(row.iter().map(String::as_str).collect()));
        output.push('\n');
    }
    output
}
