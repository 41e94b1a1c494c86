// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::services::shell::sh_escape;
use crate::app::types::JobId;

/// Extracts the numeric id from sbatch output such as "Submitted batch job 11".
pub fn parse_job_id(output: &str) -> Option<JobId> {
    let marker = "job ";
    output.lines().find_map(|line| {
        let idx = line.find(marker)?;
        let after_job = line[idx + marker.len()..].trim();
        let id = after_job.split_whitespace().next()?;
        id.parse::<u64>().ok().map(|n| JobId(n.to_string()))
    })
}

/// Scheduler id if the output has one, otherwise the trimmed output itself.
pub fn job_id_or_raw(output: &str) -> Option<JobId> {
    parse_job_id(output).or_else(|| {
        let trimmed = output.trim();
        (!trimmed.is_empty()).then(|| JobId(trimmed.to_string()))
    })
}

/// Builds the submission command for a job descriptor.
/// `--chdir` is only understood by sbatch, other submitters just get the script.
pub fn submit_command(submitter: &str, script: &str, chdir: Option<&str>) -> String {
    match chdir {
        Some(dir) if submitter == "sbatch" || submitter.ends_with("/sbatch") => format!(
            "{submitter} --chdir {} {}",
            sh_escape(dir),
            sh_escape(script)
        ),
        Some(dir) => format!("cd {} && {submitter} {}", sh_escape(dir), sh_escape(script)),
        None => format!("{submitter} {}", sh_escape(script)),
    }
}
