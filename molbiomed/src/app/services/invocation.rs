// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::{Path, PathBuf};

use crate::app::ports::ScriptInvocation;
use crate::app::types::{BackendId, MmpbsaRequest};

/// Job descriptor the MD generator leaves in each replica directory.
pub const JOB_DESCRIPTOR: &str = "script.sh";
pub const MMPBSA_INPUT: &str = "mmpbsa.in";
pub const MMPBSA_SCRIPT: &str = "script_mmpbsa.sh";

pub fn md_generator_script(protocols_dir: &Path) -> PathBuf {
    protocols_dir
        .join("MD")
        .join("cMD")
        .join("create_md_custom.sh")
}

pub fn mmpbsa_generator_script(protocols_dir: &Path) -> PathBuf {
    protocols_dir.join("MM-PBSA").join("mmpbsa_setup.sh")
}

/// Always renders at least one decimal, e.g. `300.0`.
pub fn format_temperature(kelvin: f64) -> String {
    if kelvin.is_finite() && kelvin.fract() == 0.0 {
        format!("{kelvin:.1}")
    } else {
        format!("{kelvin}")
    }
}

#[derive(Debug, Clone)]
pub struct MdScriptArgs<'a> {
    pub topology_name: &'a str,
    pub coordinates_name: &'a str,
    pub last_residue: i64,
    pub temperature: f64,
    pub length_ns: u32,
    pub backend: BackendId,
}

pub fn md_invocation(
    shell: &str,
    script: &Path,
    replica_dir: &Path,
    args: &MdScriptArgs<'_>,
) -> ScriptInvocation {
    ScriptInvocation {
        program: shell.to_string(),
        script: script.to_path_buf(),
        args: vec![
            "-p".to_string(),
            args.topology_name.to_string(),
            "-c".to_string(),
            args.coordinates_name.to_string(),
            "-r".to_string(),
            args.last_residue.to_string(),
            "-t".to_string(),
            format_temperature(args.temperature),
            "-l".to_string(),
            args.length_ns.to_string(),
            "-m".to_string(),
            args.backend.as_str().to_string(),
        ],
        cwd: replica_dir.to_path_buf(),
    }
}

pub fn mmpbsa_invocation(
    shell: &str,
    script: &Path,
    workdir: &Path,
    request: &MmpbsaRequest,
    cluster: BackendId,
) -> ScriptInvocation {
    let flag = |f: &str, v: String| [f.to_string(), v];
    let args = [
        flag("-j", request.job_name.clone()),
        flag("-t", request.trajectory.to_string_lossy().into_owned()),
        flag("-f", request.frames.to_string()),
        flag("-p", request.topology.to_string_lossy().into_owned()),
        flag("-s", request.solvent_mask.clone()),
        flag("-n", request.ligand_mask.clone()),
        flag("-o", request.output_prefix.clone()),
        flag("-r", request.radius_set.as_str().to_string()),
        flag("-q", cluster.as_str().to_string()),
    ]
    .into_iter()
    .flatten()
    .collect();
    ScriptInvocation {
        program: shell.to_string(),
        script: script.to_path_buf(),
        args,
        cwd: workdir.to_path_buf(),
    }
}
