// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::{Component, Path, PathBuf};

use crate::app::types::{Stage, batch_slug};

/// Joins `relative_path` under `remote_base` and normalizes the result
/// without touching either filesystem. Absolute inputs are re-rooted under the base.
pub fn resolve_relative(remote_base: impl AsRef<Path>, relative_path: impl AsRef<Path>) -> PathBuf {
    let base = remote_base.as_ref();
    let rel: PathBuf = relative_path
        .as_ref()
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    normalize_path(base.join(rel))
}

/// Removes `.` and resolves `..` syntactically. A leading root is kept.
pub fn normalize_path(p: impl AsRef<Path>) -> PathBuf {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for comp in p.as_ref().components() {
        match comp {
            Component::Prefix(_) | Component::RootDir => out.push(comp.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(seg) => {
                out.push(seg);
                depth += 1;
            }
        }
    }
    out
}

/// `<work_dir>/<batch slug>` on the backend's filesystem.
pub fn remote_batch_root(work_dir: &str, batch_name: &str) -> String {
    resolve_relative(work_dir, batch_slug(batch_name))
        .to_string_lossy()
        .into_owned()
}

pub fn remote_stage_path(remote_dir: &str, stage: Stage) -> String {
    resolve_relative(remote_dir, stage.as_str())
        .to_string_lossy()
        .into_owned()
}

pub fn remote_join(remote_dir: &str, name: &str) -> String {
    resolve_relative(remote_dir, name)
        .to_string_lossy()
        .into_owned()
}
