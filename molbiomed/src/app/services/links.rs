// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::io;
use std::path::Path;

use crate::app::errors::{AppError, AppResult};
use crate::app::types::{LinkKind, Stage};

/// `<replica_tag>_<stage>`.
pub fn link_name(tag: &str, stage: Stage) -> String {
    format!("{tag}_{}", stage.as_str())
}

/// Creates `target` pointing at `source` unless something already occupies the name.
///
/// A real symlink is attempted first. If the platform refuses, a plain file holding
/// the source path is written instead; callers should treat it as link-equivalent.
pub fn link_once(source: &Path, target: &Path) -> AppResult<LinkKind> {
    link_once_with(source, target, make_symlink)
}

fn link_once_with(
    source: &Path,
    target: &Path,
    link: fn(&Path, &Path) -> io::Result<()>,
) -> AppResult<LinkKind> {
    // symlink_metadata so dangling links still count as taken
    if std::fs::symlink_metadata(target).is_ok() {
        return Ok(LinkKind::Existing);
    }
    match link(source, target) {
        Ok(()) => Ok(LinkKind::Symlink),
        Err(err) => {
            tracing::debug!(
                link = %target.display(),
                error = %err,
                "symlink failed; writing pointer file"
            );
            std::fs::write(target, source.to_string_lossy().as_bytes()).map_err(|e| {
                AppError::local(format!(
                    "failed to write pointer file {}: {e}",
                    target.display()
                ))
            })?;
            Ok(LinkKind::PointerFile)
        }
    }
}

#[cfg(unix)]
fn make_symlink(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn make_symlink(source: &Path, target: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(source, target)
}

#[cfg(not(any(unix, windows)))]
fn make_symlink(_source: &Path, _target: &Path) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "symlinks unsupported"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn names_follow_tag_and_stage() {
        assert_eq!(link_name("replica_03", Stage::Prod), "replica_03_prod");
    }

    #[test]
    fn second_call_leaves_existing_link_alone() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("replica_01").join("prod");
        std::fs::create_dir_all(&source).unwrap();
        let target = tmp.path().join("replica_01_prod");

        assert_eq!(link_once(&source, &target).unwrap(), LinkKind::Symlink);
        assert_eq!(std::fs::read_link(&target).unwrap(), source);
        assert_eq!(link_once(&source, &target).unwrap(), LinkKind::Existing);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_counts_as_taken() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("gone");
        let target = tmp.path().join("replica_01_preprod");
        std::os::unix::fs::symlink(&gone, &target).unwrap();
        assert_eq!(link_once(&gone, &target).unwrap(), LinkKind::Existing);
    }

    fn refuse(_source: &Path, _target: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "links not permitted"))
    }

    #[test]
    fn refused_link_falls_back_to_pointer_file_once() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("replica_02").join("preprod");
        std::fs::create_dir_all(&source).unwrap();
        let target = tmp.path().join("replica_02_preprod");

        assert_eq!(
            link_once_with(&source, &target, refuse).unwrap(),
            LinkKind::PointerFile
        );
        assert!(std::fs::symlink_metadata(&target).unwrap().file_type().is_file());
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            source.to_string_lossy()
        );

        std::fs::write(source.join("md.out"), "new frames").unwrap();
        assert_eq!(
            link_once_with(&source, &target, refuse).unwrap(),
            LinkKind::Existing
        );
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            source.to_string_lossy()
        );
    }

    #[test]
    fn pointer_file_write_failure_is_local_error() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("replica_01").join("prod");
        let target = tmp.path().join("missing_dir").join("replica_01_prod");
        let err = link_once_with(&source, &target, refuse).unwrap_err();
        assert!(matches!(err, AppError::Local(_)));
    }
}
