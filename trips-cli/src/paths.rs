//! Filesystem helpers built on `cap-std` and `camino`.

use std::{io, path::MAIN_SEPARATOR_STR};

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

use crate::CliError;

/// Ensure the parent directory for `path` exists.
pub(crate) fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent == Utf8Path::new(MAIN_SEPARATOR_STR) {
        return Ok(());
    }
    let (base_dir, relative) = base_dir_and_relative(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base_dir.create_dir_all(&relative)
}

/// Fail unless `path` names an existing regular file.
pub(crate) fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::other("path should include a file name"))?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.metadata(name).map(|meta| meta.is_file())
}

/// Split a parent path into an ambient base directory and the relative rest,
/// since `cap-std` directories only accept relative paths.
fn base_dir_and_relative(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let (base, relative) = match parent.components().next() {
        Some(Utf8Component::Prefix(prefix)) => {
            let base = Utf8PathBuf::from(prefix.as_str()).join(MAIN_SEPARATOR_STR);
            let relative = parent
                .strip_prefix(&base)
                .or_else(|_| parent.strip_prefix(prefix.as_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from parent path"))?
                .to_path_buf();
            (base, relative)
        }
        Some(Utf8Component::RootDir) => {
            let base = Utf8PathBuf::from(MAIN_SEPARATOR_STR);
            let relative = parent
                .strip_prefix(&base)
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), parent.to_path_buf()),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((dir, relative))
}
