//! Filesystem primitives shared by the tool pipelines.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

#[cfg(unix)]
const EXECUTABLE_MODE: u32 = 0o755;

#[cfg(unix)]
pub fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
pub fn is_executable(_meta: &fs::Metadata) -> bool {
    true
}

#[cfg(unix)]
pub fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(EXECUTABLE_MODE);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Marks every regular file directly inside `dir` executable.
pub fn make_dir_executable(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut touched = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() {
            make_executable(entry.path())?;
            touched.push(entry.into_path());
        }
    }
    Ok(touched)
}

/// Removes a file, directory tree, or link without following links.
/// Returns false when nothing existed at `path`.
pub fn remove_path(path: &Path) -> io::Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    let file_type = meta.file_type();
    if file_type.is_dir() && !file_type.is_symlink() {
        fs::remove_dir_all(path)?;
    } else if let Err(err) = fs::remove_file(path) {
        // Directory links and junctions on Windows need remove_dir.
        if cfg!(windows) {
            fs::remove_dir(path)?;
        } else {
            return Err(err);
        }
    }
    debug!("Removed {}", path.display());
    Ok(true)
}

pub fn is_alias(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// Points `alias` at the directory `target`, replacing whatever `alias`
/// held before.
#[cfg(unix)]
pub fn replace_alias(target: &Path, alias: &Path) -> io::Result<()> {
    let tmp = sibling_temp_path(alias);
    std::os::unix::fs::symlink(target, &tmp)?;

    // rename() can only replace a link or file, never a real directory.
    let existing_is_dir = fs::symlink_metadata(alias)
        .map(|meta| meta.file_type().is_dir())
        .unwrap_or(false);
    if existing_is_dir {
        if let Err(err) = fs::remove_dir_all(alias) {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
    }

    if let Err(err) = fs::rename(&tmp, alias) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(())
}

#[cfg(windows)]
pub fn replace_alias(target: &Path, alias: &Path) -> io::Result<()> {
    remove_path(alias)?;
    create_junction(target, alias)
}

#[cfg(not(any(unix, windows)))]
pub fn replace_alias(_target: &Path, alias: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("cannot create directory alias {}", alias.display()),
    ))
}

#[cfg(windows)]
fn create_junction(target: &Path, alias: &Path) -> io::Result<()> {
    // Directory symlinks need developer mode; junctions do not.
    if std::os::windows::fs::symlink_dir(target, alias).is_ok() {
        return Ok(());
    }
    let output = std::process::Command::new("cmd")
        .arg("/C")
        .arg("mklink")
        .arg("/J")
        .arg(alias)
        .arg(target)
        .output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!(
            "mklink /J failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

#[cfg_attr(not(unix), allow(dead_code))]
fn sibling_temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "alias".to_string());
    path.with_file_name(format!(".{name}.tmp-{}", Uuid::new_v4()))
}
