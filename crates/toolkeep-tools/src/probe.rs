use std::{fs, path::Path};

use crate::fsops::is_executable;
use crate::host::HostOs;

/// True when `path` is a regular file that the host would let us run.
///
/// Symlinks are followed. On hosts without an executable permission bit
/// presence alone is enough. The answer can go stale as soon as it is
/// returned; callers do not re-check before use.
pub fn executable_ready(path: &Path, os: &HostOs) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    !os.has_exec_bit() || is_executable(&meta)
}
