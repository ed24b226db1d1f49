use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive could not be read; usually a truncated or corrupt download.
    #[error("cannot read archive {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("unsupported archive format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Unpacks an archive into a destination directory.
pub trait Extractor {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<(), ExtractError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ArchiveKind {
    Zip,
    TarGz,
    TarXz,
}

impl ArchiveKind {
    fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(ArchiveKind::TarXz)
        } else {
            None
        }
    }
}

/// Zip archives are read in-process; tarballs go through the system `tar`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchiveExtractor;

impl Extractor for ArchiveExtractor {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<(), ExtractError> {
        let kind = ArchiveKind::detect(archive)
            .ok_or_else(|| ExtractError::UnsupportedFormat(archive.to_path_buf()))?;
        fs::create_dir_all(dest).map_err(|source| ExtractError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        info!(
            "Extracting archive {} into {}",
            archive.display(),
            dest.display()
        );
        match kind {
            ArchiveKind::Zip => unpack_zip(archive, dest),
            ArchiveKind::TarGz => unpack_tar(archive, dest, "-xzf"),
            ArchiveKind::TarXz => unpack_tar(archive, dest, "-xJf"),
        }
    }
}

fn unpack_zip(archive: &Path, dest: &Path) -> Result<(), ExtractError> {
    let read_err = |message: String| ExtractError::Read {
        path: archive.to_path_buf(),
        message,
    };
    let file = fs::File::open(archive).map_err(|e| read_err(e.to_string()))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| read_err(e.to_string()))?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| read_err(e.to_string()))?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(read_err(format!("unsafe entry path '{}'", entry.name())));
        };
        let outpath = dest.join(relative);
        let io_err = |source: io::Error| ExtractError::Io {
            path: outpath.clone(),
            source,
        };

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(io_err)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut out = fs::File::create(&outpath).map_err(io_err)?;
        copy_entry(&mut entry, &mut out, read_err, io_err)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&outpath, fs::Permissions::from_mode(mode & 0o777))
                .map_err(io_err)?;
        }
    }
    Ok(())
}

/// Copies one archive entry, keeping failures to read the archive apart
/// from failures to write the destination.
fn copy_entry(
    entry: &mut impl Read,
    out: &mut impl Write,
    read_err: impl Fn(String) -> ExtractError,
    io_err: impl Fn(io::Error) -> ExtractError,
) -> Result<(), ExtractError> {
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = match entry.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_err(e.to_string())),
        };
        out.write_all(&buf[..n]).map_err(&io_err)?;
    }
}

fn unpack_tar(archive: &Path, dest: &Path, mode_flag: &str) -> Result<(), ExtractError> {
    let output = Command::new("tar")
        .arg(mode_flag)
        .arg(archive)
        .arg("-C")
        .arg(dest)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| ExtractError::Io {
            path: dest.to_path_buf(),
            source,
        })?;

    if !output.status.success() {
        return Err(ExtractError::Read {
            path: archive.to_path_buf(),
            message: format!(
                "tar failed: {}\n{}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}
