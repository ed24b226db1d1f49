#![allow(dead_code)]

use std::{
    cell::RefCell,
    fs, io,
    path::{Path, PathBuf},
};

use toolkeep_tools::download::cache_file_name;
use toolkeep_tools::{
    CommandSpec, DownloadError, Downloader, ExtractError, Extractor, ProcessOutput, ProcessRunner,
};

/// Records every request and drops a placeholder archive into the cache.
#[derive(Default)]
pub struct FakeDownloader {
    pub calls: RefCell<Vec<(String, PathBuf)>>,
    pub offline: bool,
}

impl FakeDownloader {
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

impl Downloader for FakeDownloader {
    fn download(&self, url: &str, download_dir: &Path) -> Result<PathBuf, DownloadError> {
        self.calls
            .borrow_mut()
            .push((url.to_string(), download_dir.to_path_buf()));
        if self.offline {
            return Err(DownloadError::Connection("network unreachable".into()));
        }
        fs::create_dir_all(download_dir).map_err(|source| DownloadError::Io {
            context: "create cache dir".into(),
            source,
        })?;
        let path = download_dir.join(cache_file_name(url));
        fs::write(&path, b"archive").map_err(|source| DownloadError::Io {
            context: "write cache file".into(),
            source,
        })?;
        Ok(path)
    }
}

/// Lays out the command-line tools payload the way the real archive does,
/// with non-executable scripts.
#[derive(Default)]
pub struct FakeExtractor {
    pub calls: RefCell<Vec<(PathBuf, PathBuf)>>,
    pub corrupt: bool,
}

impl FakeExtractor {
    pub fn corrupt() -> Self {
        Self {
            corrupt: true,
            ..Self::default()
        }
    }
}

impl Extractor for FakeExtractor {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<(), ExtractError> {
        self.calls
            .borrow_mut()
            .push((archive.to_path_buf(), dest.to_path_buf()));
        if self.corrupt {
            return Err(ExtractError::Read {
                path: archive.to_path_buf(),
                message: "invalid Zip archive".into(),
            });
        }
        let bin = dest.join("cmdline-tools").join("bin");
        fs::create_dir_all(&bin).map_err(|source| ExtractError::Io {
            path: bin.clone(),
            source,
        })?;
        for name in [
            "sdkmanager",
            "avdmanager",
            "sdkmanager.bat",
            "avdmanager.bat",
        ] {
            write_file(&bin.join(name), 0o644).map_err(|source| ExtractError::Io {
                path: bin.join(name),
                source,
            })?;
        }
        Ok(())
    }
}

/// Answers every invocation; when it succeeds it also leaves the license
/// marker that `sdkmanager --licenses` would write.
#[derive(Default)]
pub struct FakeRunner {
    pub calls: RefCell<Vec<CommandSpec>>,
    pub exit_code: i32,
}

impl FakeRunner {
    pub fn failing(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<ProcessOutput> {
        self.calls.borrow_mut().push(spec.clone());
        if self.exit_code == 0 {
            if let Some((_, root)) = spec.env.iter().find(|(key, _)| key == "ANDROID_SDK_ROOT") {
                let licenses = Path::new(root).join("licenses");
                fs::create_dir_all(&licenses)?;
                fs::write(
                    licenses.join("android-sdk-license"),
                    b"\n24333f8a63b6825ea9c5514f83c2829b004d1fee",
                )?;
            }
        }
        Ok(ProcessOutput {
            code: Some(self.exit_code),
            stdout: String::new(),
            stderr: if self.exit_code == 0 {
                String::new()
            } else {
                "license agreement refused".into()
            },
        })
    }
}

pub fn write_file(path: &Path, mode: u32) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, b"#!/bin/sh\n")?;
    set_mode(path, mode)
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
pub fn mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).unwrap().permissions().mode() & 0o777
}

/// A complete managed SDK: `latest` points at a build-numbered directory
/// holding an executable sdkmanager, and licenses are accepted.
#[cfg(unix)]
pub fn install_android_sdk(root: &Path, script: &str, licensed: bool) {
    let version = root.join("cmdline-tools").join("8092744");
    write_file(&version.join("bin").join(script), 0o755).unwrap();
    std::os::unix::fs::symlink(&version, root.join("cmdline-tools").join("latest"))
        .unwrap();
    if licensed {
        let licenses = root.join("licenses");
        fs::create_dir_all(&licenses).unwrap();
        fs::write(licenses.join("android-sdk-license"), b"").unwrap();
    }
}
