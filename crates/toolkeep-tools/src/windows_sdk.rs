use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::context::{ToolContext, WINDOWS_SDK_DIR_ENV};
use crate::error::{Result, ToolError};
use crate::handle::ToolHandle;
use crate::host::HostOs;
use crate::probe::executable_ready;
use crate::version::{scan_versions, MajorMinor, SdkVersion};

pub const TOOL_NAME: &str = "Windows SDK";
pub const SDK_VERSION: MajorMinor = MajorMinor {
    major: 10,
    minor: 0,
};
pub const DEFAULT_SDK_ROOT: &str = r"C:\Program Files (x86)\Windows Kits\10";

const SIGNTOOL: &str = "signtool.exe";
const INSTALL_URL: &str = "https://developer.microsoft.com/windows/downloads/windows-sdk/";

/// An installed Windows 10 SDK; several builds can sit side by side under
/// `<root>/bin/<version>/<arch>`.
#[derive(Clone, Debug)]
pub struct WindowsSdk {
    handle: ToolHandle,
    version: SdkVersion,
    arch: &'static str,
}

impl WindowsSdk {
    /// Finds the newest installed build that ships `signtool.exe` for the
    /// host architecture. The SDK cannot be downloaded; a missing SDK is
    /// reported with install guidance.
    pub fn verify(ctx: &ToolContext<'_>) -> Result<Self> {
        if ctx.host.os != HostOs::Windows {
            return Err(ToolError::UnsupportedHost {
                tool: TOOL_NAME.to_string(),
                host: ctx.host.to_string(),
            });
        }
        let arch = arch_dir(&ctx.host.arch).ok_or_else(|| ToolError::UnsupportedHost {
            tool: TOOL_NAME.to_string(),
            host: ctx.host.to_string(),
        })?;

        for root in candidate_roots(ctx) {
            if let Some(sdk) = Self::at_root(&root, arch, &ctx.host.os)? {
                info!("Using {} {} at {}", TOOL_NAME, sdk.version, root.display());
                return Ok(sdk);
            }
            debug!(
                "No usable {} {}.* under {}",
                TOOL_NAME,
                SDK_VERSION,
                root.display()
            );
        }

        Err(ToolError::missing(
            TOOL_NAME,
            format!(
                "Install the Windows {SDK_VERSION} SDK from {INSTALL_URL}, or set {WINDOWS_SDK_DIR_ENV} to an existing install."
            ),
        ))
    }

    fn at_root(root: &Path, arch: &'static str, os: &HostOs) -> Result<Option<Self>> {
        for version in versions_from_bin(root, arch) {
            let version_path = root.join("bin").join(version.to_string());
            let signtool = version_path.join(arch).join(SIGNTOOL);
            if !executable_ready(&signtool, os) {
                continue;
            }
            let handle = ToolHandle::new(
                TOOL_NAME,
                os,
                root.to_path_buf(),
                signtool,
                Some(version_path),
            )?;
            return Ok(Some(Self {
                handle,
                version,
                arch,
            }));
        }
        Ok(None)
    }

    pub fn handle(&self) -> &ToolHandle {
        &self.handle
    }

    pub fn into_handle(self) -> ToolHandle {
        self.handle
    }

    pub fn root_path(&self) -> &Path {
        self.handle.root_path()
    }

    pub fn version(&self) -> SdkVersion {
        self.version
    }

    pub fn arch(&self) -> &'static str {
        self.arch
    }

    /// Architecture-specific bin directory of the selected build.
    pub fn bin_path(&self) -> PathBuf {
        self.root_path()
            .join("bin")
            .join(self.version.to_string())
            .join(self.arch)
    }

    pub fn signtool_path(&self) -> &Path {
        self.handle.executable_path()
    }
}

/// SDK builds under `<root>/bin` that have a bin directory for `arch`,
/// newest first.
pub fn versions_from_bin(root: &Path, arch: &str) -> Vec<SdkVersion> {
    let bin = root.join("bin");
    scan_versions(&bin, SDK_VERSION)
        .into_iter()
        .filter(|version| bin.join(version.to_string()).join(arch).is_dir())
        .collect()
}

/// Name the SDK uses for a Rust target architecture.
pub fn arch_dir(arch: &str) -> Option<&'static str> {
    match arch {
        "x86_64" => Some("x64"),
        "aarch64" => Some("arm64"),
        "x86" => Some("x86"),
        _ => None,
    }
}

fn candidate_roots(ctx: &ToolContext<'_>) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(root) = ctx.env_path(WINDOWS_SDK_DIR_ENV) {
        roots.push(root);
    }
    let default_root = PathBuf::from(DEFAULT_SDK_ROOT);
    if !roots.contains(&default_root) {
        roots.push(default_root);
    }
    roots
}
