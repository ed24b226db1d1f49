//! Android SDK command-line tools: verification, acquisition, licensing.
//!
//! Layout of a managed install:
//!
//! ```text
//! <root>/cmdline-tools/<build>/bin/sdkmanager[.bat]
//! <root>/cmdline-tools/latest -> <build>
//! <root>/licenses/android-sdk-license
//! ```

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::context::{ToolContext, ANDROID_SDK_ROOT_ENV, JAVA_HOME_ENV};
use crate::error::{Result, Step, ToolError};
use crate::fsops;
use crate::handle::ToolHandle;
use crate::host::HostOs;
use crate::probe::executable_ready;
use crate::process::CommandSpec;

pub const TOOL_NAME: &str = "Android SDK";
pub const CMDLINE_TOOLS_VERSION: &str = "8092744";
pub const LICENSE_ID: &str = "android-sdk-license";

const MANAGED_DIR: &str = "android_sdk";
const CMDLINE_TOOLS_DIR: &str = "cmdline-tools";
const ALIAS_NAME: &str = "latest";
// Pre-restructure installs kept sdkmanager under a flat `tools/` and
// shipped their own `emulator/`.
const LEGACY_DIRS: &[&str] = &["tools", "emulator"];
// sdkmanager asks once per unaccepted license.
const LICENSE_PROMPTS: usize = 32;

#[derive(Clone, Debug)]
pub struct AndroidSdk {
    handle: ToolHandle,
    os: HostOs,
    java_home: Option<PathBuf>,
}

impl AndroidSdk {
    /// Resolves a usable SDK, installing the command-line tools into the
    /// managed root when `install` is set.
    pub fn verify(ctx: &ToolContext<'_>, install: bool) -> Result<Self> {
        let os = &ctx.host.os;

        if let Some(root) = ctx.env_path(ANDROID_SDK_ROOT_ENV) {
            if Self::is_installed(&root, os) {
                info!("Using Android SDK at {}", root.display());
                return Self::at_root(ctx, root);
            }
            debug!(
                "Ignoring {}={}: no usable sdkmanager found there",
                ANDROID_SDK_ROOT_ENV,
                root.display()
            );
        }

        let root = Self::managed_root(ctx);
        if Self::is_installed(&root, os) {
            let sdk = Self::at_root(ctx, root)?;
            sdk.verify_license(ctx)?;
            return Ok(sdk);
        }

        if !install {
            return Err(ToolError::missing(
                TOOL_NAME,
                format!(
                    "No SDK found at {}; allow installation, or set {} to an existing SDK.",
                    root.display(),
                    ANDROID_SDK_ROOT_ENV
                ),
            ));
        }

        install_cmdline_tools(ctx, &root)?;
        let sdk = Self::at_root(ctx, root)?;
        sdk.verify_license(ctx)?;
        Ok(sdk)
    }

    pub fn managed_root(ctx: &ToolContext<'_>) -> PathBuf {
        ctx.tools_path().join(MANAGED_DIR)
    }

    pub fn download_url(os: &HostOs) -> String {
        let platform = match os {
            HostOs::Darwin => "mac",
            HostOs::Windows => "win",
            HostOs::Linux => "linux",
            HostOs::Other(_) => "unknown",
        };
        format!(
            "https://dl.google.com/android/repository/commandlinetools-{platform}-{CMDLINE_TOOLS_VERSION}_latest.zip"
        )
    }

    pub fn is_installed(root: &Path, os: &HostOs) -> bool {
        executable_ready(&sdkmanager_in(root, os), os)
    }

    fn at_root(ctx: &ToolContext<'_>, root: PathBuf) -> Result<Self> {
        let os = ctx.host.os.clone();
        let version_path = resolve_alias(&alias_path(&root));
        let handle = ToolHandle::new(
            TOOL_NAME,
            &os,
            root.clone(),
            sdkmanager_in(&root, &os),
            Some(version_path),
        )?;
        Ok(Self {
            handle,
            os,
            java_home: ctx.env_path(JAVA_HOME_ENV),
        })
    }

    fn verify_license(&self, ctx: &ToolContext<'_>) -> Result<()> {
        let marker = self.license_path();
        if marker.exists() {
            return Ok(());
        }

        info!("Accepting Android SDK licenses");
        let spec = CommandSpec::new(self.sdkmanager_path())
            .arg("--licenses")
            .envs(self.env())
            .stdin("y\n".repeat(LICENSE_PROMPTS));
        let output = ctx.runner.run(&spec).map_err(|e| {
            ToolError::command(
                TOOL_NAME,
                Step::License,
                format!("failed to run {}: {e}", spec.display()),
            )
        })?;
        if !output.success() {
            return Err(ToolError::command(
                TOOL_NAME,
                Step::License,
                format!(
                    "sdkmanager --licenses exited with {}: {}",
                    output.exit_description(),
                    output.stderr.trim()
                ),
            ));
        }
        if !marker.exists() {
            return Err(ToolError::command(
                TOOL_NAME,
                Step::License,
                format!("{LICENSE_ID} was not accepted"),
            ));
        }
        Ok(())
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

    /// The `latest` alias directory.
    pub fn cmdline_tools_path(&self) -> PathBuf {
        alias_path(self.root_path())
    }

    /// The directory the `latest` alias resolves to.
    pub fn cmdline_tools_version_path(&self) -> PathBuf {
        self.handle
            .active_version_path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cmdline_tools_path())
    }

    pub fn sdkmanager_path(&self) -> &Path {
        self.handle.executable_path()
    }

    pub fn avdmanager_path(&self) -> PathBuf {
        alias_path(self.root_path())
            .join("bin")
            .join(self.os.script_name("avdmanager"))
    }

    pub fn emulator_path(&self) -> PathBuf {
        let name = match self.os {
            HostOs::Windows => "emulator.exe",
            _ => "emulator",
        };
        self.root_path().join("emulator").join(name)
    }

    pub fn license_path(&self) -> PathBuf {
        license_marker(self.root_path())
    }

    /// Environment for every SDK tool invocation.
    pub fn env(&self) -> Vec<(String, OsString)> {
        let mut env = vec![(
            ANDROID_SDK_ROOT_ENV.to_string(),
            self.root_path().as_os_str().to_os_string(),
        )];
        if let Some(java_home) = &self.java_home {
            env.push((
                JAVA_HOME_ENV.to_string(),
                java_home.as_os_str().to_os_string(),
            ));
        }
        env
    }
}

fn install_cmdline_tools(ctx: &ToolContext<'_>, root: &Path) -> Result<()> {
    let url = AndroidSdk::download_url(&ctx.host.os);
    let cache_file = ctx
        .downloader
        .download(&url, ctx.tools_path())
        .map_err(|e| e.into_tool_error(TOOL_NAME, &url))?;

    let base = root.join(CMDLINE_TOOLS_DIR);
    fs::create_dir_all(&base).map_err(|e| {
        ToolError::command(
            TOOL_NAME,
            Step::Extract,
            format!("failed to create {}: {e}", base.display()),
        )
    })?;
    info!("Unpacking Android SDK command-line tools");
    ctx.extractor
        .unpack(&cache_file, &base)
        .map_err(|e| ToolError::command(TOOL_NAME, Step::Extract, e))?;

    if let Err(err) = fs::remove_file(&cache_file) {
        warn!(
            "Failed to remove downloaded archive {}: {}",
            cache_file.display(),
            err
        );
    }

    let version_path = splice_nested_payload(&base)?;

    fsops::replace_alias(&version_path, &alias_path(root)).map_err(|e| {
        ToolError::command(
            TOOL_NAME,
            Step::Alias,
            format!(
                "failed to point {ALIAS_NAME} at {}: {e}",
                version_path.display()
            ),
        )
    })?;

    if ctx.host.os.has_exec_bit() {
        let bin = version_path.join("bin");
        let marked = fsops::make_dir_executable(&bin).map_err(|e| {
            ToolError::command(
                TOOL_NAME,
                Step::Permissions,
                format!("failed to mark {} executable: {e}", bin.display()),
            )
        })?;
        debug!("Marked {} tools executable", marked.len());
    }

    remove_legacy_layout(root)
}

/// The archive wraps its payload in its own `cmdline-tools/` folder, which
/// lands at `<root>/cmdline-tools/cmdline-tools`. Move it up into the
/// build-numbered directory.
fn splice_nested_payload(base: &Path) -> Result<PathBuf> {
    let layout_err = |message: String| ToolError::command(TOOL_NAME, Step::Layout, message);

    let nested = base.join(CMDLINE_TOOLS_DIR);
    if !nested.join("bin").is_dir() {
        return Err(layout_err(format!(
            "archive did not contain {CMDLINE_TOOLS_DIR}/bin"
        )));
    }

    let version_path = base.join(CMDLINE_TOOLS_VERSION);
    fsops::remove_path(&version_path).map_err(|e| {
        layout_err(format!(
            "failed to remove stale {}: {e}",
            version_path.display()
        ))
    })?;
    fs::rename(&nested, &version_path).map_err(|e| {
        layout_err(format!(
            "failed to move {} to {}: {e}",
            nested.display(),
            version_path.display()
        ))
    })?;
    Ok(version_path)
}

fn remove_legacy_layout(root: &Path) -> Result<()> {
    if fs::symlink_metadata(root.join(LEGACY_DIRS[0])).is_err() {
        return Ok(());
    }
    info!("Removing legacy Android SDK tools");
    for dir in LEGACY_DIRS {
        let path = root.join(dir);
        fsops::remove_path(&path).map_err(|e| {
            ToolError::command(
                TOOL_NAME,
                Step::LegacyMigration,
                format!("failed to remove {}: {e}", path.display()),
            )
        })?;
    }
    Ok(())
}

fn alias_path(root: &Path) -> PathBuf {
    root.join(CMDLINE_TOOLS_DIR).join(ALIAS_NAME)
}

fn sdkmanager_in(root: &Path, os: &HostOs) -> PathBuf {
    alias_path(root)
        .join("bin")
        .join(os.script_name("sdkmanager"))
}

fn license_marker(root: &Path) -> PathBuf {
    root.join("licenses").join(LICENSE_ID)
}

/// Where an alias points; a real directory (as some IDE installs leave
/// behind) is its own version path.
fn resolve_alias(alias: &Path) -> PathBuf {
    match fs::read_link(alias) {
        Ok(target) if target.is_absolute() => target,
        Ok(target) => alias
            .parent()
            .map(|parent| parent.join(&target))
            .unwrap_or(target),
        Err(_) => alias.to_path_buf(),
    }
}
