//! The linuxdeploy AppImage tool and the deploy invocation that uses it.

use std::{
    collections::BTreeSet,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use tracing::info;
use walkdir::WalkDir;

use crate::context::ToolContext;
use crate::download::cache_file_name;
use crate::error::{Result, Step, ToolError};
use crate::fsops;
use crate::handle::ToolHandle;
use crate::host::HostOs;
use crate::probe::executable_ready;
use crate::process::CommandSpec;

pub const TOOL_NAME: &str = "linuxdeploy";

const RELEASE_BASE_URL: &str =
    "https://github.com/linuxdeploy/linuxdeploy/releases/download/continuous";

#[derive(Clone, Debug)]
pub struct LinuxDeploy {
    handle: ToolHandle,
    arch: String,
}

/// Where a linuxdeploy plugin comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PluginSource {
    /// Shipped with linuxdeploy itself (`gtk`, `qt`).
    Builtin,
    /// A `linuxdeploy-plugin-<name>.sh` script to download.
    Url(String),
    /// A `linuxdeploy-plugin-<name>.sh` script on disk.
    File(PathBuf),
}

/// A linuxdeploy plugin, optionally configured through environment
/// variables (`DEPLOY_GTK_VERSION=3 gtk`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployPlugin {
    pub name: String,
    pub source: PluginSource,
    pub env: Vec<(String, String)>,
}

impl DeployPlugin {
    pub fn parse(spec: &str) -> Option<Self> {
        let mut tokens: Vec<&str> = spec.split_whitespace().collect();
        let location = tokens.pop()?;
        if location.contains('=') {
            return None;
        }
        let mut env = Vec::new();
        for token in tokens {
            let (key, value) = token.split_once('=')?;
            if key.is_empty() {
                return None;
            }
            env.push((key.to_string(), value.to_string()));
        }

        let (name, source) = if location.starts_with("https://")
            || location.starts_with("http://")
        {
            let name = plugin_name(&cache_file_name(location))?;
            (name, PluginSource::Url(location.to_string()))
        } else if location.contains('/') || location.ends_with(".sh") {
            let path = PathBuf::from(location);
            let name = plugin_name(path.file_name()?.to_str()?)?;
            (name, PluginSource::File(path))
        } else {
            (location.to_string(), PluginSource::Builtin)
        };
        Some(Self { name, source, env })
    }

    /// File name linuxdeploy looks for on `PATH`.
    pub fn file_name(&self) -> String {
        format!("{PLUGIN_PREFIX}{}.sh", self.name)
    }
}

const PLUGIN_PREFIX: &str = "linuxdeploy-plugin-";
const PLUGINS_DIR: &str = "linuxdeploy_plugins";

fn plugin_name(file_name: &str) -> Option<String> {
    let name = file_name.strip_prefix(PLUGIN_PREFIX)?.strip_suffix(".sh")?;
    (!name.is_empty()).then(|| name.to_string())
}

#[derive(Clone, Debug, Default)]
pub struct AppImageRequest {
    pub app_dir: PathBuf,
    pub desktop_file: PathBuf,
    /// Directories whose shared libraries need their dependencies bundled.
    pub deploy_deps: Vec<PathBuf>,
    pub plugins: Vec<DeployPlugin>,
    pub version: String,
    /// Working directory; linuxdeploy writes the AppImage here.
    pub output_dir: PathBuf,
    pub output_name: String,
    pub base_env: Vec<(String, OsString)>,
}

impl LinuxDeploy {
    pub fn file_name(arch: &str) -> String {
        format!("linuxdeploy-{arch}.AppImage")
    }

    pub fn download_url(arch: &str) -> String {
        format!("{RELEASE_BASE_URL}/{}", Self::file_name(arch))
    }

    pub fn file_path(ctx: &ToolContext<'_>) -> PathBuf {
        ctx.tools_path().join(Self::file_name(&ctx.host.arch))
    }

    pub fn verify(ctx: &ToolContext<'_>, install: bool) -> Result<Self> {
        let os = &ctx.host.os;
        if *os != HostOs::Linux {
            return Err(ToolError::UnsupportedHost {
                tool: TOOL_NAME.to_string(),
                host: ctx.host.to_string(),
            });
        }

        let path = Self::file_path(ctx);
        if !executable_ready(&path, os) {
            if !install {
                return Err(ToolError::missing(
                    TOOL_NAME,
                    format!(
                        "Expected it at {}; allow installation to download it.",
                        path.display()
                    ),
                ));
            }
            Self::install(ctx, &path)?;
        }

        let handle = ToolHandle::new(TOOL_NAME, os, ctx.tools_path().to_path_buf(), path, None)?;
        Ok(Self {
            handle,
            arch: ctx.host.arch.clone(),
        })
    }

    fn install(ctx: &ToolContext<'_>, path: &Path) -> Result<()> {
        let url = Self::download_url(&ctx.host.arch);
        let downloaded = ctx
            .downloader
            .download(&url, ctx.tools_path())
            .map_err(|e| e.into_tool_error(TOOL_NAME, &url))?;
        if downloaded != path {
            fs::rename(&downloaded, path).map_err(|e| {
                ToolError::command(
                    TOOL_NAME,
                    Step::Download,
                    format!("failed to move {} into place: {e}", downloaded.display()),
                )
            })?;
        }
        fsops::make_executable(path).map_err(|e| {
            ToolError::command(
                TOOL_NAME,
                Step::Permissions,
                format!("failed to mark {} executable: {e}", path.display()),
            )
        })
    }

    pub fn handle(&self) -> &ToolHandle {
        &self.handle
    }

    pub fn executable_path(&self) -> &Path {
        self.handle.executable_path()
    }

    /// Where linuxdeploy will leave the AppImage for `request`.
    pub fn appimage_path(&self, request: &AppImageRequest) -> PathBuf {
        request.output_dir.join(format!(
            "{}-{}-{}.AppImage",
            request.output_name, request.version, self.arch
        ))
    }

    /// Puts every downloaded or local plugin script, marked executable,
    /// under `<tools>/linuxdeploy_plugins/<name>/` and returns those
    /// directories for `PATH`.
    pub fn prepare_plugins(
        &self,
        ctx: &ToolContext<'_>,
        plugins: &[DeployPlugin],
    ) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for plugin in plugins {
            let dir = ctx.tools_path().join(PLUGINS_DIR).join(&plugin.name);
            let dest = dir.join(plugin.file_name());
            let plugin_err =
                |message: String| ToolError::command(TOOL_NAME, Step::Deploy, message);
            match &plugin.source {
                PluginSource::Builtin => continue,
                PluginSource::Url(url) => {
                    info!("Downloading linuxdeploy {} plugin", plugin.name);
                    let downloaded = ctx
                        .downloader
                        .download(url, &dir)
                        .map_err(|e| e.into_tool_error(TOOL_NAME, url))?;
                    if downloaded != dest {
                        fs::rename(&downloaded, &dest).map_err(|e| {
                            plugin_err(format!(
                                "failed to move {}: {e}",
                                downloaded.display()
                            ))
                        })?;
                    }
                }
                PluginSource::File(path) => {
                    fs::create_dir_all(&dir).map_err(|e| {
                        plugin_err(format!("failed to create {}: {e}", dir.display()))
                    })?;
                    fs::copy(path, &dest).map_err(|e| {
                        plugin_err(format!(
                            "failed to copy plugin {}: {e}",
                            path.display()
                        ))
                    })?;
                }
            }
            fsops::make_executable(&dest).map_err(|e| {
                plugin_err(format!(
                    "failed to mark {} executable: {e}",
                    dest.display()
                ))
            })?;
            dirs.push(dir);
        }
        Ok(dirs)
    }

    /// The linuxdeploy invocation for `request`; `plugin_dirs` are put in
    /// front of the request's `PATH`.
    pub fn appimage_command(
        &self,
        request: &AppImageRequest,
        plugin_dirs: &[PathBuf],
    ) -> Result<CommandSpec> {
        let mut spec = CommandSpec::new(self.handle.executable_path())
            .arg("--appimage-extract-and-run")
            .arg(format!("--appdir={}", request.app_dir.display()))
            .arg("-d")
            .arg(request.desktop_file.as_os_str())
            .arg("-o")
            .arg("appimage");
        for dir in &request.deploy_deps {
            spec = spec.arg("--deploy-deps-only").arg(dir.as_os_str());
        }
        for plugin in &request.plugins {
            spec = spec.arg("--plugin").arg(plugin.name.as_str());
        }

        let base_path = request
            .base_env
            .iter()
            .find(|(key, _)| key == "PATH")
            .map(|(_, value)| value.clone());
        spec = spec.envs(
            request
                .base_env
                .iter()
                .filter(|(key, _)| plugin_dirs.is_empty() || key != "PATH")
                .cloned(),
        );
        if !plugin_dirs.is_empty() {
            let mut paths = plugin_dirs.to_vec();
            if let Some(base_path) = &base_path {
                paths.extend(std::env::split_paths(base_path));
            }
            let path = std::env::join_paths(paths).map_err(|e| {
                ToolError::command(
                    TOOL_NAME,
                    Step::Deploy,
                    format!("invalid plugin path: {e}"),
                )
            })?;
            spec = spec.env("PATH", path);
        }
        spec = spec.env("VERSION", request.version.as_str());
        for plugin in &request.plugins {
            spec = spec.envs(plugin.env.iter().cloned());
        }
        Ok(spec.cwd(&request.output_dir))
    }

    /// Runs linuxdeploy and returns the executable AppImage it produced.
    pub fn build_appimage(
        &self,
        ctx: &ToolContext<'_>,
        request: &AppImageRequest,
    ) -> Result<PathBuf> {
        let plugin_dirs = self.prepare_plugins(ctx, &request.plugins)?;
        let spec = self.appimage_command(request, &plugin_dirs)?;
        info!("Building AppImage with {}", TOOL_NAME);
        let output = ctx.runner.run(&spec).map_err(|e| {
            ToolError::command(
                TOOL_NAME,
                Step::Deploy,
                format!("failed to run {}: {e}", spec.display()),
            )
        })?;
        if !output.success() {
            return Err(ToolError::command(
                TOOL_NAME,
                Step::Deploy,
                format!(
                    "linuxdeploy exited with {}: {}",
                    output.exit_description(),
                    output.stderr.trim()
                ),
            ));
        }

        let appimage = self.appimage_path(request);
        fsops::make_executable(&appimage).map_err(|e| {
            ToolError::command(
                TOOL_NAME,
                Step::Deploy,
                format!("expected {}: {e}", appimage.display()),
            )
        })?;
        Ok(appimage)
    }
}

/// Directories under `roots` that directly contain shared libraries,
/// sorted and without duplicates.
pub fn shared_library_dirs(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = BTreeSet::new();
    for root in roots {
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            if !entry.file_type().is_file() || !is_shared_library(entry.path()) {
                continue;
            }
            if let Some(parent) = entry.path().parent() {
                dirs.insert(parent.to_path_buf());
            }
        }
    }
    dirs.into_iter().collect()
}

fn is_shared_library(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    name.ends_with(".so") || name.contains(".so.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_specs_split_env_from_name() {
        assert_eq!(
            DeployPlugin::parse("gtk"),
            Some(DeployPlugin {
                name: "gtk".into(),
                source: PluginSource::Builtin,
                env: vec![]
            })
        );
        assert_eq!(
            DeployPlugin::parse("DEPLOY_GTK_VERSION=3 gtk"),
            Some(DeployPlugin {
                name: "gtk".into(),
                source: PluginSource::Builtin,
                env: vec![("DEPLOY_GTK_VERSION".into(), "3".into())]
            })
        );
        assert_eq!(DeployPlugin::parse(""), None);
        assert_eq!(DeployPlugin::parse("FOO=1"), None);
        assert_eq!(DeployPlugin::parse("broken gtk"), None);
    }

    #[test]
    fn url_plugins_are_named_after_their_script() {
        let spec = "DEPLOY_GTK_VERSION=3 https://briefcase.org/linuxdeploy-plugin-gtk.sh";
        let plugin = DeployPlugin::parse(spec).unwrap();

        assert_eq!(plugin.name, "gtk");
        assert_eq!(
            plugin.source,
            PluginSource::Url("https://briefcase.org/linuxdeploy-plugin-gtk.sh".into())
        );
        assert_eq!(
            plugin.env,
            vec![("DEPLOY_GTK_VERSION".into(), "3".into())]
        );
        assert_eq!(plugin.file_name(), "linuxdeploy-plugin-gtk.sh");
    }

    #[test]
    fn file_plugins_are_named_after_their_script() {
        let plugin = DeployPlugin::parse("/opt/plugins/linuxdeploy-plugin-qt.sh")
            .unwrap();
        assert_eq!(plugin.name, "qt");
        assert_eq!(
            plugin.source,
            PluginSource::File(PathBuf::from("/opt/plugins/linuxdeploy-plugin-qt.sh"))
        );

        assert_eq!(DeployPlugin::parse("https://example.com/random.sh"), None);
        assert_eq!(DeployPlugin::parse("./linuxdeploy-plugin-.sh"), None);
    }

    #[test]
    fn release_url_is_per_arch() {
        assert_eq!(
            LinuxDeploy::download_url("x86_64"),
            "https://github.com/linuxdeploy/linuxdeploy/releases/download/continuous/linuxdeploy-x86_64.AppImage"
        );
    }

    #[test]
    fn finds_directories_holding_shared_libraries() {
        let tmp = tempfile::tempdir().unwrap();
        let app = tmp.path().join("usr/app");
        let packages = tmp.path().join("usr/app_packages");
        for (dir, file) in [
            (app.join("support"), "support.so"),
            (packages.join("firstlib"), "first.so"),
            (packages.join("secondlib"), "second_a.so"),
            (packages.join("secondlib"), "second_b.so.1"),
            (packages.join("pure"), "module.py"),
        ] {
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(file), b"").unwrap();
        }

        assert_eq!(
            shared_library_dirs(&[app.clone(), packages.clone()]),
            vec![
                app.join("support"),
                packages.join("firstlib"),
                packages.join("secondlib"),
            ]
        );
    }
}
