use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::download::Downloader;
use crate::extract::Extractor;
use crate::host::Host;
use crate::process::ProcessRunner;

pub const ANDROID_SDK_ROOT_ENV: &str = "ANDROID_SDK_ROOT";
pub const WINDOWS_SDK_DIR_ENV: &str = "WindowsSDKDir";
pub const JAVA_HOME_ENV: &str = "JAVA_HOME";

/// Variables snapshotted by [`ToolContext::from_env`].
pub const OVERRIDE_VARS: &[&str] = &[ANDROID_SDK_ROOT_ENV, WINDOWS_SDK_DIR_ENV, JAVA_HOME_ENV];

/// Everything a verification call may consult.
///
/// Override variables are carried explicitly so verification never reads
/// the process environment itself.
pub struct ToolContext<'a> {
    pub tools_path: PathBuf,
    pub host: Host,
    pub env: BTreeMap<String, String>,
    pub downloader: &'a dyn Downloader,
    pub extractor: &'a dyn Extractor,
    pub runner: &'a dyn ProcessRunner,
}

impl<'a> ToolContext<'a> {
    pub fn new(
        tools_path: impl Into<PathBuf>,
        host: Host,
        downloader: &'a dyn Downloader,
        extractor: &'a dyn Extractor,
        runner: &'a dyn ProcessRunner,
    ) -> Self {
        Self {
            tools_path: absolute(tools_path.into()),
            host,
            env: BTreeMap::new(),
            downloader,
            extractor,
            runner,
        }
    }

    /// Context for the current machine, with overrides read once from the
    /// process environment.
    pub fn from_env(
        downloader: &'a dyn Downloader,
        extractor: &'a dyn Extractor,
        runner: &'a dyn ProcessRunner,
    ) -> Self {
        let mut ctx = Self::new(
            toolkeep_util::tools_dir(),
            Host::current(),
            downloader,
            extractor,
            runner,
        );
        for key in OVERRIDE_VARS {
            if let Ok(value) = std::env::var(key) {
                ctx = ctx.with_env(*key, value);
            }
        }
        ctx
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Value of an override variable; blank values count as unset.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn env_path(&self, key: &str) -> Option<PathBuf> {
        self.env_var(key)
            .map(|value| absolute(toolkeep_util::expand_user(value)))
    }

    pub fn tools_path(&self) -> &Path {
        &self.tools_path
    }
}

/// Anchors a relative path at the current directory. Alias targets are
/// written as given, so a relative root would leave them dangling.
fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::path::absolute(&path).unwrap_or(path)
}
