use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, Step, ToolError};
use crate::host::HostOs;
use crate::probe::executable_ready;

/// Resolved location of a verified tool.
///
/// Only constructed once the executable has been checked, so holders can
/// invoke `executable_path` directly. A fresh handle is produced by every
/// verification call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolHandle {
    tool: String,
    root_path: PathBuf,
    executable_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    active_version_path: Option<PathBuf>,
}

impl ToolHandle {
    pub fn new(
        tool: &str,
        os: &HostOs,
        root_path: PathBuf,
        executable_path: PathBuf,
        active_version_path: Option<PathBuf>,
    ) -> Result<Self> {
        if !executable_ready(&executable_path, os) {
            return Err(ToolError::command(
                tool,
                Step::Permissions,
                format!(
                    "{} is missing or is not executable",
                    executable_path.display()
                ),
            ));
        }
        Ok(Self {
            tool: tool.to_string(),
            root_path,
            executable_path,
            active_version_path,
        })
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn executable_path(&self) -> &Path {
        &self.executable_path
    }

    pub fn active_version_path(&self) -> Option<&Path> {
        self.active_version_path.as_deref()
    }
}
