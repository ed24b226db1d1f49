//! Error taxonomy for tool verification and acquisition.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

/// Pipeline step that was running when an acquisition failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Download,
    Extract,
    Layout,
    Alias,
    Permissions,
    LegacyMigration,
    License,
    Deploy,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Download => "download",
            Step::Extract => "extract",
            Step::Layout => "layout",
            Step::Alias => "alias",
            Step::Permissions => "permissions",
            Step::LegacyMigration => "legacy migration",
            Step::License => "license",
            Step::Deploy => "deploy",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ToolError {
    /// The tool is absent and installing it was not permitted.
    #[error("Unable to locate {tool}. {hint}")]
    MissingTool { tool: String, hint: String },

    #[error("Unable to {action}; is your computer offline? Try again once you have a working connection. ({message})")]
    NetworkFailure { action: String, message: String },

    #[error("Unable to download {url}; the server responded with status {status}.")]
    BadNetworkResource { url: String, status: u16 },

    /// Generic acquisition failure.
    #[error("{tool} {step} failed: {message}")]
    Command {
        tool: String,
        step: Step,
        message: String,
    },

    #[error("{tool} cannot be used on {host}.")]
    UnsupportedHost { tool: String, host: String },
}

impl ToolError {
    pub fn missing(tool: &str, hint: impl Into<String>) -> Self {
        ToolError::MissingTool {
            tool: tool.to_string(),
            hint: hint.into(),
        }
    }

    pub fn command(tool: &str, step: Step, message: impl fmt::Display) -> Self {
        ToolError::Command {
            tool: tool.to_string(),
            step,
            message: message.to_string(),
        }
    }

    /// Step reported by a generic acquisition failure.
    pub fn step(&self) -> Option<Step> {
        match self {
            ToolError::Command { step, .. } => Some(*step),
            _ => None,
        }
    }
}
