use std::{path::PathBuf, time::Duration};

pub const DATA_DIR_ENV: &str = "TOOLKEEP_DATA_DIR";
pub const TOOLS_DIR_ENV: &str = "TOOLKEEP_TOOLS_DIR";
pub const HTTP_TIMEOUT_ENV: &str = "TOOLKEEP_HTTP_TIMEOUT_SECS";
pub const HTTP_CONNECT_TIMEOUT_ENV: &str = "TOOLKEEP_HTTP_CONNECT_TIMEOUT_SECS";
/// When truthy, missing tools are reported instead of installed.
pub const NO_INSTALL_ENV: &str = "TOOLKEEP_NO_INSTALL";

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 30;

pub fn data_dir() -> PathBuf {
    if let Some(dir) = env_path(DATA_DIR_ENV) {
        return dir;
    }
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".local/share/toolkeep")
    } else {
        PathBuf::from("/tmp/toolkeep")
    }
}

/// Directory holding every managed tool and the download cache.
pub fn tools_dir() -> PathBuf {
    env_path(TOOLS_DIR_ENV)
        .unwrap_or_else(|| data_dir().join("tools"))
}

pub fn expand_user(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            let rest = path.strip_prefix("~/").unwrap_or("");
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Reads a path-valued variable; empty values count as unset.
pub fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(|value| expand_user(&value))
}

pub fn env_flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(value) => parse_flag(&value),
        Err(_) => false,
    }
}

pub fn env_duration_secs(name: &str, default_secs: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|value| parse_secs(&value))
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

/// Whether verification may download and install missing tools.
pub fn install_allowed() -> bool {
    !env_flag(NO_INSTALL_ENV)
}

pub fn http_timeout() -> Duration {
    env_duration_secs(HTTP_TIMEOUT_ENV, DEFAULT_HTTP_TIMEOUT_SECS)
}

pub fn http_connect_timeout() -> Duration {
    env_duration_secs(HTTP_CONNECT_TIMEOUT_ENV, DEFAULT_HTTP_CONNECT_TIMEOUT_SECS)
}

pub fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_secs(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|secs| *secs > 0)
}
