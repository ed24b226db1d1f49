use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::error::{Step, ToolError};

#[derive(Debug, Error)]
pub enum DownloadError {
    /// The transport failed before a complete response arrived.
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("server responded with status {status}")]
    Status { status: u16 },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl DownloadError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        DownloadError::Io {
            context: context.into(),
            source,
        }
    }

    /// Translates a collaborator failure into the pipeline's taxonomy.
    pub fn into_tool_error(self, tool: &str, url: &str) -> ToolError {
        match self {
            DownloadError::Connection(message) => ToolError::NetworkFailure {
                action: format!("download {tool}"),
                message,
            },
            DownloadError::Status { status } => ToolError::BadNetworkResource {
                url: url.to_string(),
                status,
            },
            err @ DownloadError::Io { .. } => ToolError::command(tool, Step::Download, err),
        }
    }
}

/// Fetches a URL into a directory, returning the cached file.
pub trait Downloader {
    fn download(&self, url: &str, download_dir: &Path) -> Result<PathBuf, DownloadError>;
}

pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(concat!("toolkeep/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DownloadError::Connection(format!("failed to build http client: {e}"))
            })?;
        Ok(Self { client })
    }

    pub fn from_env() -> Result<Self, DownloadError> {
        Self::new(
            toolkeep_util::http_connect_timeout(),
            toolkeep_util::http_timeout(),
        )
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, download_dir: &Path) -> Result<PathBuf, DownloadError> {
        fs::create_dir_all(download_dir)
            .map_err(|e| DownloadError::io("failed to create download dir", e))?;
        let dest = download_dir.join(cache_file_name(url));

        info!("Downloading {}", url);
        let mut resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| DownloadError::Connection(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(DownloadError::Status {
                status: resp.status().as_u16(),
            });
        }

        let tmp = dest.with_extension(format!("tmp-{}", Uuid::new_v4()));
        let mut file = fs::File::create(&tmp)
            .map_err(|e| DownloadError::io("failed to create temp file", e))?;
        if let Err(e) = resp.copy_to(&mut file) {
            drop(file);
            let _ = fs::remove_file(&tmp);
            return Err(DownloadError::Connection(format!(
                "download read failed: {e}"
            )));
        }
        file.flush()
            .map_err(|e| DownloadError::io("failed to flush temp file", e))?;
        drop(file);

        fs::rename(&tmp, &dest).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            DownloadError::io("failed to finalize download", e)
        })?;
        info!("Saved {}", dest.display());
        Ok(dest)
    }
}

/// File name a download is cached under: the last URL path segment.
pub fn cache_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("download.bin")
        .to_string()
}
