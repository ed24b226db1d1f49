//! Verification and acquisition of the external SDKs and packaging tools an
//! app-packaging workflow shells out to.
//!
//! Every `verify` call probes the filesystem first and only downloads,
//! unpacks, repairs and licenses a tool when it is missing and installation
//! is allowed. Network, archive and subprocess access go through the
//! [`Downloader`], [`Extractor`] and [`ProcessRunner`] traits carried by a
//! [`ToolContext`].

pub mod android_sdk;
pub mod context;
pub mod download;
pub mod error;
pub mod extract;
pub mod fsops;
pub mod handle;
pub mod host;
pub mod linuxdeploy;
pub mod probe;
pub mod process;
pub mod version;
pub mod windows_sdk;

pub use android_sdk::AndroidSdk;
pub use context::ToolContext;
pub use download::{DownloadError, Downloader, HttpDownloader};
pub use error::{Result, Step, ToolError};
pub use extract::{ArchiveExtractor, ExtractError, Extractor};
pub use handle::ToolHandle;
pub use host::{Host, HostOs};
pub use linuxdeploy::{AppImageRequest, DeployPlugin, LinuxDeploy};
pub use process::{CommandSpec, ProcessOutput, ProcessRunner, SystemRunner};
pub use version::{scan_versions, MajorMinor, SdkVersion};
pub use windows_sdk::WindowsSdk;
