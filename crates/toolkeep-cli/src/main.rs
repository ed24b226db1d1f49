use std::path::PathBuf;

use clap::{Parser, Subcommand};
use toolkeep_tools::{
    scan_versions, AndroidSdk, ArchiveExtractor, HttpDownloader, LinuxDeploy, MajorMinor,
    SystemRunner, ToolContext, ToolHandle, WindowsSdk,
};

#[derive(Parser)]
#[command(
    name = "toolkeep",
    version,
    about = "Verify and install packaging SDKs and tools"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Verify a tool, installing it when missing
    Verify {
        #[command(subcommand)]
        tool: VerifyCmd,
    },
    /// List the SDK versions installed under an SDK's bin directory
    SdkVersions {
        /// Directory holding version-named folders (e.g. `<Windows Kits>/10/bin`)
        bin_root: PathBuf,
        #[arg(long, default_value = "10.0")]
        require: MajorMinor,
    },
}

#[derive(Subcommand)]
enum VerifyCmd {
    /// Android SDK command-line tools
    AndroidSdk {
        #[arg(long)]
        no_install: bool,
        #[arg(long)]
        json: bool,
    },
    /// linuxdeploy AppImage tool (Linux only)
    Linuxdeploy {
        #[arg(long)]
        no_install: bool,
        #[arg(long)]
        json: bool,
    },
    /// Windows 10 SDK (Windows only; never downloaded)
    WindowsSdk {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    toolkeep_util::init_tracing()?;
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Verify { tool } => {
            let downloader = HttpDownloader::from_env()?;
            let extractor = ArchiveExtractor;
            let runner = SystemRunner;
            let ctx = ToolContext::from_env(&downloader, &extractor, &runner);

            match tool {
                VerifyCmd::AndroidSdk { no_install, json } => {
                    let sdk = AndroidSdk::verify(&ctx, install_allowed(no_install))?;
                    print_handle(sdk.handle(), json)?;
                }
                VerifyCmd::Linuxdeploy { no_install, json } => {
                    let tool = LinuxDeploy::verify(&ctx, install_allowed(no_install))?;
                    print_handle(tool.handle(), json)?;
                }
                VerifyCmd::WindowsSdk { json } => {
                    let sdk = WindowsSdk::verify(&ctx)?;
                    print_handle(sdk.handle(), json)?;
                }
            }
        }
        Cmd::SdkVersions { bin_root, require } => {
            for version in scan_versions(&bin_root, require) {
                println!("{version}");
            }
        }
    }

    Ok(())
}

fn install_allowed(no_install: bool) -> bool {
    !no_install && toolkeep_util::install_allowed()
}

fn print_handle(handle: &ToolHandle, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(handle)?);
        return Ok(());
    }
    let active = handle
        .active_version_path()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    println!(
        "{}\t{}\t{}\t{}",
        handle.tool(),
        handle.root_path().display(),
        handle.executable_path().display(),
        active
    );
    Ok(())
}
