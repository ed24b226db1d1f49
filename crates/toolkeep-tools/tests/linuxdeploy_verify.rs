#![cfg(unix)]

mod common;

use std::{ffi::OsString, path::Path};

use common::{mode, write_file, FakeDownloader, FakeExtractor, FakeRunner};
use toolkeep_tools::{
    AppImageRequest, DeployPlugin, Host, HostOs, LinuxDeploy, Step, ToolContext, ToolError,
};

const APPIMAGE_URL: &str =
    "https://github.com/linuxdeploy/linuxdeploy/releases/download/continuous/linuxdeploy-x86_64.AppImage";

fn context<'a>(
    tools: &Path,
    os: HostOs,
    downloader: &'a FakeDownloader,
    extractor: &'a FakeExtractor,
    runner: &'a FakeRunner,
) -> ToolContext<'a> {
    ToolContext::new(
        tools,
        Host::new(os, "x86_64"),
        downloader,
        extractor,
        runner,
    )
}

#[test]
fn present_tool_is_not_downloaded_again() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("linuxdeploy-x86_64.AppImage");
    write_file(&path, 0o755).unwrap();
    let (dl, ex, run) = (
        FakeDownloader::default(),
        FakeExtractor::default(),
        FakeRunner::default(),
    );
    let ctx = context(tmp.path(), HostOs::Linux, &dl, &ex, &run);

    let tool = LinuxDeploy::verify(&ctx, true).unwrap();

    assert_eq!(tool.executable_path(), path);
    assert!(dl.calls.borrow().is_empty());
}

#[test]
fn missing_tool_is_downloaded_and_made_executable() {
    let tmp = tempfile::tempdir().unwrap();
    let (dl, ex, run) = (
        FakeDownloader::default(),
        FakeExtractor::default(),
        FakeRunner::default(),
    );
    let ctx = context(tmp.path(), HostOs::Linux, &dl, &ex, &run);

    let tool = LinuxDeploy::verify(&ctx, true).unwrap();

    assert_eq!(dl.urls(), vec![APPIMAGE_URL.to_string()]);
    assert_eq!(
        tool.executable_path(),
        tmp.path().join("linuxdeploy-x86_64.AppImage")
    );
    assert_eq!(mode(tool.executable_path()), 0o755);
    assert!(ex.calls.borrow().is_empty());
}

#[test]
fn missing_tool_without_install_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let (dl, ex, run) = (
        FakeDownloader::default(),
        FakeExtractor::default(),
        FakeRunner::default(),
    );
    let ctx = context(tmp.path(), HostOs::Linux, &dl, &ex, &run);

    let err = LinuxDeploy::verify(&ctx, false).unwrap_err();

    assert!(matches!(err, ToolError::MissingTool { .. }), "{err}");
    assert!(dl.calls.borrow().is_empty());
}

#[test]
fn non_linux_hosts_never_download() {
    let tmp = tempfile::tempdir().unwrap();
    let (dl, ex, run) = (
        FakeDownloader::default(),
        FakeExtractor::default(),
        FakeRunner::default(),
    );
    for os in [HostOs::Darwin, HostOs::Windows] {
        let ctx = context(tmp.path(), os, &dl, &ex, &run);
        let err = LinuxDeploy::verify(&ctx, true).unwrap_err();
        assert!(matches!(err, ToolError::UnsupportedHost { .. }), "{err}");
    }
    assert!(dl.calls.borrow().is_empty());
}

#[test]
fn failed_download_leaves_nothing_behind() {
    let tmp = tempfile::tempdir().unwrap();
    let (dl, ex, run) = (
        FakeDownloader::offline(),
        FakeExtractor::default(),
        FakeRunner::default(),
    );
    let ctx = context(tmp.path(), HostOs::Linux, &dl, &ex, &run);

    let err = LinuxDeploy::verify(&ctx, true).unwrap_err();

    assert!(matches!(err, ToolError::NetworkFailure { .. }), "{err}");
    assert!(!tmp
        .path()
        .join("linuxdeploy-x86_64.AppImage")
        .exists());
}

fn request(tmp: &Path) -> AppImageRequest {
    AppImageRequest {
        app_dir: tmp.join("build/appdir"),
        desktop_file: tmp.join("build/appdir/hello.desktop"),
        deploy_deps: vec![tmp.join("build/appdir/usr/app_packages/lib")],
        plugins: vec![DeployPlugin::parse("DEPLOY_GTK_VERSION=3 gtk").unwrap()],
        version: "1.2.3".into(),
        output_dir: tmp.join("dist"),
        output_name: "Hello_World".into(),
        base_env: vec![("PATH".into(), "/usr/bin".into())],
    }
}

#[test]
fn appimage_build_invokes_linuxdeploy_and_marks_the_output() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(&tmp.path().join("linuxdeploy-x86_64.AppImage"), 0o755)
        .unwrap();
    let (dl, ex, run) = (
        FakeDownloader::default(),
        FakeExtractor::default(),
        FakeRunner::default(),
    );
    let ctx = context(tmp.path(), HostOs::Linux, &dl, &ex, &run);
    let tool = LinuxDeploy::verify(&ctx, false).unwrap();
    let request = request(tmp.path());
    let output = tmp.path().join("dist/Hello_World-1.2.3-x86_64.AppImage");
    write_file(&output, 0o644).unwrap();

    let appimage = tool.build_appimage(&ctx, &request).unwrap();

    assert_eq!(appimage, output);
    assert_eq!(mode(&appimage), 0o755);

    let calls = run.calls.borrow();
    assert_eq!(calls.len(), 1);
    let spec = &calls[0];
    assert_eq!(spec.program, tool.executable_path());
    let appdir = tmp.path().join("build/appdir");
    let expected: Vec<OsString> = vec![
        "--appimage-extract-and-run".into(),
        format!("--appdir={}", appdir.display()).into(),
        "-d".into(),
        appdir.join("hello.desktop").into(),
        "-o".into(),
        "appimage".into(),
        "--deploy-deps-only".into(),
        appdir.join("usr/app_packages/lib").into(),
        "--plugin".into(),
        "gtk".into(),
    ];
    assert_eq!(spec.args, expected);
    assert_eq!(
        spec.cwd.as_deref(),
        Some(tmp.path().join("dist").as_path())
    );
    assert!(spec.env.contains(&("VERSION".to_string(), "1.2.3".into())));
    assert!(spec
        .env
        .contains(&("DEPLOY_GTK_VERSION".to_string(), "3".into())));
    assert!(spec.env.contains(&("PATH".to_string(), "/usr/bin".into())));
}

#[test]
fn failed_appimage_build_is_a_deploy_error() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(&tmp.path().join("linuxdeploy-x86_64.AppImage"), 0o755)
        .unwrap();
    let (dl, ex, run) = (
        FakeDownloader::default(),
        FakeExtractor::default(),
        FakeRunner::failing(2),
    );
    let ctx = context(tmp.path(), HostOs::Linux, &dl, &ex, &run);
    let tool = LinuxDeploy::verify(&ctx, false).unwrap();

    let err = tool.build_appimage(&ctx, &request(tmp.path())).unwrap_err();

    assert_eq!(err.step(), Some(Step::Deploy), "{err}");
    assert!(!tmp.path().join("dist").exists());
}

#[test]
fn url_plugins_are_downloaded_and_put_on_path() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(&tmp.path().join("linuxdeploy-x86_64.AppImage"), 0o755)
        .unwrap();
    let (dl, ex, run) = (
        FakeDownloader::default(),
        FakeExtractor::default(),
        FakeRunner::default(),
    );
    let ctx = context(tmp.path(), HostOs::Linux, &dl, &ex, &run);
    let tool = LinuxDeploy::verify(&ctx, false).unwrap();
    let plugin_url = "https://briefcase.org/linuxdeploy-plugin-gtk.sh";
    let mut request = request(tmp.path());
    let plugin = format!("DEPLOY_GTK_VERSION=3 {plugin_url}");
    request.plugins = vec![DeployPlugin::parse(&plugin).unwrap()];
    write_file(
        &tmp.path().join("dist/Hello_World-1.2.3-x86_64.AppImage"),
        0o644,
    )
    .unwrap();

    tool.build_appimage(&ctx, &request).unwrap();

    assert_eq!(dl.urls(), vec![plugin_url.to_string()]);
    let plugin_dir = tmp.path().join("linuxdeploy_plugins/gtk");
    assert_eq!(mode(&plugin_dir.join("linuxdeploy-plugin-gtk.sh")), 0o755);

    let calls = run.calls.borrow();
    let spec = &calls[0];
    let tail: Vec<OsString> = spec.args[spec.args.len() - 2..].to_vec();
    assert_eq!(
        tail,
        vec![OsString::from("--plugin"), OsString::from("gtk")]
    );
    assert!(spec
        .env
        .contains(&("DEPLOY_GTK_VERSION".to_string(), "3".into())));
    let path = spec
        .env
        .iter()
        .rev()
        .find(|(key, _)| key == "PATH")
        .map(|(_, value)| value.clone())
        .unwrap();
    assert_eq!(
        std::env::split_paths(&path).collect::<Vec<_>>(),
        vec![plugin_dir, "/usr/bin".into()]
    );
}
