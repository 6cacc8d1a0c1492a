//! Claude Desktop detection.
use crate::settings::{InstallContext, Os};
use crate::ui::{Tone, Ui};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

const DOWNLOAD_URL: &str = "https://claude.ai/download";

/// Install locations to probe, in order.
pub(super) fn candidate_paths(os: Os, home: &Path) -> Vec<PathBuf> {
    match os {
        Os::MacOS => vec![PathBuf::from("/Applications/Claude.app")],
        Os::Windows => vec![
            home.join("AppData").join("Local").join("Claude").join("Claude.exe"),
            PathBuf::from(r"C:\Program Files\Claude\Claude.exe"),
            PathBuf::from(r"C:\Program Files (x86)\Claude\Claude.exe"),
        ],
        Os::Linux => vec![
            PathBuf::from("/usr/local/bin/claude"),
            PathBuf::from("/usr/bin/claude"),
            home.join(".local").join("bin").join("claude"),
        ],
    }
}

pub(super) fn find_host_app(os: Os, home: &Path) -> Option<PathBuf> {
    candidate_paths(os, home)
        .into_iter()
        .find(|path| path.exists())
}

pub(super) fn ensure_host_app(ctx: &InstallContext, ui: &dyn Ui) -> Result<PathBuf> {
    ui.say(Tone::Detail, "Checking for Claude Desktop...");
    match find_host_app(ctx.os, &ctx.home) {
        Some(path) => {
            ui.say(Tone::Info, "Found Claude Desktop");
            Ok(path)
        }
        None => {
            ui.say(Tone::Warn, "Claude Desktop not detected.");
            ui.say(Tone::Info, "Please install Claude Desktop before continuing.");
            ui.say(Tone::Info, &format!("Download from: {DOWNLOAD_URL}"));
            Err(anyhow!("Claude Desktop not found"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn macos_probes_the_app_bundle_only() {
        let paths = candidate_paths(Os::MacOS, Path::new("/Users/u"));
        assert_eq!(paths, vec![PathBuf::from("/Applications/Claude.app")]);
    }

    #[test]
    fn windows_prefers_the_per_user_install() {
        let paths = candidate_paths(Os::Windows, Path::new("/home/u"));
        assert_eq!(paths.len(), 3);
        assert!(paths[0].starts_with("/home/u"));
        assert!(paths[0].ends_with("Claude.exe"));
    }

    #[test]
    fn linux_finds_user_local_binary() {
        let home = tempfile::tempdir().expect("home");
        let bin = home.path().join(".local").join("bin");
        fs::create_dir_all(&bin).expect("bin dir");
        fs::write(bin.join("claude"), "#!/bin/sh\n").expect("binary");

        let found = find_host_app(Os::Linux, home.path()).expect("found");
        assert!(found.starts_with("/usr") || found.starts_with(home.path()));
    }

    #[test]
    fn missing_host_app_is_fatal() {
        let home = tempfile::tempdir().expect("home");
        let ctx = crate::test_support::context_in(home.path(), Os::Windows);
        let ui = crate::test_support::ScriptedUi::default();

        let err = ensure_host_app(&ctx, &ui).expect_err("not installed");

        assert_eq!(err.to_string(), "Claude Desktop not found");
        assert!(ui.saw(DOWNLOAD_URL));
    }
}
