//! Integration-server workspace: checkout, dependency install, build.
use crate::flow::Collaborators;
use crate::process::CommandSpec;
use crate::settings::InstallContext;
use crate::ui::Tone;
use anyhow::{Context, Result};
use std::fs;

pub(super) fn ensure_integration_server(ctx: &InstallContext, io: Collaborators<'_>) -> Result<()> {
    provision(ctx, io).context("Repository setup failed")
}

fn provision(ctx: &InstallContext, io: Collaborators<'_>) -> Result<()> {
    let ui = io.ui;
    let dir = &ctx.integration_dir;

    if dir.exists() {
        let overwrite = ui.confirm(
            &format!("Directory {} already exists. Overwrite?", dir.display()),
            false,
        )?;
        if !overwrite {
            ui.say(Tone::Info, "Using existing installation");
            return Ok(());
        }
        ui.say(Tone::Detail, "Removing existing directory...");
        fs::remove_dir_all(dir).with_context(|| format!("remove {}", dir.display()))?;
    }

    ui.say(Tone::Detail, "Cloning DreamFactory MCP repository...");
    io.runner.run(&CommandSpec::new(
        "git",
        [
            "clone".to_string(),
            ctx.settings.integration_repo.clone(),
            dir.display().to_string(),
        ],
    ))?;
    ui.say(Tone::Detail, "Installing dependencies...");
    io.runner.run(&CommandSpec::new("npm", ["install"]).in_dir(dir))?;
    ui.say(Tone::Detail, "Building project...");
    io.runner.run(&CommandSpec::new("npm", ["run", "build"]).in_dir(dir))?;

    ui.say(Tone::Success, "Repository cloned and built successfully");
    Ok(())
}
