//! The uninstall workflow.
//!
//! Once the user types the confirmation word, every cleanup stage runs even if
//! an earlier one failed. Only a host-config I/O error stops the run.
use crate::flow::{Collaborators, Outcome};
use crate::host_config::HostConfig;
use crate::process::{CommandRunner, CommandSpec};
use crate::settings::{InstallContext, Settings};
use crate::ui::{Tone, Ui};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub const CONFIRMATION_WORD: &str = "delete";

pub fn run_uninstall(ctx: &InstallContext, io: Collaborators<'_>) -> Result<Outcome> {
    let ui = io.ui;
    ui.say(Tone::Heading, "DreamFactory Uninstaller");
    ui.say(Tone::Warn, "This will permanently remove:");
    for line in [
        "  - DreamFactory Docker containers, images and volumes".to_string(),
        format!("  - {}", ctx.web_app_dir.display()),
        format!("  - {}", ctx.integration_dir.display()),
        format!(
            "  - the {} entry in {}",
            ctx.settings.entry_name,
            ctx.host_config_path.display()
        ),
    ] {
        ui.say(Tone::Info, &line);
    }

    ui.input(
        &format!("Type '{CONFIRMATION_WORD}' to confirm:"),
        None,
        &|value: &str| {
            if value == CONFIRMATION_WORD {
                Ok(())
            } else {
                Err(format!("Please type '{CONFIRMATION_WORD}' to confirm"))
            }
        },
    )?;

    tracing::info!("uninstall confirmed");
    ui.say(Tone::Heading, "Removing Docker resources");
    remove_docker_resources(ctx, io);

    ui.say(Tone::Heading, "Updating Claude Desktop configuration");
    remove_host_entry(ctx, ui)?;

    ui.say(Tone::Heading, "Removing installation directories");
    remove_workspace(ui, &ctx.web_app_dir);
    remove_workspace(ui, &ctx.integration_dir);

    ui.say(Tone::Success, "Uninstall complete!");
    ui.say(
        Tone::Info,
        "Restart Claude Desktop to unload the DreamFactory MCP server.",
    );
    Ok(Outcome::Completed)
}

/// Four independent stages; a failure in one is reported and the next runs.
fn remove_docker_resources(ctx: &InstallContext, io: Collaborators<'_>) {
    let runner = io.runner;
    let settings = &ctx.settings;

    if ctx.web_app_dir.exists() {
        io.ui.say(Tone::Detail, "Stopping DreamFactory containers...");
        let down = CommandSpec::new("docker", ["compose", "down"]).in_dir(&ctx.web_app_dir);
        report(io.ui, "stop containers", runner.run(&down).map(|_| ()));
    }

    let containers = remove_matching(
        runner,
        CommandSpec::new("docker", ["ps", "-a", "--format", "{{.Names}}"]),
        &["rm", "-f"],
        |name| name.starts_with(settings.container_prefix.as_str()),
    );
    report_removed(io.ui, "containers", containers);

    let images = remove_matching(
        runner,
        CommandSpec::new("docker", ["images", "--format", "{{.Repository}}:{{.Tag}}"]),
        &["rmi", "-f"],
        |reference| has_marker(settings, reference),
    );
    report_removed(io.ui, "images", images);

    let volumes = remove_matching(
        runner,
        CommandSpec::new("docker", ["volume", "ls", "--format", "{{.Name}}"]),
        &["volume", "rm", "-f"],
        |name| has_marker(settings, name),
    );
    report_removed(io.ui, "volumes", volumes);
}

fn has_marker(settings: &Settings, name: &str) -> bool {
    settings
        .resource_markers
        .iter()
        .any(|marker| name.contains(marker.as_str()))
}

/// List with `list`, then force-remove every matching line in one call.
/// Returns how many were removed.
fn remove_matching(
    runner: &dyn CommandRunner,
    list: CommandSpec,
    remove_args: &[&str],
    matches: impl Fn(&str) -> bool,
) -> Result<usize> {
    let listed = runner.run(&list)?;
    let targets: Vec<String> = listed
        .lines()
        .filter(|line| matches(line))
        .map(str::to_string)
        .collect();
    if targets.is_empty() {
        return Ok(0);
    }

    let args = remove_args
        .iter()
        .map(|arg| arg.to_string())
        .chain(targets.iter().cloned());
    runner.run(&CommandSpec::new("docker", args))?;
    Ok(targets.len())
}

fn report_removed(ui: &dyn Ui, kind: &str, result: Result<usize>) {
    match result {
        Ok(0) => ui.say(Tone::Detail, &format!("No DreamFactory {kind} found")),
        Ok(count) => ui.say(Tone::Success, &format!("Removed {count} {kind}")),
        Err(err) => report(ui, &format!("remove {kind}"), Err(err)),
    }
}

fn report(ui: &dyn Ui, what: &str, result: Result<()>) {
    if let Err(err) = result {
        tracing::warn!(step = what, error = %format!("{err:#}"), "uninstall step failed");
        ui.say(Tone::Warn, &format!("Could not {what}: {err:#}"));
    }
}

/// An unreadable document is left as it is; only I/O errors propagate.
fn remove_host_entry(ctx: &InstallContext, ui: &dyn Ui) -> Result<()> {
    let path = &ctx.host_config_path;
    let name = ctx.settings.entry_name.as_str();
    let loaded = HostConfig::load(path)
        .with_context(|| format!("read Claude Desktop config {}", path.display()))?;
    if loaded.recovered {
        ui.say(
            Tone::Warn,
            "Could not parse Claude Desktop config; leaving it unchanged",
        );
        return Ok(());
    }

    let mut config = loaded.config;
    if !config.remove_entry(name) {
        ui.say(Tone::Detail, "No DreamFactory MCP entry found");
        return Ok(());
    }
    config
        .save(path)
        .with_context(|| format!("write Claude Desktop config {}", path.display()))?;
    tracing::info!(path = %path.display(), entry = name, "host config entry removed");
    ui.say(Tone::Success, "Removed DreamFactory MCP from Claude Desktop config");
    Ok(())
}

fn remove_workspace(ui: &dyn Ui, dir: &Path) {
    if !dir.exists() {
        return;
    }
    let removed = fs::remove_dir_all(dir).with_context(|| format!("remove {}", dir.display()));
    match removed {
        Ok(()) => ui.say(Tone::Success, &format!("Removed {}", dir.display())),
        Err(err) => report(ui, &format!("remove {}", dir.display()), Err(err)),
    }
}
