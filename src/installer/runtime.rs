//! Container runtime availability, with a Homebrew-assisted recovery on macOS.
use crate::flow::{Collaborators, Outcome, Step};
use crate::process::{CommandRunner, CommandSpec};
use crate::retry::{Attempt, RetryOutcome};
use crate::settings::{InstallContext, Os};
use crate::ui::Tone;
use anyhow::{anyhow, Result};

const DOCKER_DOWNLOAD_URL: &str = "https://www.docker.com/get-started";

pub(super) fn ensure_runtime(ctx: &InstallContext, io: Collaborators<'_>) -> Result<Step<()>> {
    let ui = io.ui;
    ui.say(Tone::Detail, "Checking Docker installation...");
    match check_runtime(io.runner) {
        Ok(()) => {
            ui.say(Tone::Success, "Docker is installed and running");
            Ok(Step::Continue(()))
        }
        Err(err) => {
            tracing::info!(error = %format!("{err:#}"), "docker check failed");
            ui.say(Tone::Error, "Docker is not installed or not running");
            recover(ctx, io)
        }
    }
}

/// Both the CLI and the daemon must answer.
fn check_runtime(runner: &dyn CommandRunner) -> Result<()> {
    runner.run(&CommandSpec::new("docker", ["--version"]))?;
    runner.run(&CommandSpec::new("docker", ["info"]))?;
    Ok(())
}

fn recover(ctx: &InstallContext, io: Collaborators<'_>) -> Result<Step<()>> {
    let ui = io.ui;
    ui.say(
        Tone::Error,
        "Docker is required for local DreamFactory installation.",
    );
    let has_brew = ctx.os == Os::MacOS
        && io
            .runner
            .run(&CommandSpec::new("brew", ["--version"]))
            .is_ok();
    if !has_brew {
        print_manual_install(io);
        return Err(anyhow!("Docker is not available"));
    }

    ui.say(Tone::Warn, "Homebrew is installed on your system.");
    if !ui.confirm("Would you like to install Docker using Homebrew?", true)? {
        print_manual_install(io);
        return Ok(Step::Stop(Outcome::declined("Docker installation declined")));
    }

    let install_command = brew_install_command(io.runner);
    ui.say(Tone::Warn, "Docker will be installed via Homebrew.");
    ui.say(
        Tone::Info,
        "Note: You may be prompted for your admin password during installation.",
    );
    ui.say(Tone::Info, "Please run the following command in a new terminal:");
    ui.say(Tone::Heading, &format!("  {install_command}"));
    for line in [
        "After Docker is installed:",
        "  1. Open Docker from Applications or Launchpad",
        "  2. Accept the terms and conditions",
        "  3. Wait for Docker to start completely (icon appears in menu bar)",
        "  4. Return to this installer",
    ] {
        ui.say(Tone::Info, line);
    }

    if !ui.confirm("Have you completed the Docker installation?", false)? {
        ui.say(Tone::Warn, "Please install Docker and run this installer again.");
        return Ok(Step::Stop(Outcome::declined("Docker installation not completed")));
    }

    let outcome = ctx.settings.runtime_recheck.run(
        io.sleeper,
        |_| {
            let retry = ui.confirm(
                "Docker does not appear to be running yet. Would you like to check again?",
                true,
            )?;
            if retry {
                ui.say(Tone::Detail, "Waiting a moment for Docker to start...");
            }
            Ok(retry)
        },
        |_| {
            Ok(match check_runtime(io.runner) {
                Ok(()) => Attempt::Ready(()),
                Err(err) => Attempt::Pending(format!("{err:#}")),
            })
        },
    )?;

    match outcome {
        RetryOutcome::Ready(()) => {
            ui.say(Tone::Success, "Docker is now installed and running!");
            Ok(Step::Continue(()))
        }
        RetryOutcome::Aborted => {
            ui.say(
                Tone::Warn,
                "Please ensure Docker is running and restart the installer.",
            );
            Ok(Step::Stop(Outcome::declined("Docker recheck cancelled")))
        }
        RetryOutcome::Exhausted { attempts, last } => {
            tracing::warn!(attempts, %last, "docker still unavailable");
            ui.say(Tone::Warn, "Docker is still not running.");
            ui.say(
                Tone::Info,
                "Please ensure Docker Desktop is open and running, then restart the installer.",
            );
            Ok(Step::Stop(Outcome::declined("Docker is still not running")))
        }
    }
}

/// Apple Silicon needs the native-architecture prefix.
fn brew_install_command(runner: &dyn CommandRunner) -> &'static str {
    let apple_silicon = runner
        .run(&CommandSpec::new("uname", ["-m"]))
        .map(|output| output.stdout.trim() == "arm64")
        .unwrap_or(false);
    if apple_silicon {
        "arch -arm64 brew install --cask docker"
    } else {
        "brew install --cask docker"
    }
}

fn print_manual_install(io: Collaborators<'_>) {
    io.ui.say(
        Tone::Warn,
        &format!("Please install Docker from: {DOCKER_DOWNLOAD_URL}"),
    );
    io.ui.say(
        Tone::Warn,
        "After installing Docker, make sure it is running and try again.",
    );
}
