//! Web-app workspace provisioning and readiness polling.
use crate::flow::Collaborators;
use crate::http::HttpRequest;
use crate::process::CommandSpec;
use crate::retry::{Attempt, RetryOutcome};
use crate::settings::InstallContext;
use crate::ui::Tone;
use anyhow::{anyhow, bail, Context, Result};
use std::collections::BTreeMap;
use std::fs;

const EXISTING_CHOICES: [&str; 3] = [
    "Use existing installation",
    "Remove and reinstall",
    "Cancel",
];

pub(super) fn ensure_web_app(ctx: &InstallContext, io: Collaborators<'_>) -> Result<()> {
    provision(ctx, io).context("Local DreamFactory setup failed")
}

fn provision(ctx: &InstallContext, io: Collaborators<'_>) -> Result<()> {
    let ui = io.ui;
    let dir = &ctx.web_app_dir;
    ui.say(Tone::Detail, "Setting up local DreamFactory...");

    if dir.exists() {
        let choice = ui.select(
            &format!(
                "Directory {} already exists. What would you like to do?",
                dir.display()
            ),
            &EXISTING_CHOICES,
        )?;
        match choice {
            0 => return reuse(ctx, io),
            1 => {
                ui.say(Tone::Detail, "Removing existing directory...");
                fs::remove_dir_all(dir).with_context(|| format!("remove {}", dir.display()))?;
            }
            _ => bail!("Installation cancelled"),
        }
    }

    ui.say(Tone::Detail, "Cloning DreamFactory Docker repository...");
    io.runner.run(&CommandSpec::new(
        "git",
        [
            "clone".to_string(),
            ctx.settings.web_app_repo.clone(),
            dir.display().to_string(),
        ],
    ))?;

    ui.say(
        Tone::Detail,
        "Building Docker images (this may take 5-10 minutes on first run)...",
    );
    io.runner.run(&CommandSpec::new("docker", ["compose", "build"]).in_dir(dir))?;
    ui.say(Tone::Detail, "Starting DreamFactory containers...");
    io.runner.run(&CommandSpec::new("docker", ["compose", "up", "-d"]).in_dir(dir))?;

    wait_until_ready(ctx, io)?;
    ui.say(Tone::Success, "Local DreamFactory setup complete");
    Ok(())
}

fn reuse(ctx: &InstallContext, io: Collaborators<'_>) -> Result<()> {
    let ui = io.ui;
    ui.say(Tone::Detail, "Checking DreamFactory containers...");
    if containers_running(ctx, io) {
        ui.say(Tone::Success, "DreamFactory containers are already running");
        return Ok(());
    }

    ui.say(Tone::Detail, "Starting DreamFactory containers...");
    io.runner.run(
        &CommandSpec::new("docker", ["compose", "up", "-d"]).in_dir(&ctx.web_app_dir),
    )?;
    wait_until_ready(ctx, io)?;
    ui.say(Tone::Success, "DreamFactory is running");
    Ok(())
}

/// A failed `docker ps` counts as "not running".
fn containers_running(ctx: &InstallContext, io: Collaborators<'_>) -> bool {
    let spec = CommandSpec::new("docker", ["ps", "--format", "{{.Names}}"]);
    match io.runner.run(&spec) {
        Ok(output) => output
            .lines()
            .any(|name| name.contains(ctx.settings.running_marker.as_str())),
        Err(err) => {
            tracing::debug!(error = %format!("{err:#}"), "docker ps failed");
            false
        }
    }
}

/// Poll the web root until it answers HTTP 200.
pub(super) fn wait_until_ready(ctx: &InstallContext, io: Collaborators<'_>) -> Result<()> {
    let ui = io.ui;
    let settings = &ctx.settings;
    let policy = settings.readiness;

    let outcome = policy.run(
        io.sleeper,
        |_| Ok(true),
        |attempt| {
            ui.say(
                Tone::Detail,
                &format!(
                    "Waiting for DreamFactory to start... (attempt {attempt}/{})",
                    policy.max_attempts
                ),
            );
            let request =
                HttpRequest::get(settings.web_root_url.as_str(), settings.readiness_timeout);
            match io.http.send(&request) {
                Ok(response) => {
                    if settings.debug_http {
                        let headers: BTreeMap<&str, &str> = response
                            .headers
                            .iter()
                            .map(|(name, value)| (name.as_str(), value.as_str()))
                            .collect();
                        ui.say(Tone::Detail, &format!("Response status: {}", response.status));
                        ui.say(
                            Tone::Detail,
                            &format!(
                                "Response headers: {}",
                                serde_json::to_string_pretty(&headers)?
                            ),
                        );
                    }
                    if response.status == 200 {
                        Ok(Attempt::Ready(()))
                    } else {
                        ui.say(
                            Tone::Warn,
                            &format!("Unexpected status code: {}", response.status),
                        );
                        Ok(Attempt::Pending(format!("HTTP {}", response.status)))
                    }
                }
                Err(err) => {
                    let reason = format!("{err:#}");
                    ui.say(Tone::Detail, &format!("Attempt {attempt}: {reason}"));
                    Ok(Attempt::Pending(reason))
                }
            }
        },
    )?;

    match outcome {
        RetryOutcome::Ready(()) => {
            ui.say(Tone::Success, "DreamFactory is ready");
            Ok(())
        }
        RetryOutcome::Exhausted { attempts, last } => {
            tracing::warn!(attempts, %last, "web app never became ready");
            ui.say(Tone::Error, "DreamFactory failed to start in time");
            Err(anyhow!(
                "DreamFactory failed to start. Please check Docker logs and container status."
            ))
        }
        RetryOutcome::Aborted => Err(anyhow!("readiness polling was aborted")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use crate::settings::Os;
    use crate::test_support::{
        context_in, status, Answer, FakeRunner, FakeTransport, NoSleep, ScriptedUi,
    };
    use std::time::Duration;

    const ROOT: &str = "http://127.0.0.1/";

    fn collaborators<'a>(
        runner: &'a FakeRunner,
        http: &'a FakeTransport,
        ui: &'a ScriptedUi,
        sleeper: &'a NoSleep,
    ) -> Collaborators<'a> {
        Collaborators {
            runner,
            http,
            ui,
            sleeper,
        }
    }

    #[test]
    fn readiness_stops_on_first_200() {
        let home = tempfile::tempdir().expect("home");
        let ctx = context_in(home.path(), Os::Linux);
        let http = FakeTransport::new().route(
            Method::Get,
            ROOT,
            vec![
                Err("connection refused".to_string()),
                status(302, ""),
                status(502, "bad gateway"),
                status(200, "<html>"),
                status(500, "never reached"),
            ],
        );
        let (runner, ui, sleeper) = (FakeRunner::new(), ScriptedUi::default(), NoSleep::default());

        wait_until_ready(&ctx, collaborators(&runner, &http, &ui, &sleeper)).expect("ready");

        assert_eq!(http.count(Method::Get, ROOT), 4);
        assert_eq!(sleeper.total(), Duration::from_secs(6));
        let requests = http.requests();
        assert_eq!(requests[0].timeout, Duration::from_secs(5));
    }

    #[test]
    fn readiness_fails_after_thirty_attempts() {
        let home = tempfile::tempdir().expect("home");
        let ctx = context_in(home.path(), Os::Linux);
        let http = FakeTransport::new().route(Method::Get, ROOT, vec![status(503, "")]);
        let (runner, ui, sleeper) = (FakeRunner::new(), ScriptedUi::default(), NoSleep::default());

        let err = wait_until_ready(&ctx, collaborators(&runner, &http, &ui, &sleeper))
            .expect_err("never ready");

        assert!(err.to_string().contains("failed to start"));
        assert_eq!(http.count(Method::Get, ROOT), 30);
        assert_eq!(sleeper.count(), 29);
    }

    #[test]
    fn debug_mode_echoes_response_details() {
        let home = tempfile::tempdir().expect("home");
        let mut ctx = context_in(home.path(), Os::Linux);
        ctx.settings.debug_http = true;
        let http = FakeTransport::new().route(Method::Get, ROOT, vec![status(200, "")]);
        let (runner, ui, sleeper) = (FakeRunner::new(), ScriptedUi::default(), NoSleep::default());

        wait_until_ready(&ctx, collaborators(&runner, &http, &ui, &sleeper)).expect("ready");

        assert!(ui.saw("Response status: 200"));
    }

    #[test]
    fn fresh_install_clones_builds_and_starts() {
        let home = tempfile::tempdir().expect("home");
        let ctx = context_in(home.path(), Os::Linux);
        let http = FakeTransport::new().route(Method::Get, ROOT, vec![status(200, "")]);
        let (runner, ui, sleeper) = (FakeRunner::new(), ScriptedUi::default(), NoSleep::default());

        ensure_web_app(&ctx, collaborators(&runner, &http, &ui, &sleeper)).expect("installed");

        let specs = runner.specs();
        let clone = &specs[0];
        assert_eq!(clone.program, "git");
        assert_eq!(clone.args[1], ctx.settings.web_app_repo);
        assert_eq!(clone.args[2], ctx.web_app_dir.display().to_string());
        let calls = runner.calls();
        assert_eq!(calls[1], "docker compose build");
        assert_eq!(calls[2], "docker compose up -d");
        assert_eq!(runner.specs()[1].cwd.as_deref(), Some(ctx.web_app_dir.as_path()));
        assert!(ui.prompts().is_empty());
    }

    #[test]
    fn existing_running_workspace_is_reused_without_checkout() {
        let home = tempfile::tempdir().expect("home");
        let ctx = context_in(home.path(), Os::Linux);
        fs::create_dir_all(&ctx.web_app_dir).expect("workspace");
        let runner = FakeRunner::new().stdout("docker ps", "df-mysql\ndf-redis\ndf-web\n");
        let ui = ScriptedUi::new([Answer::Select(0)]);
        let (http, sleeper) = (FakeTransport::new(), NoSleep::default());

        ensure_web_app(&ctx, collaborators(&runner, &http, &ui, &sleeper)).expect("reused");

        assert!(!runner.ran("git"));
        assert!(!runner.ran("docker compose"));
        assert!(http.requests().is_empty());
    }

    #[test]
    fn existing_stopped_workspace_is_started_and_polled() {
        let home = tempfile::tempdir().expect("home");
        let ctx = context_in(home.path(), Os::Linux);
        fs::create_dir_all(&ctx.web_app_dir).expect("workspace");
        let runner = FakeRunner::new().stdout("docker ps", "some-other-container\n");
        let http = FakeTransport::new().route(
            Method::Get,
            ROOT,
            vec![status(503, ""), status(200, "")],
        );
        let ui = ScriptedUi::new([Answer::Select(0)]);
        let sleeper = NoSleep::default();

        ensure_web_app(&ctx, collaborators(&runner, &http, &ui, &sleeper)).expect("started");

        assert!(!runner.ran("git"));
        assert_eq!(runner.count("docker compose up -d"), 1);
        assert_eq!(http.count(Method::Get, ROOT), 2);
    }

    #[test]
    fn reinstall_wipes_workspace_before_checkout() {
        let home = tempfile::tempdir().expect("home");
        let ctx = context_in(home.path(), Os::Linux);
        fs::create_dir_all(&ctx.web_app_dir).expect("workspace");
        fs::write(ctx.web_app_dir.join("stale.txt"), "old").expect("stale file");
        let http = FakeTransport::new().route(Method::Get, ROOT, vec![status(200, "")]);
        let ui = ScriptedUi::new([Answer::Select(1)]);
        let (runner, sleeper) = (FakeRunner::new(), NoSleep::default());

        ensure_web_app(&ctx, collaborators(&runner, &http, &ui, &sleeper)).expect("reinstalled");

        assert!(!ctx.web_app_dir.exists());
        assert!(runner.ran("git clone"));
    }

    #[test]
    fn cancel_is_an_error() {
        let home = tempfile::tempdir().expect("home");
        let ctx = context_in(home.path(), Os::Linux);
        fs::create_dir_all(&ctx.web_app_dir).expect("workspace");
        let ui = ScriptedUi::new([Answer::Select(2)]);
        let (runner, http, sleeper) = (FakeRunner::new(), FakeTransport::new(), NoSleep::default());

        let err = ensure_web_app(&ctx, collaborators(&runner, &http, &ui, &sleeper))
            .expect_err("cancelled");

        assert_eq!(
            format!("{err:#}"),
            "Local DreamFactory setup failed: Installation cancelled"
        );
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn failed_build_is_fatal() {
        let home = tempfile::tempdir().expect("home");
        let ctx = context_in(home.path(), Os::Linux);
        let runner = FakeRunner::new().fail("docker compose build", "no space left on device");
        let (http, ui, sleeper) = (FakeTransport::new(), ScriptedUi::default(), NoSleep::default());

        let err = ensure_web_app(&ctx, collaborators(&runner, &http, &ui, &sleeper))
            .expect_err("build failed");

        assert!(format!("{err:#}").contains("no space left on device"));
        assert!(!runner.ran("docker compose up"));
    }
}
