use anyhow::Result;
use clap::Parser;
use console::{style, Term};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod demo_api;
mod flow;
mod host_config;
mod http;
mod installer;
mod process;
mod retry;
mod settings;
#[cfg(test)]
mod test_support;
mod ui;
mod uninstall;
mod util;

use cli::RootArgs;
use flow::{Collaborators, Outcome};
use installer::InstallOptions;
use settings::{InstallContext, Settings};
use ui::Ui;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing();

    let terminal = ui::TerminalUi::new();
    let label = if args.uninstall {
        "Uninstall"
    } else {
        "Installation"
    };
    match run(&args, &terminal) {
        Ok(Outcome::Completed) => ExitCode::SUCCESS,
        Ok(Outcome::Declined { reason }) => {
            tracing::info!(%reason, "stopped at user request");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::debug!(error = ?err, "run failed");
            report_failure(&format!("{label} failed: {err:#}"));
            ExitCode::from(1)
        }
    }
}

/// Fatal errors go to stderr, apart from the prompt transcript on stdout.
fn report_failure(message: &str) {
    if Term::stderr()
        .write_line(&style(message).red().to_string())
        .is_err()
    {
        tracing::error!(%message, "could not write failure to stderr");
    }
}

/// Logs go to stderr so they never interleave with prompts on stdout.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: &RootArgs, terminal: &dyn Ui) -> Result<Outcome> {
    let ctx = InstallContext::detect(Settings::from_env())?;
    tracing::debug!(
        home = %ctx.home.display(),
        os = ?ctx.os,
        config = %ctx.host_config_path.display(),
        "context detected"
    );

    let runner = process::SystemRunner;
    let transport = http::UreqTransport::new();
    let sleeper = retry::ThreadSleeper;
    let io = Collaborators {
        runner: &runner,
        http: &transport,
        ui: terminal,
        sleeper: &sleeper,
    };

    if args.uninstall {
        uninstall::run_uninstall(&ctx, io)
    } else {
        let options = InstallOptions {
            offer_demo_api: !args.manual_api_key,
        };
        installer::run_install(&ctx, io, options)
    }
}
