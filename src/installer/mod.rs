//! The install workflow.
//!
//! A fixed sequence of steps: confirm, ensure the container runtime, ensure the
//! web app, then the optional integration setup (demo API, credentials,
//! integration server, host-app detection, host-config merge). Declines end
//! the run with an `Outcome`; failures propagate as errors.
mod host_app;
mod integration;
mod runtime;
mod webapp;

use crate::demo_api::{self, AdminCredentials, DemoApi};
use crate::flow::{Collaborators, Outcome, Step};
use crate::host_config::{HostConfig, McpServerEntry};
use crate::settings::InstallContext;
use crate::ui::{non_empty, Tone, Ui};
use anyhow::{Context, Result};
use std::collections::BTreeMap;

pub const URL_ENV: &str = "DREAMFACTORY_URL";
pub const API_KEY_ENV: &str = "DREAMFACTORY_API_KEY";

#[derive(Debug, Clone, Copy)]
pub struct InstallOptions {
    /// Offer to provision a demo database API before asking for a key.
    pub offer_demo_api: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            offer_demo_api: true,
        }
    }
}

/// Credentials the integration server is configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ApiAccess {
    api_key: String,
    service_name: String,
}

impl From<DemoApi> for ApiAccess {
    fn from(demo: DemoApi) -> Self {
        Self {
            api_key: demo.api_key,
            service_name: demo.service_name,
        }
    }
}

pub fn run_install(
    ctx: &InstallContext,
    io: Collaborators<'_>,
    options: InstallOptions,
) -> Result<Outcome> {
    let ui = io.ui;
    ui.say(Tone::Heading, "Welcome to the DreamFactory Installer");
    ui.say(Tone::Info, "This installer will:");
    ui.say(Tone::Info, "  1. Install DreamFactory locally using Docker");
    ui.say(
        Tone::Info,
        "  2. Optionally install the DreamFactory MCP server for Claude Desktop",
    );

    if !ui.confirm("Would you like to proceed with the installation?", true)? {
        ui.say(Tone::Info, "Installation cancelled by user.");
        return Ok(Outcome::declined("installation cancelled by user"));
    }

    ui.say(Tone::Heading, "Step 1: Installing DreamFactory");
    if let Step::Stop(outcome) = runtime::ensure_runtime(ctx, io)? {
        return Ok(outcome);
    }
    webapp::ensure_web_app(ctx, io)?;

    let web_url = ctx.settings.web_display_url();
    ui.say(Tone::Success, "DreamFactory is running locally!");
    ui.say(
        Tone::Info,
        &format!("You can access DreamFactory at: {web_url}"),
    );

    ui.say(Tone::Heading, "Step 2: DreamFactory MCP Server (Optional)");
    if !ui.confirm(
        "Would you like to continue with the optional Claude Desktop integration setup?",
        true,
    )? {
        ui.say(Tone::Success, "DreamFactory installation complete!");
        ui.say(
            Tone::Info,
            &format!("You can access DreamFactory at: {web_url}"),
        );
        return Ok(Outcome::Completed);
    }

    let demo = if options.offer_demo_api {
        offer_demo_api(ctx, io)?
    } else {
        None
    };

    if !ui.confirm(
        "Would you like to install the DreamFactory MCP server for Claude Desktop?",
        true,
    )? {
        ui.say(Tone::Success, "DreamFactory installation complete!");
        return Ok(Outcome::Completed);
    }

    let access = match demo {
        Some(demo) => ApiAccess::from(demo),
        None => match collect_api_access(ctx, ui)? {
            Step::Continue(access) => access,
            Step::Stop(outcome) => return Ok(outcome),
        },
    };

    integration::ensure_integration_server(ctx, io)?;
    let host_app = host_app::ensure_host_app(ctx, ui)?;
    tracing::info!(path = %host_app.display(), "host application detected");

    let base_url = ctx.settings.service_url(&access.service_name);
    update_host_config(ctx, ui, &access.api_key, &base_url)?;

    ui.say(Tone::Success, "Installation complete!");
    ui.say(
        Tone::Warn,
        "Please restart Claude Desktop to start using DreamFactory MCP.",
    );
    Ok(Outcome::Completed)
}

/// Ask for a demo API; a provisioning failure degrades to `None`.
fn offer_demo_api(ctx: &InstallContext, io: Collaborators<'_>) -> Result<Option<DemoApi>> {
    let ui = io.ui;
    if !ui.confirm(
        "Would you like to automatically create a demo database API (service, role and API key)?",
        true,
    )? {
        return Ok(None);
    }

    ui.say(
        Tone::Info,
        &format!(
            "Use the administrator account you created at {}.",
            ctx.settings.web_display_url()
        ),
    );
    let email = ui.input("Administrator email:", None, &|value: &str| {
        if value.contains('@') {
            Ok(())
        } else {
            Err("Please enter a valid email address".to_string())
        }
    })?;
    let password = ui.password("Administrator password:", &non_empty("Password"))?;
    let credentials = AdminCredentials { email, password };

    ui.say(Tone::Info, "Creating demo database API...");
    match demo_api::provision(&ctx.settings, io.http, &credentials) {
        Ok(demo) => {
            ui.say(
                Tone::Success,
                &format!("Demo API created for service '{}'", demo.service_name),
            );
            Ok(Some(demo))
        }
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "demo api provisioning failed");
            ui.say(Tone::Warn, &format!("Could not create the demo API: {err:#}"));
            ui.say(
                Tone::Info,
                "Continuing without it; you can enter an API key manually.",
            );
            Ok(None)
        }
    }
}

fn collect_api_access(ctx: &InstallContext, ui: &dyn Ui) -> Result<Step<ApiAccess>> {
    let web_url = ctx.settings.web_display_url();
    ui.say(
        Tone::Warn,
        "Before installing the MCP server, you need to create an API key in DreamFactory:",
    );
    for line in [
        format!("   1. Go to {web_url}"),
        "   2. Create a System Administrator account".to_string(),
        "   3. Add a local database service".to_string(),
        "   4. Create a Role with appropriate permissions (RBAC)".to_string(),
        "   5. Create an App and generate an API key".to_string(),
        "   6. Copy the API key to paste below".to_string(),
    ] {
        ui.say(Tone::Info, &line);
    }

    if !ui.confirm("Have you completed the setup and created an API key?", false)? {
        ui.say(Tone::Warn, "MCP server installation skipped.");
        ui.say(
            Tone::Info,
            "You can run this installer again later to set up the MCP server.",
        );
        ui.say(Tone::Success, "DreamFactory installation complete!");
        return Ok(Step::Stop(Outcome::declined("MCP server installation skipped")));
    }

    let api_key = ui.input(
        "Enter your DreamFactory API key:",
        None,
        &non_empty("API key"),
    )?;
    let service_name = ui.input(
        "Enter your DreamFactory service name:",
        Some(ctx.settings.demo_service_name.as_str()),
        &non_empty("Service name"),
    )?;
    Ok(Step::Continue(ApiAccess {
        api_key,
        service_name,
    }))
}

/// Merge this tool's entry into the host config, asking before replacing it.
fn update_host_config(
    ctx: &InstallContext,
    ui: &dyn Ui,
    api_key: &str,
    base_url: &str,
) -> Result<()> {
    merge_host_config(ctx, ui, api_key, base_url).context("Configuration update failed")
}

fn merge_host_config(
    ctx: &InstallContext,
    ui: &dyn Ui,
    api_key: &str,
    base_url: &str,
) -> Result<()> {
    let path = &ctx.host_config_path;
    let loaded = HostConfig::load(path)?;
    if loaded.recovered {
        ui.say(Tone::Warn, "Could not parse existing config, creating new one");
    }
    let mut config = loaded.config;
    let name = ctx.settings.entry_name.as_str();

    if config.has_entry(name)
        && !ui.confirm(
            "DreamFactory MCP is already configured. Update configuration?",
            true,
        )?
    {
        ui.say(Tone::Info, "Configuration unchanged");
        return Ok(());
    }

    let entry = McpServerEntry {
        command: ctx.settings.integration_command.clone(),
        args: vec![ctx.integration_entry_point().display().to_string()],
        env: BTreeMap::from([
            (URL_ENV.to_string(), base_url.to_string()),
            (API_KEY_ENV.to_string(), api_key.to_string()),
        ]),
    };
    config.upsert_entry(name, &entry)?;
    config.save(path)?;

    tracing::info!(path = %path.display(), "host config updated");
    ui.say(Tone::Success, "Claude Desktop configuration updated");
    Ok(())
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;
