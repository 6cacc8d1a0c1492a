//! Installer settings and the per-run install context.
//!
//! Every fixed constant of the workflow lives in `Settings`; the paths derived
//! from the user's home directory live in `InstallContext`. Both are built once
//! at startup and passed by reference to each step.
use crate::retry::RetryPolicy;
use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that enables HTTP diagnostics during readiness polling.
pub const DEBUG_ENV: &str = "DEBUG_DF_INSTALLER";

const WEB_APP_REPO: &str = "https://github.com/dreamfactorysoftware/df-docker.git";
const INTEGRATION_REPO: &str = "https://github.com/dreamfactorysoftware/df-mcp.git";
const WEB_APP_DIR_NAME: &str = "df-docker";
const INTEGRATION_DIR_NAME: &str = "df-mcp";
const HOST_CONFIG_FILE: &str = "claude_desktop_config.json";

/// Operating system family, used for runtime recovery and host-app detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    MacOS,
    Windows,
    Linux,
}

impl Os {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Os::MacOS
        } else if cfg!(target_os = "windows") {
            Os::Windows
        } else {
            Os::Linux
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub web_app_repo: String,
    pub integration_repo: String,
    /// Unauthenticated URL probed for readiness.
    pub web_root_url: String,
    /// Base of the REST API, without a trailing slash.
    pub api_base_url: String,
    /// Substring identifying the web container in `docker ps` output.
    pub running_marker: String,
    /// Name prefix of every container the web app creates.
    pub container_prefix: String,
    /// Substrings identifying images and volumes owned by the web app.
    pub resource_markers: Vec<String>,
    /// Key owned by this tool inside the host config `mcpServers` map.
    pub entry_name: String,
    pub integration_command: String,
    /// Built entry point, relative to the integration workspace.
    pub integration_entry_point: PathBuf,
    pub demo_service_name: String,
    pub readiness: RetryPolicy,
    pub runtime_recheck: RetryPolicy,
    pub readiness_timeout: Duration,
    pub api_timeout: Duration,
    pub debug_http: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            web_app_repo: WEB_APP_REPO.to_string(),
            integration_repo: INTEGRATION_REPO.to_string(),
            web_root_url: "http://127.0.0.1/".to_string(),
            api_base_url: "http://127.0.0.1/api/v2".to_string(),
            running_marker: "df-web".to_string(),
            container_prefix: "df-".to_string(),
            resource_markers: vec!["df-docker".to_string(), "dreamfactory".to_string()],
            entry_name: "df-mcp".to_string(),
            integration_command: "node".to_string(),
            integration_entry_point: Path::new("build").join("index.js"),
            demo_service_name: "db".to_string(),
            readiness: RetryPolicy::new(30, Duration::from_secs(2)),
            runtime_recheck: RetryPolicy::new(3, Duration::from_secs(3)),
            readiness_timeout: Duration::from_secs(5),
            api_timeout: Duration::from_secs(30),
            debug_http: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            debug_http: debug_enabled(env::var(DEBUG_ENV).ok().as_deref()),
            ..Self::default()
        }
    }

    /// Integration base URL for a service: `<api base>/<service>`.
    pub fn service_url(&self, service_name: &str) -> String {
        format!("{}/{}", self.api_base_url.trim_end_matches('/'), service_name)
    }

    /// Human-facing URL of the web app, without the trailing slash.
    pub fn web_display_url(&self) -> &str {
        self.web_root_url.trim_end_matches('/')
    }
}

fn debug_enabled(raw: Option<&str>) -> bool {
    raw == Some("true")
}

/// Paths and platform for one installer run.
#[derive(Debug, Clone)]
pub struct InstallContext {
    pub home: PathBuf,
    pub web_app_dir: PathBuf,
    pub integration_dir: PathBuf,
    pub host_config_path: PathBuf,
    pub os: Os,
    pub settings: Settings,
}

impl InstallContext {
    pub fn detect(settings: Settings) -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
        let config_dir = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
        Ok(Self::new(home, config_dir, Os::current(), settings))
    }

    pub fn new(home: PathBuf, config_dir: PathBuf, os: Os, settings: Settings) -> Self {
        Self {
            web_app_dir: home.join(WEB_APP_DIR_NAME),
            integration_dir: home.join(INTEGRATION_DIR_NAME),
            host_config_path: config_dir.join("Claude").join(HOST_CONFIG_FILE),
            home,
            os,
            settings,
        }
    }

    /// Absolute path of the built integration server entry point.
    pub fn integration_entry_point(&self) -> PathBuf {
        self.integration_dir.join(&self.settings.integration_entry_point)
    }
}
