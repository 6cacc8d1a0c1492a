//! CLI argument parsing.
//!
//! The parser only selects a workflow; every decision after that happens at
//! the interactive prompts.
use clap::Parser;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "create-df-mcp",
    version,
    about = "Install DreamFactory locally and connect it to Claude Desktop",
    after_help = "Examples:\n  create-df-mcp\n  create-df-mcp --manual-api-key\n  create-df-mcp --uninstall\n\nSet DEBUG_DF_INSTALLER=true to echo HTTP responses while waiting for DreamFactory.\nSet RUST_LOG=debug for command and request logs on stderr."
)]
pub struct RootArgs {
    /// Remove DreamFactory containers, workspaces and the Claude Desktop entry
    #[arg(long)]
    pub uninstall: bool,

    /// Skip the demo API offer and enter an existing API key
    #[arg(long, conflicts_with = "uninstall")]
    pub manual_api_key: bool,
}
