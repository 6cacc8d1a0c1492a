//! The desktop application's MCP configuration document.
//!
//! Only one key inside `mcpServers` belongs to this tool. Every other key in
//! the document, inside `mcpServers` or not, must survive a read-modify-write
//! unchanged.
use crate::util::write_atomic;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

const SERVERS_KEY: &str = "mcpServers";

/// One subprocess-based integration entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerEntry {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    root: Map<String, Value>,
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: HostConfig,
    /// The file existed but was not a JSON object and was replaced by an
    /// empty document.
    pub recovered: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        let mut root = Map::new();
        root.insert(SERVERS_KEY.to_string(), Value::Object(Map::new()));
        Self { root }
    }
}

impl HostConfig {
    /// Parse a document, returning `None` when it is not a JSON object.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(root)) => Some(Self { root }),
            _ => None,
        }
    }

    /// Load from disk. A missing file and an unparseable file both yield an
    /// empty document; any other I/O failure is an error.
    pub fn load(path: &Path) -> Result<LoadedConfig> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(LoadedConfig {
                    config: Self::default(),
                    recovered: false,
                })
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read {}", path.display()));
            }
        };
        match Self::parse(&text) {
            Some(config) => Ok(LoadedConfig {
                config,
                recovered: false,
            }),
            None => {
                tracing::warn!(path = %path.display(), "host config is not a JSON object");
                Ok(LoadedConfig {
                    config: Self::default(),
                    recovered: true,
                })
            }
        }
    }

    pub fn has_entry(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    pub fn entry(&self, name: &str) -> Option<&Value> {
        self.servers().and_then(|servers| servers.get(name))
    }

    /// Insert or replace `name`, creating `mcpServers` if needed.
    pub fn upsert_entry(&mut self, name: &str, entry: &McpServerEntry) -> Result<()> {
        let value = serde_json::to_value(entry).context("serialize server entry")?;
        let servers = self
            .root
            .entry(SERVERS_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        if !servers.is_object() {
            tracing::warn!("replacing non-object {SERVERS_KEY} value");
            *servers = Value::Object(Map::new());
        }
        if let Value::Object(servers) = servers {
            servers.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Remove `name`; returns whether it was present.
    pub fn remove_entry(&mut self, name: &str) -> bool {
        match self.root.get_mut(SERVERS_KEY) {
            Some(Value::Object(servers)) => servers.remove(name).is_some(),
            _ => false,
        }
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        let mut text =
            serde_json::to_string_pretty(&self.root).context("serialize host config")?;
        text.push('\n');
        Ok(text)
    }

    /// Write the whole document, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = self.to_pretty_json()?;
        write_atomic(path, text.as_bytes())
    }

    fn servers(&self) -> Option<&Map<String, Value>> {
        self.root.get(SERVERS_KEY).and_then(Value::as_object)
    }
}
