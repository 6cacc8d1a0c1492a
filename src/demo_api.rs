//! Demo database API provisioning against the local REST API.
//!
//! Logs in as the administrator, then creates (or reuses) a database service,
//! a role scoped to it, and an API-key application bound to that role. The
//! caller treats any failure here as "no demo API" rather than a fatal error.
use crate::http::{HttpRequest, HttpTransport};
use crate::settings::Settings;
use crate::util::now_epoch_ms;
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::time::Duration;

pub const SESSION_HEADER: &str = "X-DreamFactory-Session-Token";

const VERB_GET: u32 = 1;
const VERB_POST: u32 = 2;
const VERB_PUT: u32 = 4;
const VERB_PATCH: u32 = 8;
const VERB_DELETE: u32 = 16;
/// Create, read, update, patch and delete. Demo-grade, not a security model.
pub const DEMO_VERB_MASK: u32 = VERB_GET | VERB_POST | VERB_PUT | VERB_PATCH | VERB_DELETE;
const REQUESTOR_API: u32 = 1;
/// Application type that authenticates with an API key only.
const APP_TYPE_API_KEY: u32 = 0;

#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoApi {
    pub api_key: String,
    pub service_name: String,
}

/// Run the whole provisioning sequence.
pub fn provision(
    settings: &Settings,
    http: &dyn HttpTransport,
    credentials: &AdminCredentials,
) -> Result<DemoApi> {
    let base = settings.api_base_url.trim_end_matches('/').to_string();
    let token = login(http, &base, settings.api_timeout, credentials)?;
    let session = Session {
        http,
        base,
        timeout: settings.api_timeout,
        token,
    };

    let service_name = settings.demo_service_name.as_str();
    let service_id = session.ensure_service(service_name)?;
    let stamp = now_epoch_ms();
    let role_id = session.create_role(service_id, stamp)?;
    let app = session.create_app(role_id, stamp)?;
    let api_key = session.extract_api_key(&app)?;

    tracing::info!(service_id, role_id, "demo api provisioned");
    Ok(DemoApi {
        api_key,
        service_name: service_name.to_string(),
    })
}

fn login(
    http: &dyn HttpTransport,
    base: &str,
    timeout: Duration,
    credentials: &AdminCredentials,
) -> Result<String> {
    let request = HttpRequest::post(
        format!("{base}/system/admin/session"),
        json!({
            "email": credentials.email,
            "password": credentials.password,
        }),
        timeout,
    );
    let body = http
        .send(&request)
        .context("log in to DreamFactory")?
        .require_success("login")?;
    string_field(&body, "session_token")
        .or_else(|| string_field(&body, "sessionToken"))
        .ok_or_else(|| anyhow!("login response did not include a session token"))
}

/// Authenticated calls made with one session token.
struct Session<'a> {
    http: &'a dyn HttpTransport,
    base: String,
    timeout: Duration,
    token: String,
}

impl Session<'_> {
    fn get(&self, path: &str, what: &str) -> Result<Value> {
        let request = HttpRequest::get(format!("{}{path}", self.base), self.timeout)
            .header(SESSION_HEADER, &self.token);
        self.http
            .send(&request)
            .with_context(|| format!("{what} request"))?
            .require_success(what)
    }

    fn post(&self, path: &str, body: Value, what: &str) -> Result<Value> {
        let request = HttpRequest::post(format!("{}{path}", self.base), body, self.timeout)
            .header(SESSION_HEADER, &self.token);
        self.http
            .send(&request)
            .with_context(|| format!("{what} request"))?
            .require_success(what)
    }

    /// Reuse the service named `name` if it exists, otherwise create it.
    fn ensure_service(&self, name: &str) -> Result<i64> {
        let existing = self.get(
            &format!("/system/service?filter=name%3D{name}"),
            "service lookup",
        )?;
        if let Some(id) = first_resource(&existing).and_then(|entry| id_field(entry.get("id"))) {
            tracing::info!(service_id = id, name, "reusing existing service");
            return Ok(id);
        }

        let created = self.post("/system/service", service_payload(name), "service creation")?;
        created_id(&created).ok_or_else(|| anyhow!("service creation returned no id"))
    }

    fn create_role(&self, service_id: i64, stamp: u128) -> Result<i64> {
        let created = self.post(
            "/system/role",
            role_payload(service_id, stamp),
            "role creation",
        )?;
        created_id(&created).ok_or_else(|| anyhow!("role creation returned no id"))
    }

    fn create_app(&self, role_id: i64, stamp: u128) -> Result<Value> {
        self.post(
            "/system/app?fields=*",
            app_payload(role_id, stamp),
            "app creation",
        )
    }

    /// Look for the key at the top level, then in the first resource, then
    /// ask the app detail endpoint.
    fn extract_api_key(&self, created: &Value) -> Result<String> {
        if let Some(key) = string_field(created, "api_key") {
            return Ok(key);
        }
        let first = first_resource(created);
        if let Some(key) = first.and_then(|entry| string_field(entry, "api_key")) {
            return Ok(key);
        }

        let app_id = id_field(created.get("id"))
            .or_else(|| first.and_then(|entry| id_field(entry.get("id"))))
            .ok_or_else(|| anyhow!("app creation returned neither an API key nor an app id"))?;
        let detail = self.get(
            &format!("/system/app/{app_id}?fields=api_key"),
            "app lookup",
        )?;
        string_field(&detail, "api_key")
            .or_else(|| first_resource(&detail).and_then(|entry| string_field(entry, "api_key")))
            .ok_or_else(|| anyhow!("no API key returned for app {app_id}"))
    }
}

fn service_payload(name: &str) -> Value {
    json!({
        "resource": [{
            "name": name,
            "label": "Demo Database",
            "description": "Demo MySQL database for the DreamFactory MCP server",
            "is_active": true,
            "type": "mysql",
            "config": {
                "host": "mysql",
                "port": 3306,
                "database": "dreamfactory",
                "username": "df_admin",
                "password": "df_admin",
                "schema": "dreamfactory",
                "max_records": 1000
            }
        }]
    })
}

fn role_payload(service_id: i64, stamp: u128) -> Value {
    json!({
        "resource": [{
            "name": format!("mcp-role-{stamp}"),
            "description": "Role for the DreamFactory MCP server",
            "is_active": true,
            "role_service_access_by_role_id": [{
                "service_id": service_id,
                "component": "*",
                "verb_mask": DEMO_VERB_MASK,
                "requestor_mask": REQUESTOR_API,
                "filters": [],
                "filter_op": "AND"
            }]
        }]
    })
}

fn app_payload(role_id: i64, stamp: u128) -> Value {
    json!({
        "resource": [{
            "name": format!("mcp-app-{stamp}"),
            "description": "API key for the DreamFactory MCP server",
            "type": APP_TYPE_API_KEY,
            "role_id": role_id,
            "is_active": true
        }]
    })
}

fn first_resource(value: &Value) -> Option<&Value> {
    value.get("resource").and_then(|list| list.get(0))
}

fn created_id(value: &Value) -> Option<i64> {
    first_resource(value)
        .and_then(|entry| id_field(entry.get("id")))
        .or_else(|| id_field(value.get("id")))
}

fn id_field(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[path = "demo_api_tests.rs"]
mod tests;
