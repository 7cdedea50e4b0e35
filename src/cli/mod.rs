pub mod doctor;
pub mod items;
pub mod search;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use agent_memstore::config::MemstoreConfig;
use agent_memstore::{Namespace, Store};

/// Separator between namespace segments on the command line (`users.alice`).
const CLI_SEPARATOR: &str = ".";

/// Split a dotted namespace argument into segments. Empty input is the root.
pub fn parse_namespace(arg: &str) -> Namespace {
    if arg.is_empty() {
        return Vec::new();
    }
    arg.split(CLI_SEPARATOR).map(str::to_string).collect()
}

pub fn format_namespace(namespace: &[String]) -> String {
    namespace.join(CLI_SEPARATOR)
}

/// Parse a JSON argument that must be an object.
pub fn parse_object(arg: &str, what: &str) -> Result<Map<String, Value>> {
    let value: Value =
        serde_json::from_str(arg).with_context(|| format!("{what} is not valid JSON"))?;
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("{what} must be a JSON object, got {other}"),
    }
}

pub fn open_store(config: &MemstoreConfig) -> Result<Store> {
    let db_path = config.resolved_db_path();
    let store = config
        .open_store()
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;
    Ok(store)
}
