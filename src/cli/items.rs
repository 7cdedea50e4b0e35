//! CLI `get`, `put` and `delete` commands.

use anyhow::Result;

use agent_memstore::config::MemstoreConfig;

use super::{format_namespace, open_store, parse_namespace, parse_object};

pub fn get(config: &MemstoreConfig, namespace: &str, key: &str) -> Result<()> {
    let store = open_store(config)?;
    match store.get(&parse_namespace(namespace), key) {
        Some(item) => println!("{}", serde_json::to_string_pretty(&item)?),
        None => println!("not found"),
    }
    Ok(())
}

pub fn put(config: &MemstoreConfig, namespace: &str, key: &str, value: &str) -> Result<()> {
    let value = parse_object(value, "value")?;
    let namespace = parse_namespace(namespace);
    let mut store = open_store(config)?;
    store.put(namespace.clone(), key, value)?;
    println!("stored {}/{key}", format_namespace(&namespace));
    Ok(())
}

pub fn delete(config: &MemstoreConfig, namespace: &str, key: &str) -> Result<()> {
    let namespace = parse_namespace(namespace);
    let mut store = open_store(config)?;
    store.delete(namespace.clone(), key)?;
    println!("deleted {}/{key}", format_namespace(&namespace));
    Ok(())
}
