use anyhow::Result;

use agent_memstore::config::MemstoreConfig;
use agent_memstore::store::types::DEFAULT_LIST_LIMIT;
use agent_memstore::{ListNamespacesOp, SearchOp};

use super::{format_namespace, open_store, parse_namespace, parse_object};

/// List items under a namespace prefix, optionally filtered. Unscored.
pub fn search(
    config: &MemstoreConfig,
    prefix: &str,
    filter: Option<&str>,
    limit: Option<usize>,
    offset: usize,
) -> Result<()> {
    let mut op = SearchOp::new(parse_namespace(prefix))
        .with_limit(limit.unwrap_or(config.search.default_limit))
        .with_offset(offset);
    if let Some(filter) = filter {
        op = op.with_filter(parse_object(filter, "filter")?);
    }

    let store = open_store(config)?;
    let results = store.search(op)?;

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} item(s)\n", results.len());
    for (i, result) in results.iter().enumerate() {
        let item = &result.item;
        println!(
            "  {}. {}/{} (updated: {})",
            i + 1 + offset,
            format_namespace(&item.namespace),
            item.key,
            item.updated_at.to_rfc3339(),
        );
        println!("     {}", serde_json::to_string(&item.value)?);
        println!();
    }

    Ok(())
}

pub struct NamespaceArgs {
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub max_depth: Option<usize>,
    pub limit: Option<usize>,
    pub offset: usize,
}

pub fn namespaces(config: &MemstoreConfig, args: NamespaceArgs) -> Result<()> {
    let mut op = ListNamespacesOp::new()
        .with_limit(args.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .with_offset(args.offset);
    if let Some(prefix) = &args.prefix {
        op = op.with_prefix(parse_namespace(prefix));
    }
    if let Some(suffix) = &args.suffix {
        op = op.with_suffix(parse_namespace(suffix));
    }
    if let Some(depth) = args.max_depth {
        op = op.with_max_depth(depth);
    }

    let store = open_store(config)?;
    for namespace in store.list_namespaces(&op) {
        println!("{}", format_namespace(&namespace));
    }
    Ok(())
}
