//! CLI `doctor` command: database diagnostics and a health report.

use anyhow::{Context, Result};

use agent_memstore::config::MemstoreConfig;
use agent_memstore::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &MemstoreConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `memstore put` to create it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    let conn = db::open_database(&db_path)
        .context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn)
        .context("failed to run health check")?;

    let loaded = db::rows::load_all(&conn).context("failed to read stored rows")?;

    println!("Memstore Health Report");
    println!("======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!();
    println!("Row counts:");
    println!("  Items:           {}", report.item_count);
    println!("  Vectors:         {}", report.vector_count);
    println!("  Namespaces:      {}", report.namespace_count);
    println!("  Undecodable:     {}", loaded.skipped);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
    }

    if loaded.skipped > 0 {
        println!();
        println!("{} row(s) could not be decoded and are ignored on load.", loaded.skipped);
        println!("Rewriting those keys with `memstore put` replaces them.");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit + 1 < UNITS.len() {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}
