// System status display: configuration summary, store size and recent runs.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::output::terminal::display_runs;

/// Display system status to the terminal. Never prints the API key itself.
/// `db` is None when the database file doesn't exist yet.
pub async fn show(config: &Config, db: Option<&Arc<dyn Database>>) -> Result<()> {
    println!("Analysis service: {}", config.base_url);
    println!("Model: {}", config.model);
    match &config.api_key {
        Some(key) => println!("API key: configured ({})", key.redacted()),
        None => {
            println!("API key: not configured");
            println!("  Set TOPICAL_API_KEY or add api_key to {}", config.config_path.display());
        }
    }
    println!("Request timeout: {}s", config.request_timeout.as_secs());

    let Some(db) = db.filter(|_| Path::new(&config.db_path).exists()) else {
        println!("Database: not initialized");
        println!("\nRun `topical init` to set up the database.");
        return Ok(());
    };

    let file_size = std::fs::metadata(&config.db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", config.db_path, file_size);

    let structure = db.load_structure().await?;
    println!(
        "Stored: {} groups, {} topics",
        structure.chat_groups.len(),
        structure.topic_count()
    );

    let runs = db.recent_runs(5).await?;
    if runs.is_empty() {
        println!("Analyses: none run yet");
    } else {
        display_runs(&runs);
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
