// Database schema: table creation and migrations.
//
// `schema_version` tracks which migrations have run; each migration is a
// function that executes SQL.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent: safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per analysed conversation
        CREATE TABLE IF NOT EXISTS chat_groups (
            group_id TEXT PRIMARY KEY,         -- group_NNN
            group_name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Topics returned by the analysis service, list fields stored as JSON
        CREATE TABLE IF NOT EXISTS topics (
            topic_id TEXT PRIMARY KEY,         -- topic_NNN_MM
            group_id TEXT NOT NULL REFERENCES chat_groups(group_id) ON DELETE CASCADE,
            position INTEGER NOT NULL,         -- MM part of the id, 1-based
            topic_name TEXT NOT NULL,
            priority TEXT NOT NULL,            -- high / medium / low
            summaries TEXT NOT NULL DEFAULT '[]',
            related_records TEXT NOT NULL DEFAULT '[]',
            related_topics TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_topics_group
            ON topics(group_id, position);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: analysis history, one row per submission.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "CREATE TABLE analysis_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_name TEXT NOT NULL,
                group_id TEXT,
                record_count INTEGER NOT NULL DEFAULT 0,
                topic_count INTEGER NOT NULL DEFAULT 0,
                outcome TEXT NOT NULL,         -- 'ok' or an error kind
                error TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
