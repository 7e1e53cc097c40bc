// Database queries: CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{
    format_group_id, format_topic_id, group_number, AnalysisRun, ChatGroup, ChatStructure,
    Priority, Topic, TopicDraft,
};

// --- Reading the structure ---

/// Load every group with its topics, groups in id order, topics by position.
pub fn load_structure(conn: &Connection) -> Result<ChatStructure> {
    let mut stmt = conn.prepare(
        "SELECT group_id, group_name, description, created_at FROM chat_groups ORDER BY group_id",
    )?;
    let mut groups: Vec<ChatGroup> = stmt
        .query_map([], group_from_row)?
        .collect::<rusqlite::Result<_>>()?;

    for group in &mut groups {
        group.topics = topics_for_group(conn, &group.group_id)?;
    }

    Ok(ChatStructure {
        chat_groups: groups,
    })
}

pub fn get_group(conn: &Connection, group_id: &str) -> Result<Option<ChatGroup>> {
    let group = conn
        .query_row(
            "SELECT group_id, group_name, description, created_at FROM chat_groups WHERE group_id = ?1",
            params![group_id],
            group_from_row,
        )
        .optional()?;
    with_topics(conn, group)
}

pub fn find_group_by_name(conn: &Connection, group_name: &str) -> Result<Option<ChatGroup>> {
    let group = conn
        .query_row(
            "SELECT group_id, group_name, description, created_at FROM chat_groups WHERE group_name = ?1",
            params![group_name],
            group_from_row,
        )
        .optional()?;
    with_topics(conn, group)
}

pub fn get_topic(conn: &Connection, topic_id: &str) -> Result<Option<Topic>> {
    let topic = conn
        .query_row(
            "SELECT topic_id, group_id, topic_name, priority, summaries, related_records,
                    related_topics, created_at
             FROM topics WHERE topic_id = ?1",
            params![topic_id],
            topic_from_row,
        )
        .optional()?;
    Ok(topic)
}

fn topics_for_group(conn: &Connection, group_id: &str) -> Result<Vec<Topic>> {
    let mut stmt = conn.prepare(
        "SELECT topic_id, group_id, topic_name, priority, summaries, related_records,
                related_topics, created_at
         FROM topics WHERE group_id = ?1 ORDER BY position",
    )?;
    let topics = stmt
        .query_map(params![group_id], topic_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(topics)
}

fn with_topics(conn: &Connection, group: Option<ChatGroup>) -> Result<Option<ChatGroup>> {
    match group {
        Some(mut g) => {
            g.topics = topics_for_group(conn, &g.group_id)?;
            Ok(Some(g))
        }
        None => Ok(None),
    }
}

// --- Writing analysis results ---

/// Store the topics from one analysis under `group_name`.
///
/// If the group doesn't exist it's created with the next free `group_NNN`
/// id. If it exists and `replace` is set, the old group and its topics are
/// removed first (the new group gets a fresh id); otherwise the new topics
/// are appended after the existing ones. Runs in one transaction.
pub fn save_analysis(
    conn: &Connection,
    group_name: &str,
    description: &str,
    replace: bool,
    drafts: &[TopicDraft],
) -> Result<(ChatGroup, Vec<Topic>)> {
    let tx = conn
        .unchecked_transaction()
        .context("Failed to start transaction")?;

    let mut existing = find_group_by_name(&tx, group_name)?;
    if replace {
        if let Some(old) = existing.take() {
            delete_group(&tx, &old.group_id)?;
        }
    }

    let group_id = match existing {
        Some(group) => group.group_id,
        None => {
            let group_id = format_group_id(next_group_number(&tx)?);
            tx.execute(
                "INSERT INTO chat_groups (group_id, group_name, description) VALUES (?1, ?2, ?3)",
                params![group_id, group_name, description],
            )?;
            group_id
        }
    };

    let mut position = next_topic_position(&tx, &group_id)?;
    let mut inserted = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let topic_id = format_topic_id(&group_id, position);
        tx.execute(
            "INSERT INTO topics (topic_id, group_id, position, topic_name, priority, summaries,
                                 related_records, related_topics)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                topic_id,
                group_id,
                position,
                draft.topic_name,
                draft.priority.as_str(),
                serde_json::to_string(&draft.summaries)?,
                serde_json::to_string(&draft.related_records)?,
                serde_json::to_string(&draft.related_topics)?,
            ],
        )?;
        inserted.push(topic_id);
        position += 1;
    }

    let group = get_group(&tx, &group_id)?
        .with_context(|| format!("Group {group_id} vanished during save"))?;
    tx.commit().context("Failed to commit analysis results")?;

    let new_topics = group
        .topics
        .iter()
        .filter(|t| inserted.contains(&t.topic_id))
        .cloned()
        .collect();
    Ok((group, new_topics))
}

/// Replace the whole stored structure with `structure`, keeping its ids
/// and timestamps.
/// Used by `topical import`.
pub fn import_structure(conn: &Connection, structure: &ChatStructure) -> Result<usize> {
    let tx = conn
        .unchecked_transaction()
        .context("Failed to start transaction")?;
    delete_all(&tx)?;

    for group in &structure.chat_groups {
        tx.execute(
            "INSERT INTO chat_groups (group_id, group_name, description, created_at)
             VALUES (?1, ?2, ?3, COALESCE(NULLIF(?4, ''), datetime('now')))",
            params![group.group_id, group.group_name, group.description, group.created_at],
        )
        .with_context(|| format!("Failed to import group {}", group.group_id))?;

        for (i, topic) in group.topics.iter().enumerate() {
            tx.execute(
                "INSERT INTO topics (topic_id, group_id, position, topic_name, priority, summaries,
                                     related_records, related_topics, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, COALESCE(NULLIF(?9, ''), datetime('now')))",
                params![
                    topic.topic_id,
                    group.group_id,
                    (i + 1) as u32,
                    topic.topic_name,
                    topic.priority.as_str(),
                    serde_json::to_string(&topic.summaries)?,
                    serde_json::to_string(&topic.related_records)?,
                    serde_json::to_string(&topic.related_topics)?,
                    topic.created_at,
                ],
            )
            .with_context(|| format!("Failed to import topic {}", topic.topic_id))?;
        }
    }

    tx.commit().context("Failed to commit import")?;
    Ok(structure.chat_groups.len())
}

fn next_group_number(conn: &Connection) -> Result<u32> {
    let mut stmt = conn.prepare("SELECT group_id FROM chat_groups")?;
    let max = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .filter_map(|id| group_number(&id))
        .max()
        .unwrap_or(0);
    Ok(max + 1)
}

fn next_topic_position(conn: &Connection, group_id: &str) -> Result<u32> {
    let max: Option<u32> = conn.query_row(
        "SELECT MAX(position) FROM topics WHERE group_id = ?1",
        params![group_id],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) + 1)
}

// --- Editing ---

/// Replace the first summary of a topic (or set it if there are none).
/// Returns false if the topic doesn't exist.
pub fn update_first_summary(conn: &Connection, topic_id: &str, summary: &str) -> Result<bool> {
    let Some(mut topic) = get_topic(conn, topic_id)? else {
        return Ok(false);
    };
    match topic.summaries.first_mut() {
        Some(first) => *first = summary.to_string(),
        None => topic.summaries.push(summary.to_string()),
    }
    conn.execute(
        "UPDATE topics SET summaries = ?1 WHERE topic_id = ?2",
        params![serde_json::to_string(&topic.summaries)?, topic_id],
    )?;
    Ok(true)
}

/// Overwrite a topic's related-topic names. Returns false if it doesn't exist.
pub fn set_related_topics(conn: &Connection, topic_id: &str, related: &[String]) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE topics SET related_topics = ?1 WHERE topic_id = ?2",
        params![serde_json::to_string(related)?, topic_id],
    )?;
    Ok(changed > 0)
}

/// Delete one group and its topics. Returns false if it didn't exist.
pub fn delete_group(conn: &Connection, group_id: &str) -> Result<bool> {
    conn.execute("DELETE FROM topics WHERE group_id = ?1", params![group_id])?;
    let changed = conn.execute(
        "DELETE FROM chat_groups WHERE group_id = ?1",
        params![group_id],
    )?;
    Ok(changed > 0)
}

/// Delete every group and topic. Analysis history is kept.
pub fn delete_all(conn: &Connection) -> Result<usize> {
    conn.execute("DELETE FROM topics", [])?;
    let groups = conn.execute("DELETE FROM chat_groups", [])?;
    Ok(groups)
}

// --- Analysis history ---

pub fn record_run(
    conn: &Connection,
    group_name: &str,
    group_id: Option<&str>,
    record_count: u32,
    topic_count: u32,
    outcome: &str,
    error: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO analysis_runs (group_name, group_id, record_count, topic_count, outcome, error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![group_name, group_id, record_count, topic_count, outcome, error],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent analysis runs first.
pub fn recent_runs(conn: &Connection, limit: u32) -> Result<Vec<AnalysisRun>> {
    let mut stmt = conn.prepare(
        "SELECT id, group_name, group_id, record_count, topic_count, outcome, error, created_at
         FROM analysis_runs ORDER BY id DESC LIMIT ?1",
    )?;
    let runs = stmt
        .query_map(params![limit], |row| {
            Ok(AnalysisRun {
                id: row.get(0)?,
                group_name: row.get(1)?,
                group_id: row.get(2)?,
                record_count: row.get(3)?,
                topic_count: row.get(4)?,
                outcome: row.get(5)?,
                error: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(runs)
}

// --- Row mapping ---

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<ChatGroup> {
    Ok(ChatGroup {
        group_id: row.get(0)?,
        group_name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        topics: Vec::new(),
    })
}

fn topic_from_row(row: &Row<'_>) -> rusqlite::Result<Topic> {
    let priority: String = row.get(3)?;
    Ok(Topic {
        topic_id: row.get(0)?,
        group_id: row.get(1)?,
        topic_name: row.get(2)?,
        priority: Priority::from_label(&priority),
        summaries: json_list(row, 4)?,
        related_records: json_list(row, 5)?,
        related_topics: json_list(row, 6)?,
        created_at: row.get(7)?,
    })
}

/// Decode a JSON array column. A corrupt value surfaces as a conversion error.
fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn draft(name: &str, priority: Priority, related: &[&str]) -> TopicDraft {
        TopicDraft {
            topic_name: name.to_string(),
            priority,
            summaries: vec![format!("{name} summary")],
            related_records: vec![format!("10:00 alice: about {name}")],
            related_topics: related.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_save_analysis_assigns_ids() {
        let conn = test_conn();
        let (group, topics) = save_analysis(
            &conn,
            "project",
            "kickoff chat",
            false,
            &[draft("budget", Priority::High, &[]), draft("hiring", Priority::Low, &[])],
        )
        .unwrap();

        assert_eq!(group.group_id, "group_001");
        assert_eq!(group.description, "kickoff chat");
        let ids: Vec<&str> = topics.iter().map(|t| t.topic_id.as_str()).collect();
        assert_eq!(ids, vec!["topic_001_01", "topic_001_02"]);
    }

    #[test]
    fn test_save_analysis_appends_to_existing_group() {
        let conn = test_conn();
        save_analysis(&conn, "project", "", false, &[draft("budget", Priority::High, &[])])
            .unwrap();
        let (group, topics) =
            save_analysis(&conn, "project", "", false, &[draft("venue", Priority::Medium, &[])])
                .unwrap();

        assert_eq!(group.group_id, "group_001");
        assert_eq!(group.topics.len(), 2);
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].topic_id, "topic_001_02");
    }

    #[test]
    fn test_save_analysis_replace_drops_old_topics() {
        let conn = test_conn();
        save_analysis(&conn, "a", "", false, &[draft("x", Priority::High, &[])]).unwrap();
        save_analysis(&conn, "b", "", false, &[draft("y", Priority::High, &[])]).unwrap();
        let (group, _) =
            save_analysis(&conn, "a", "", true, &[draft("z", Priority::Low, &[])]).unwrap();

        assert_eq!(group.group_id, "group_003");
        assert_eq!(group.topics.len(), 1);
        assert_eq!(group.topics[0].topic_name, "z");
        assert!(get_group(&conn, "group_001").unwrap().is_none());
    }

    #[test]
    fn test_group_numbers_not_reused_after_delete_of_earlier_group() {
        let conn = test_conn();
        save_analysis(&conn, "a", "", false, &[]).unwrap();
        save_analysis(&conn, "b", "", false, &[]).unwrap();
        assert!(delete_group(&conn, "group_001").unwrap());
        let (group, _) = save_analysis(&conn, "c", "", false, &[]).unwrap();
        assert_eq!(group.group_id, "group_003");
    }

    #[test]
    fn test_topic_lists_roundtrip_through_json_columns() {
        let conn = test_conn();
        save_analysis(&conn, "g", "", false, &[draft("energy", Priority::High, &["policy"])])
            .unwrap();
        let topic = get_topic(&conn, "topic_001_01").unwrap().unwrap();
        assert_eq!(topic.summaries, vec!["energy summary"]);
        assert_eq!(topic.related_topics, vec!["policy"]);
        assert_eq!(topic.priority, Priority::High);
    }

    #[test]
    fn test_update_first_summary() {
        let conn = test_conn();
        save_analysis(&conn, "g", "", false, &[draft("energy", Priority::High, &[])]).unwrap();
        assert!(update_first_summary(&conn, "topic_001_01", "rewritten").unwrap());
        let topic = get_topic(&conn, "topic_001_01").unwrap().unwrap();
        assert_eq!(topic.summaries, vec!["rewritten"]);
        assert!(!update_first_summary(&conn, "topic_404_01", "x").unwrap());
    }

    #[test]
    fn test_import_replaces_everything() {
        let conn = test_conn();
        save_analysis(&conn, "old", "", false, &[draft("x", Priority::High, &[])]).unwrap();

        let mut structure = load_structure(&conn).unwrap();
        structure.chat_groups[0].group_id = "group_007".to_string();
        structure.chat_groups[0].group_name = "imported".to_string();
        structure.chat_groups[0].topics[0].topic_id = "topic_007_01".to_string();

        assert_eq!(import_structure(&conn, &structure).unwrap(), 1);
        let loaded = load_structure(&conn).unwrap();
        assert_eq!(loaded.chat_groups.len(), 1);
        assert_eq!(loaded.chat_groups[0].group_name, "imported");
        assert!(get_topic(&conn, "topic_007_01").unwrap().is_some());
    }

    #[test]
    fn test_runs_newest_first() {
        let conn = test_conn();
        record_run(&conn, "a", Some("group_001"), 10, 2, "ok", None).unwrap();
        record_run(&conn, "b", None, 3, 0, "service", Some("boom")).unwrap();
        let runs = recent_runs(&conn, 10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].group_name, "b");
        assert_eq!(runs[0].error.as_deref(), Some("boom"));
    }
}
