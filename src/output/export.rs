// File exports: topic reports as text, the chat structure and single groups
// as JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::analysis::ReportKind;
use crate::db::models::{ChatGroup, ChatStructure, Topic};

/// One group wrapped with the time it was exported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupExport {
    pub export_time: String,
    pub group_data: ChatGroup,
}

impl GroupExport {
    pub fn new(group: ChatGroup) -> Self {
        Self {
            export_time: Local::now().to_rfc3339(),
            group_data: group,
        }
    }
}

/// Report file contents: header, the service's text, end marker.
pub fn render_report(
    topic: &Topic,
    kind: ReportKind,
    content: &str,
    generated_at: DateTime<Local>,
) -> String {
    format!(
        "Topic Analysis Report\n\
         ====================\n\
         \n\
         Generated: {}\n\
         Topic ID: {}\n\
         Topic name: {}\n\
         Report type: {}\n\
         \n\
         {}\n\
         \n\
         --- End of report ---\n",
        generated_at.format("%Y-%m-%d %H:%M:%S"),
        topic.topic_id,
        topic.topic_name,
        kind,
        content.trim_end(),
    )
}

/// Write a report to `{dir}/{topic_id}_{kind}_{YYYYmmdd_HHMMSS}.txt`.
pub fn write_report_file(
    dir: &Path,
    topic: &Topic,
    kind: ReportKind,
    content: &str,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create reports directory {}", dir.display()))?;

    let now = Local::now();
    let path = dir.join(format!(
        "{}_{}_{}.txt",
        topic.topic_id,
        kind,
        now.format("%Y%m%d_%H%M%S")
    ));
    std::fs::write(&path, render_report(topic, kind, content, now))
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(path)
}

/// Write the whole structure as pretty JSON (same shape `read_structure` takes).
pub fn write_structure(path: &Path, structure: &ChatStructure) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(structure)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn read_structure(path: &Path) -> Result<ChatStructure> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut structure: ChatStructure = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a chat structure export", path.display()))?;
    for group in &mut structure.chat_groups {
        for topic in &mut group.topics {
            if topic.group_id.is_empty() {
                topic.group_id = group.group_id.clone();
            }
        }
    }
    Ok(structure)
}
