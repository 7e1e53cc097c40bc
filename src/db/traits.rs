// Database trait: async interface over the topic store.
//
// Implementor: SqliteDatabase (wraps rusqlite behind a tokio Mutex).
// The web handlers and session host hold an `Arc<dyn Database>`, so tests can
// swap in an in-memory store without touching callers.
//
// The trait mirrors the free functions in queries.rs one-to-one.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{AnalysisRun, ChatGroup, ChatStructure, Topic, TopicDraft};

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Reading ---

    /// Every group with its topics.
    async fn load_structure(&self) -> Result<ChatStructure>;

    async fn get_group(&self, group_id: &str) -> Result<Option<ChatGroup>>;

    async fn get_topic(&self, topic_id: &str) -> Result<Option<Topic>>;

    // --- Writing ---

    /// Store one analysis result. Returns the group and the topics just added.
    async fn save_analysis(
        &self,
        group_name: &str,
        description: &str,
        replace: bool,
        drafts: &[TopicDraft],
    ) -> Result<(ChatGroup, Vec<Topic>)>;

    /// Replace everything with an imported structure. Returns the group count.
    async fn import_structure(&self, structure: &ChatStructure) -> Result<usize>;

    async fn update_first_summary(&self, topic_id: &str, summary: &str) -> Result<bool>;

    async fn set_related_topics(&self, topic_id: &str, related: &[String]) -> Result<bool>;

    async fn delete_group(&self, group_id: &str) -> Result<bool>;

    async fn delete_all(&self) -> Result<usize>;

    // --- Analysis history ---

    async fn record_run(
        &self,
        group_name: &str,
        group_id: Option<&str>,
        record_count: u32,
        topic_count: u32,
        outcome: &str,
        error: Option<&str>,
    ) -> Result<i64>;

    async fn recent_runs(&self, limit: u32) -> Result<Vec<AnalysisRun>>;
}
