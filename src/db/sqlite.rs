// SqliteDatabase: rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across .await points.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{AnalysisRun, ChatGroup, ChatStructure, Topic, TopicDraft};
use super::queries;
use super::traits::Database;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn load_structure(&self) -> Result<ChatStructure> {
        let conn = self.conn.lock().await;
        queries::load_structure(&conn)
    }

    async fn get_group(&self, group_id: &str) -> Result<Option<ChatGroup>> {
        let conn = self.conn.lock().await;
        queries::get_group(&conn, group_id)
    }

    async fn get_topic(&self, topic_id: &str) -> Result<Option<Topic>> {
        let conn = self.conn.lock().await;
        queries::get_topic(&conn, topic_id)
    }

    async fn save_analysis(
        &self,
        group_name: &str,
        description: &str,
        replace: bool,
        drafts: &[TopicDraft],
    ) -> Result<(ChatGroup, Vec<Topic>)> {
        let conn = self.conn.lock().await;
        queries::save_analysis(&conn, group_name, description, replace, drafts)
    }

    async fn import_structure(&self, structure: &ChatStructure) -> Result<usize> {
        let conn = self.conn.lock().await;
        queries::import_structure(&conn, structure)
    }

    async fn update_first_summary(&self, topic_id: &str, summary: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::update_first_summary(&conn, topic_id, summary)
    }

    async fn set_related_topics(&self, topic_id: &str, related: &[String]) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::set_related_topics(&conn, topic_id, related)
    }

    async fn delete_group(&self, group_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::delete_group(&conn, group_id)
    }

    async fn delete_all(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        queries::delete_all(&conn)
    }

    async fn record_run(
        &self,
        group_name: &str,
        group_id: Option<&str>,
        record_count: u32,
        topic_count: u32,
        outcome: &str,
        error: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::record_run(
            &conn,
            group_name,
            group_id,
            record_count,
            topic_count,
            outcome,
            error,
        )
    }

    async fn recent_runs(&self, limit: u32) -> Result<Vec<AnalysisRun>> {
        let conn = self.conn.lock().await;
        queries::recent_runs(&conn, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Priority;
    use crate::db::schema::create_tables;

    async fn test_db() -> SqliteDatabase {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        SqliteDatabase::new(conn)
    }

    fn draft(name: &str) -> TopicDraft {
        TopicDraft {
            topic_name: name.to_string(),
            priority: Priority::Medium,
            summaries: vec![],
            related_records: vec![],
            related_topics: vec![],
        }
    }

    #[tokio::test]
    async fn test_trait_table_count() {
        let db = test_db().await;
        assert_eq!(db.table_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_trait_save_and_load() {
        let db = test_db().await;
        let (group, topics) = db
            .save_analysis("standup", "", false, &[draft("energy"), draft("policy")])
            .await
            .unwrap();
        assert_eq!(topics.len(), 2);

        let structure = db.load_structure().await.unwrap();
        assert_eq!(structure.chat_groups.len(), 1);
        assert_eq!(structure.chat_groups[0].group_id, group.group_id);
        assert_eq!(structure.topic_count(), 2);
    }

    #[tokio::test]
    async fn test_trait_delete_group_and_all() {
        let db = test_db().await;
        db.save_analysis("a", "", false, &[draft("x")]).await.unwrap();
        db.save_analysis("b", "", false, &[draft("y")]).await.unwrap();

        assert!(db.delete_group("group_001").await.unwrap());
        assert!(!db.delete_group("group_001").await.unwrap());
        assert!(db.get_topic("topic_001_01").await.unwrap().is_none());

        assert_eq!(db.delete_all().await.unwrap(), 1);
        assert!(db.load_structure().await.unwrap().chat_groups.is_empty());
    }

    #[tokio::test]
    async fn test_trait_related_topics() {
        let db = test_db().await;
        db.save_analysis("a", "", false, &[draft("x")]).await.unwrap();
        assert!(db
            .set_related_topics("topic_001_01", &["y".to_string()])
            .await
            .unwrap());
        let topic = db.get_topic("topic_001_01").await.unwrap().unwrap();
        assert_eq!(topic.related_topics, vec!["y"]);
    }
}
