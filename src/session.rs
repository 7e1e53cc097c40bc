// Session host: the core of the analysis session, independent of HTTP.
//
// Holds the loaded configuration, the analysis client and the store, and
// runs one analysis at a time. The web handlers and the CLI both drive it.
//
// A second submission while one is running gets `Busy` immediately rather
// than queueing. Request-level failures come back as `TopicalError` values;
// nothing here stops the process.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::analysis::{AnalysisRequest, ReportContext, ReportKind, TopicAnalyzer};
use crate::config::Config;
use crate::db::models::{ChatGroup, Topic};
use crate::db::Database;
use crate::error::TopicalError;
use crate::output::export::write_report_file;
use crate::records;
use crate::topics;
use crate::topics::graph::{link_related, LinkOutcome, TopicGraph};
use crate::topics::search::{SearchQuery, SearchResults};

/// Live analysis status, exposed via GET /api/status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStatus {
    /// True while an analysis is in progress.
    pub running: bool,
    /// Group being analysed right now.
    pub group_name: Option<String>,
    pub started_at: Option<String>,
    /// Message from the last failed analysis; cleared on success.
    pub last_error: Option<String>,
    pub last_completed_at: Option<String>,
    /// Analyses finished successfully since startup.
    pub completed: u64,
}

#[derive(Debug, Clone)]
pub enum SubmissionContent {
    /// Pasted text, one record per line.
    Text(String),
    /// An uploaded document; the extension picks the reader.
    Document { file_name: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub group_name: String,
    pub description: String,
    pub content: SubmissionContent,
    /// Drop the group's stored topics instead of appending to them.
    pub replace_existing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub group: ChatGroup,
    /// Topics added by this submission, as the service returned them.
    pub new_topics: Vec<Topic>,
    pub record_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub topic_id: String,
    pub kind: ReportKind,
    pub content: String,
    pub exported_to: Option<PathBuf>,
}

pub struct SessionHost {
    config: Arc<Config>,
    analyzer: Arc<dyn TopicAnalyzer>,
    db: Arc<dyn Database>,
    gate: Mutex<()>,
    status: RwLock<SessionStatus>,
}

impl SessionHost {
    pub fn new(config: Arc<Config>, analyzer: Arc<dyn TopicAnalyzer>, db: Arc<dyn Database>) -> Self {
        Self {
            config,
            analyzer,
            db,
            gate: Mutex::new(()),
            status: RwLock::new(SessionStatus::default()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub fn analyzer(&self) -> &dyn TopicAnalyzer {
        self.analyzer.as_ref()
    }

    pub async fn status(&self) -> SessionStatus {
        self.status.read().await.clone()
    }

    /// Parse, analyse and store one submission.
    pub async fn submit(
        &self,
        mut submission: Submission,
    ) -> Result<SubmissionOutcome, TopicalError> {
        let _running = self.gate.try_lock().map_err(|_| TopicalError::Busy)?;
        submission.group_name = submission.group_name.trim().to_string();

        {
            let mut status = self.status.write().await;
            status.running = true;
            status.group_name = Some(submission.group_name.clone());
            status.started_at = Some(Utc::now().to_rfc3339());
        }

        let result = self.run_submission(&submission).await;

        {
            let mut status = self.status.write().await;
            status.running = false;
            status.group_name = None;
            match &result {
                Ok(_) => {
                    status.last_error = None;
                    status.last_completed_at = Some(Utc::now().to_rfc3339());
                    status.completed += 1;
                }
                Err(e) => status.last_error = Some(e.to_string()),
            }
        }

        let (group_id, records, topics, outcome, error) = match &result {
            Ok(o) => (
                Some(o.group.group_id.as_str()),
                o.record_count,
                o.new_topics.len(),
                "ok",
                None,
            ),
            Err(e) => (None, 0, 0, e.kind(), Some(e.to_string())),
        };
        if let Err(e) = self
            .db
            .record_run(
                &submission.group_name,
                group_id,
                records as u32,
                topics as u32,
                outcome,
                error.as_deref(),
            )
            .await
        {
            warn!(error = %e, "Failed to record analysis run");
        }

        result
    }

    async fn run_submission(
        &self,
        submission: &Submission,
    ) -> Result<SubmissionOutcome, TopicalError> {
        let records = match &submission.content {
            SubmissionContent::Text(text) => records::from_text(text),
            SubmissionContent::Document { file_name, bytes } => {
                records::from_document(file_name, bytes)?
            }
        };

        let existing = if submission.replace_existing {
            Vec::new()
        } else {
            let structure = self.db.load_structure().await.map_err(TopicalError::storage)?;
            topics::existing_topics(&structure, &submission.group_name)
        };

        let request = AnalysisRequest {
            group_name: submission.group_name.clone(),
            description: submission.description.trim().to_string(),
            records,
            existing_topics: existing,
        };
        request.validate()?;

        info!(
            group = %request.group_name,
            records = request.records.len(),
            existing = request.existing_topics.len(),
            "Submitting analysis"
        );
        let result = self.analyzer.analyze(&request).await?;

        let (group, new_topics) = self
            .db
            .save_analysis(
                &request.group_name,
                &request.description,
                submission.replace_existing,
                &result.topics,
            )
            .await
            .map_err(TopicalError::storage)?;

        Ok(SubmissionOutcome {
            group,
            new_topics,
            record_count: request.records.len(),
        })
    }

    /// Generate a report for a stored topic, optionally writing it to
    /// the reports directory.
    pub async fn report(
        &self,
        topic_id: &str,
        kind: ReportKind,
        export: bool,
    ) -> Result<ReportOutcome, TopicalError> {
        let structure = self.db.load_structure().await.map_err(TopicalError::storage)?;
        let (group, topic) = structure
            .find_topic(topic_id)
            .ok_or_else(|| TopicalError::NotFound(format!("topic {topic_id}")))?;

        let content = self
            .analyzer
            .write_report(&ReportContext::new(group, topic), kind)
            .await?;

        let exported_to = if export {
            let path = write_report_file(&self.config.reports_dir, topic, kind, &content)
                .map_err(TopicalError::storage)?;
            info!(path = %path.display(), "Report exported");
            Some(path)
        } else {
            None
        };

        Ok(ReportOutcome {
            topic_id: topic_id.to_string(),
            kind,
            content,
            exported_to,
        })
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResults, TopicalError> {
        let structure = self.db.load_structure().await.map_err(TopicalError::storage)?;
        topics::search::search(Some(self.analyzer.as_ref()), &structure, query).await
    }

    pub async fn graph(&self, group_id: Option<&str>) -> Result<TopicGraph, TopicalError> {
        let structure = self.db.load_structure().await.map_err(TopicalError::storage)?;
        Ok(TopicGraph::build(&structure, group_id))
    }

    /// Add `related_name` to a topic's related topics. Linking twice is a no-op.
    pub async fn link_topics(&self, topic_id: &str, related_name: &str) -> Result<Topic, TopicalError> {
        let structure = self.db.load_structure().await.map_err(TopicalError::storage)?;
        if let LinkOutcome::Added(related) = link_related(&structure, topic_id, related_name)? {
            self.db
                .set_related_topics(topic_id, &related)
                .await
                .map_err(TopicalError::storage)?;
        }
        self.topic(topic_id).await
    }

    /// Replace the first summary of a topic.
    pub async fn update_summary(&self, topic_id: &str, summary: &str) -> Result<Topic, TopicalError> {
        if summary.trim().is_empty() {
            return Err(TopicalError::Validation(
                "summary must not be empty".to_string(),
            ));
        }
        let updated = self
            .db
            .update_first_summary(topic_id, summary)
            .await
            .map_err(TopicalError::storage)?;
        if !updated {
            return Err(TopicalError::NotFound(format!("topic {topic_id}")));
        }
        self.topic(topic_id).await
    }

    async fn topic(&self, topic_id: &str) -> Result<Topic, TopicalError> {
        self.db
            .get_topic(topic_id)
            .await
            .map_err(TopicalError::storage)?
            .ok_or_else(|| TopicalError::NotFound(format!("topic {topic_id}")))
    }
}
