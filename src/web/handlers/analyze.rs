// POST /api/analyze: submit chat records for topic analysis.
//
// Body: { group_name, description?, replace_existing?, text? | file? }
// where file is { file_name, data_base64 }. Exactly one of text/file.
//
// Returns 200 with the stored group and the new topics exactly as the
// service produced them. 409 if another analysis is running.

use axum::extract::State;
use axum::Json;
use base64::Engine;
use serde::Deserialize;

use crate::error::TopicalError;
use crate::session::{Submission, SubmissionContent, SubmissionOutcome};
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadedFile {
    pub file_name: String,
    pub data_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub group_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub replace_existing: bool,
    pub text: Option<String>,
    pub file: Option<UploadedFile>,
}

impl AnalyzeRequest {
    fn into_submission(self) -> Result<Submission, TopicalError> {
        let content = match (self.text, self.file) {
            (Some(text), None) => SubmissionContent::Text(text),
            (None, Some(file)) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(file.data_base64.trim())
                    .map_err(|e| {
                        TopicalError::Validation(format!("file data is not valid base64: {e}"))
                    })?;
                SubmissionContent::Document {
                    file_name: file.file_name,
                    bytes,
                }
            }
            (Some(_), Some(_)) => {
                return Err(TopicalError::Validation(
                    "send either text or a file, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(TopicalError::Validation(
                    "nothing to analyse: send text or a file".to_string(),
                ))
            }
        };

        Ok(Submission {
            group_name: self.group_name,
            description: self.description,
            content,
            replace_existing: self.replace_existing,
        })
    }
}

pub async fn submit(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<SubmissionOutcome>, TopicalError> {
    let submission = body.into_submission()?;
    let outcome = state.session.submit(submission).await?;
    Ok(Json(outcome))
}
