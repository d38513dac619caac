use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analysis::extract::extract_text;
use crate::analysis::schema::{AnalysisResult, ErrorCode};
use crate::errors::AppError;
use crate::state::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub resume_text: String,
    #[serde(default)]
    pub job_description: Option<String>,
}

/// An empty job description means "no job matching"; a whitespace-only one is an input error.
fn job_description(raw: Option<String>) -> Option<String> {
    raw.filter(|jd| !jd.is_empty())
}

fn status_for(result: &AnalysisResult) -> StatusCode {
    if result.is_success() {
        return StatusCode::OK;
    }
    match result.error_code {
        Some(ErrorCode::EmptyInput) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

async fn run_analysis(
    state: &AppState,
    resume_text: &str,
    job_description: Option<&str>,
) -> (StatusCode, Json<AnalysisResult>) {
    let request_id = Uuid::new_v4();
    let span = info_span!("analysis", %request_id);
    let result = state
        .orchestrator
        .analyze(resume_text, job_description)
        .instrument(span)
        .await;
    (status_for(&result), Json(result))
}

/// POST /api/v1/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> (StatusCode, Json<AnalysisResult>) {
    let jd = job_description(req.job_description);
    run_analysis(&state, &req.resume_text, jd.as_deref()).await
}

/// POST /api/v1/analyze/file
pub async fn handle_analyze_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AnalysisResult>), AppError> {
    let mut upload: Option<(String, Bytes)> = None;
    let mut jd: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                upload = Some((filename, data));
            }
            "job_description" => {
                jd = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let (filename, data) =
        upload.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    info!(filename = %filename, bytes = data.len(), "Extracting uploaded resume");
    let resume_text = extract_text(&filename, data).await?;

    let jd = job_description(jd);
    Ok(run_analysis(&state, &resume_text, jd.as_deref()).await)
}

/// DELETE /api/v1/cache
pub async fn handle_clear_cache(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let expected = state
        .config
        .admin_token
        .as_deref()
        .ok_or(AppError::Forbidden)?;
    let provided = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        return Err(AppError::Unauthorized);
    }

    state
        .cache
        .clear()
        .await
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?;
    warn!(backend = state.cache.name(), "Cache cleared by admin request");
    Ok(StatusCode::NO_CONTENT)
}
