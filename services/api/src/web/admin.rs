//! services/api/src/web/admin.rs
//!
//! Administrative endpoints: triggering and observing the background
//! question-generation worker, plus bulk question import.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use crate::web::rest::port_error_response;
use crate::web::state::AppState;
use medstudy_core::domain::{Difficulty, NewQuestion, QuestionSource};
use medstudy_core::generation::RunState;

const MIN_QUESTIONS_PER_RUN: u32 = 1;
const MAX_QUESTIONS_PER_RUN: u32 = 100;
const DEFAULT_QUESTIONS_PER_RUN: u32 = 15;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TriggerParams {
    /// Number of questions to generate this run (1-100, default 15).
    pub max_questions: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct GenerationResponse {
    pub message: String,
    pub questions_generated: Option<u32>,
    pub slides_processed: Option<u32>,
    pub last_slide_id: Option<i64>,
    pub status: String,
}

impl GenerationResponse {
    fn bare(message: impl Into<String>, status: &str) -> Self {
        Self {
            message: message.into(),
            questions_generated: None,
            slides_processed: None,
            last_slide_id: None,
            status: status.to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct GenerationStats {
    pub last_run: Option<DateTime<Utc>>,
    pub total_questions_generated: i64,
    pub last_processed_slide_id: i64,
    pub departments_completed: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct QuestionImport {
    pub department: String,
    pub topic: Option<String>,
    pub question_text: String,
    pub correct_answer: String,
    pub distractors: Vec<String>,
    pub explanation: Option<String>,
    /// easy, medium, or hard; unknown values fall back to medium.
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub is_past_paper: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ImportResponse {
    pub message: String,
    pub imported_count: usize,
    pub skipped_count: usize,
    pub status: String,
}

//=========================================================================================
// Generation Handlers
//=========================================================================================

/// POST /admin/generate-questions - Trigger a background generation run.
///
/// The run continues from the persisted cursor (progressive mode) and is
/// rejected with 409 while another run is active.
#[utoipa::path(
    post,
    path = "/admin/generate-questions",
    params(TriggerParams),
    responses(
        (status = 202, description = "Generation started", body = GenerationResponse),
        (status = 400, description = "max_questions out of range"),
        (status = 409, description = "A run is already active")
    )
)]
pub async fn trigger_generation_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TriggerParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let max_questions = params.max_questions.unwrap_or(DEFAULT_QUESTIONS_PER_RUN);
    if !(MIN_QUESTIONS_PER_RUN..=MAX_QUESTIONS_PER_RUN).contains(&max_questions) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "max_questions must be between {MIN_QUESTIONS_PER_RUN} and {MAX_QUESTIONS_PER_RUN}"
            ),
        ));
    }

    state
        .coordinator
        .start(max_questions)
        .await
        .map_err(port_error_response)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerationResponse::bare(
            format!("Question generation started for {max_questions} questions"),
            "started",
        )),
    ))
}

/// GET /admin/generate-questions/status - Current worker status.
#[utoipa::path(
    get,
    path = "/admin/generate-questions/status",
    responses((status = 200, description = "Worker status", body = GenerationResponse))
)]
pub async fn generation_status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = match state.coordinator.status().await {
        RunState::Idle => GenerationResponse::bare("No generation has been run yet", "idle"),
        RunState::Running => {
            GenerationResponse::bare("Question generation is currently running", "running")
        }
        RunState::Failed(message) => {
            GenerationResponse::bare(format!("Last generation failed: {message}"), "error")
        }
        RunState::Completed(outcome) => GenerationResponse {
            message: "Last generation completed successfully".to_string(),
            questions_generated: Some(outcome.questions_generated),
            slides_processed: Some(outcome.slides_processed),
            last_slide_id: Some(outcome.last_slide_id),
            status: "completed".to_string(),
        },
    };
    Json(response)
}

/// GET /admin/generation-stats - The persisted progress snapshot.
#[utoipa::path(
    get,
    path = "/admin/generation-stats",
    responses((status = 200, description = "Progress snapshot", body = GenerationStats))
)]
pub async fn generation_stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let progress = state
        .coordinator
        .progress_snapshot()
        .await
        .map_err(port_error_response)?;
    Ok(Json(GenerationStats {
        last_run: progress.last_run,
        total_questions_generated: progress.total_questions_generated,
        last_processed_slide_id: progress.last_processed_slide_id,
        departments_completed: progress.departments_completed,
    }))
}

/// POST /admin/reset-generation-progress - Start the next run from slide 0.
#[utoipa::path(
    post,
    path = "/admin/reset-generation-progress",
    responses(
        (status = 200, description = "Progress cleared", body = GenerationResponse),
        (status = 409, description = "A run is active; reset refused")
    )
)]
pub async fn reset_generation_progress_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .coordinator
        .reset_progress()
        .await
        .map_err(port_error_response)?;
    Ok(Json(GenerationResponse::bare(
        "Generation progress reset successfully",
        "reset",
    )))
}

//=========================================================================================
// Question Import/Export
//=========================================================================================

/// POST /admin/import-questions - Bulk import questions.
///
/// Used for syncing curated question sets (including past papers) into the
/// pool. Import appends only, so it can interleave freely with a running
/// generation pass.
#[utoipa::path(
    post,
    path = "/admin/import-questions",
    request_body = [QuestionImport],
    responses((status = 200, description = "Import summary", body = ImportResponse))
)]
pub async fn import_questions_handler(
    State(state): State<Arc<AppState>>,
    Json(questions): Json<Vec<QuestionImport>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut imported = 0usize;
    let mut skipped = 0usize;

    for q in questions {
        let difficulty = q
            .difficulty
            .as_deref()
            .and_then(Difficulty::parse)
            .unwrap_or(Difficulty::Medium);
        let source = if q.is_past_paper {
            QuestionSource::PastPaper
        } else {
            QuestionSource::Generated
        };

        let insert = state
            .store
            .insert_question(NewQuestion {
                source_document_id: None,
                slide_id: None,
                page_number: None,
                department: Some(q.department),
                topic: q.topic,
                question_text: q.question_text,
                correct_answer: q.correct_answer,
                distractors: q.distractors,
                explanation: q.explanation,
                difficulty,
                source,
            })
            .await;
        match insert {
            Ok(_) => imported += 1,
            Err(e) => {
                warn!("skipping question that failed to import: {e}");
                skipped += 1;
            }
        }
    }

    Ok(Json(ImportResponse {
        message: format!("Successfully imported {imported} questions"),
        imported_count: imported,
        skipped_count: skipped,
        status: "completed".to_string(),
    }))
}

/// GET /admin/question-count - Total questions in the pool.
#[utoipa::path(
    get,
    path = "/admin/question-count",
    responses((status = 200, description = "Question count"))
)]
pub async fn question_count_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let count = state
        .store
        .count_questions()
        .await
        .map_err(port_error_response)?;
    Ok(Json(serde_json::json!({ "count": count, "status": "ok" })))
}
