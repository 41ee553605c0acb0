//! services/api/src/web/questions.rs
//!
//! Quiz endpoints: question retrieval, smart hints, and answer submission.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::web::rest::{port_error_response, prepare_question_response, QuestionResponse};
use crate::web::state::AppState;
use medstudy_core::domain::Difficulty;
use medstudy_core::ports::{CourseScope, QuestionFilter};

/// How much source-chunk context a hint request may carry.
const HINT_CONTEXT_CHAR_LIMIT: usize = 500;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuestionsParams {
    /// Maximum number of questions to return (default 20).
    pub limit: Option<i64>,
    /// Optional difficulty filter: easy, medium, or hard.
    pub difficulty: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct HintResponse {
    pub hint: String,
    pub source_document_id: Option<i64>,
    pub page_number: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct AnswerSubmit {
    pub user_answer: String,
}

#[derive(Serialize, ToSchema)]
pub struct AnswerResponse {
    pub is_correct: bool,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub source_document_id: Option<i64>,
    pub page_number: Option<i32>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /questions - List questions, optionally filtered by difficulty.
#[utoipa::path(
    get,
    path = "/questions",
    params(ListQuestionsParams),
    responses(
        (status = 200, description = "Questions with shuffled choices", body = [QuestionResponse]),
        (status = 400, description = "Unknown difficulty value")
    )
)]
pub async fn list_questions_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuestionsParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let difficulty = match params.difficulty.as_deref() {
        Some(raw) => Some(Difficulty::parse(raw).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("'{raw}' is not a valid difficulty"),
            )
        })?),
        None => None,
    };

    let filter = QuestionFilter {
        difficulty,
        include_past_papers: true,
        course_scope: CourseScope::Any,
        limit: params.limit.unwrap_or(20),
    };
    let questions = state
        .store
        .questions_filtered(&filter)
        .await
        .map_err(port_error_response)?;

    let response: Vec<QuestionResponse> =
        questions.iter().map(prepare_question_response).collect();
    Ok(Json(response))
}

/// GET /questions/{id} - Get a specific question by ID.
#[utoipa::path(
    get,
    path = "/questions/{id}",
    params(("id" = i64, Path, description = "Question id")),
    responses(
        (status = 200, description = "The question with shuffled choices", body = QuestionResponse),
        (status = 404, description = "Question not found")
    )
)]
pub async fn get_question_handler(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let question = state
        .store
        .get_question(question_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(prepare_question_response(&question)))
}

/// POST /questions/{id}/hint - Generate a semantic hint.
///
/// The hint never reveals letters or the length of the answer; it leans on
/// the source chunk when the question still knows where it came from.
#[utoipa::path(
    post,
    path = "/questions/{id}/hint",
    params(("id" = i64, Path, description = "Question id")),
    responses(
        (status = 200, description = "A semantic hint", body = HintResponse),
        (status = 404, description = "Question not found")
    )
)]
pub async fn question_hint_handler(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let question = state
        .store
        .get_question(question_id)
        .await
        .map_err(port_error_response)?;

    // Pull the source page as grounding context when the link survives.
    let context = match (question.source_document_id, question.page_number) {
        (Some(document_id), Some(page_number)) => state
            .store
            .chunk_for_page(document_id, page_number)
            .await
            .map_err(port_error_response)?
            .map(|chunk| {
                chunk
                    .content_text
                    .chars()
                    .take(HINT_CONTEXT_CHAR_LIMIT)
                    .collect::<String>()
            }),
        _ => None,
    };

    let hint = state
        .generator
        .generate_hint(
            &question.question_text,
            &question.correct_answer,
            context.as_deref(),
        )
        .await
        .map_err(port_error_response)?;

    Ok(Json(HintResponse {
        hint,
        source_document_id: question.source_document_id,
        page_number: question.page_number,
    }))
}

/// POST /questions/{id}/answer - Submit an answer.
#[utoipa::path(
    post,
    path = "/questions/{id}/answer",
    params(("id" = i64, Path, description = "Question id")),
    request_body = AnswerSubmit,
    responses(
        (status = 200, description = "Whether the answer was correct", body = AnswerResponse),
        (status = 404, description = "Question not found")
    )
)]
pub async fn submit_answer_handler(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<i64>,
    Json(submission): Json<AnswerSubmit>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let question = state
        .store
        .get_question(question_id)
        .await
        .map_err(port_error_response)?;

    let is_correct = submission.user_answer.trim().to_lowercase()
        == question.correct_answer.trim().to_lowercase();

    Ok(Json(AnswerResponse {
        is_correct,
        correct_answer: question.correct_answer,
        explanation: question.explanation,
        source_document_id: question.source_document_id,
        page_number: question.page_number,
    }))
}
