//! services/api/src/web/exams.rs
//!
//! Exam scheduling and the daily question mix driven by the 7-day logic.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::{port_error_response, prepare_question_response, QuestionResponse};
use crate::web::state::AppState;
use medstudy_core::domain::{NewUserExam, UserExam};
use medstudy_core::exam_logic::days_remaining;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ExamCreate {
    pub exam_name: String,
    /// Date of the exam; time-of-day is deliberately not accepted.
    pub exam_date: NaiveDate,
    /// Optional focus course for cramming mode.
    pub course_id: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct ExamResponse {
    pub id: i64,
    pub exam_name: String,
    pub exam_date: NaiveDate,
    pub course_id: Option<i64>,
    pub status: String,
    pub days_remaining: i64,
}

impl ExamResponse {
    fn from_exam(exam: UserExam, today: NaiveDate) -> Self {
        Self {
            id: exam.id,
            exam_name: exam.exam_name,
            exam_date: exam.exam_date,
            course_id: exam.course_id,
            status: exam.status.as_str().to_string(),
            days_remaining: days_remaining(today, exam.exam_date),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DailyMixResponse {
    pub mode: String,
    pub days_remaining: i64,
    pub questions: Vec<QuestionResponse>,
    pub past_papers_unlocked: bool,
    pub exam_name: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /exams - Schedule a new exam date.
///
/// Scheduling is what arms the 7-day logic for this user.
#[utoipa::path(
    post,
    path = "/exams",
    request_body = ExamCreate,
    responses(
        (status = 201, description = "Exam scheduled", body = ExamResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn create_exam_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<ExamCreate>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let exam = state
        .store
        .create_exam(NewUserExam {
            user_id,
            exam_name: req.exam_name,
            exam_date: req.exam_date,
            course_id: req.course_id,
        })
        .await
        .map_err(port_error_response)?;

    let today = Utc::now().date_naive();
    Ok((
        StatusCode::CREATED,
        Json(ExamResponse::from_exam(exam, today)),
    ))
}

/// GET /exams - List all exams for the current user.
#[utoipa::path(
    get,
    path = "/exams",
    responses(
        (status = 200, description = "The user's exams", body = [ExamResponse]),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_exams_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let exams = state
        .store
        .exams_for_user(user_id)
        .await
        .map_err(port_error_response)?;

    let today = Utc::now().date_naive();
    let response: Vec<ExamResponse> = exams
        .into_iter()
        .map(|exam| ExamResponse::from_exam(exam, today))
        .collect();
    Ok(Json(response))
}

/// GET /exams/daily - Get the daily question mix.
///
/// No exam scheduled means free study; more than seven days out means
/// general review; the final week switches to cramming and unlocks past
/// papers.
#[utoipa::path(
    get,
    path = "/exams/daily",
    responses(
        (status = 200, description = "Today's question mix", body = DailyMixResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn daily_mix_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let today = Utc::now().date_naive();
    let mix = state
        .daily_mix
        .daily_mix(user_id, today)
        .await
        .map_err(port_error_response)?;

    let questions: Vec<QuestionResponse> =
        mix.questions.iter().map(prepare_question_response).collect();
    Ok(Json(DailyMixResponse {
        mode: mix.mode.as_str().to_string(),
        days_remaining: mix.days_remaining,
        questions,
        past_papers_unlocked: mix.past_papers_unlocked,
        exam_name: mix.exam_name,
    }))
}

/// GET /exams/{id} - Get a specific exam by ID.
#[utoipa::path(
    get,
    path = "/exams/{id}",
    params(("id" = i64, Path, description = "Exam id")),
    responses(
        (status = 200, description = "The exam", body = ExamResponse),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn get_exam_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let exam = state
        .store
        .get_exam_for_user(exam_id, user_id)
        .await
        .map_err(port_error_response)?;

    let today = Utc::now().date_naive();
    Ok(Json(ExamResponse::from_exam(exam, today)))
}
