//! services/api/src/web/rest.rs
//!
//! The master OpenAPI definition plus the response helpers shared by the
//! REST handler modules.

use axum::http::StatusCode;
use medstudy_core::domain::Question;
use medstudy_core::ports::PortError;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

use crate::web::{admin, auth, content, exams, questions};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        questions::list_questions_handler,
        questions::get_question_handler,
        questions::question_hint_handler,
        questions::submit_answer_handler,
        exams::create_exam_handler,
        exams::list_exams_handler,
        exams::daily_mix_handler,
        exams::get_exam_handler,
        content::list_courses_handler,
        content::create_course_handler,
        content::get_course_handler,
        content::slide_departments_handler,
        content::department_topics_handler,
        content::topic_slides_handler,
        content::import_slides_handler,
        content::import_document_handler,
        content::search_document_handler,
        admin::trigger_generation_handler,
        admin::generation_status_handler,
        admin::generation_stats_handler,
        admin::reset_generation_progress_handler,
        admin::import_questions_handler,
        admin::question_count_handler,
    ),
    components(schemas(
        auth::SignupRequest,
        auth::LoginRequest,
        auth::AuthResponse,
        QuestionResponse,
        questions::HintResponse,
        questions::AnswerSubmit,
        questions::AnswerResponse,
        exams::ExamCreate,
        exams::ExamResponse,
        exams::DailyMixResponse,
        content::CourseCreate,
        content::CourseResponse,
        content::SlideResponse,
        content::TopicSummary,
        content::SlideImport,
        content::SlideImportResponse,
        content::DocumentImportRequest,
        content::PageImport,
        content::DocumentImportResponse,
        content::ChunkSearchResult,
        content::DocumentSearchResponse,
        admin::GenerationResponse,
        admin::GenerationStats,
        admin::QuestionImport,
        admin::ImportResponse,
    )),
    tags(
        (name = "Medical Study API", description = "API endpoints for the adaptive study backend.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Response Types and Helpers
//=========================================================================================

/// A question as served to clients. `choices` mixes the correct answer and
/// the distractors in a fresh random order on every serialization, so the
/// right answer is never identifiable by position.
#[derive(Serialize, ToSchema)]
pub struct QuestionResponse {
    pub id: i64,
    pub question_text: String,
    pub choices: Vec<String>,
    pub difficulty: String,
    pub source_document_id: Option<i64>,
    pub page_number: Option<i32>,
}

/// Prepares a question for the frontend with shuffled choices.
pub fn prepare_question_response(question: &Question) -> QuestionResponse {
    let mut choices = Vec::with_capacity(question.distractors.len() + 1);
    choices.push(question.correct_answer.clone());
    choices.extend(question.distractors.iter().cloned());
    choices.shuffle(&mut rand::thread_rng());

    QuestionResponse {
        id: question.id,
        question_text: question.question_text.clone(),
        choices,
        difficulty: question.difficulty.as_str().to_string(),
        source_document_id: question.source_document_id,
        page_number: question.page_number,
    }
}

/// Maps a port error onto the HTTP response shared by the handler modules:
/// not-found and conflict pass through, everything else is a logged 500.
pub fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        e => {
            error!("request failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use medstudy_core::domain::{Difficulty, QuestionSource};

    fn fixed_question() -> Question {
        Question {
            id: 1,
            source_document_id: None,
            slide_id: None,
            page_number: None,
            department: None,
            topic: None,
            question_text: "Which organelle produces ATP?".to_string(),
            correct_answer: "Mitochondrion".to_string(),
            distractors: vec![
                "Ribosome".to_string(),
                "Lysosome".to_string(),
                "Golgi apparatus".to_string(),
            ],
            explanation: None,
            difficulty: Difficulty::Easy,
            source: QuestionSource::Generated,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn choices_always_contain_the_full_answer_set() {
        let response = prepare_question_response(&fixed_question());
        assert_eq!(response.choices.len(), 4);
        assert!(response.choices.iter().any(|c| c == "Mitochondrion"));
    }

    #[test]
    fn correct_answer_is_not_pinned_to_one_position() {
        // Statistical check: over many shuffles the correct answer must
        // show up at more than one index.
        let question = fixed_question();
        let mut seen_positions = std::collections::HashSet::new();
        for _ in 0..200 {
            let response = prepare_question_response(&question);
            let position = response
                .choices
                .iter()
                .position(|c| c == "Mitochondrion")
                .unwrap();
            seen_positions.insert(position);
        }
        assert!(seen_positions.len() > 1);
    }
}
