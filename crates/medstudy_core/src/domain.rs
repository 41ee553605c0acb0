//! crates/medstudy_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

//=========================================================================================
// Enums
//=========================================================================================

/// Question difficulty, used by the weighted sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Difficulty> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// Where a question came from. Past papers are gated behind cramming mode,
/// so the two kinds must never be conflated by the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSource {
    Generated,
    PastPaper,
}

impl QuestionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionSource::Generated => "generated",
            QuestionSource::PastPaper => "past_paper",
        }
    }

    pub fn parse(s: &str) -> Option<QuestionSource> {
        match s {
            "generated" => Some(QuestionSource::Generated),
            "past_paper" => Some(QuestionSource::PastPaper),
            _ => None,
        }
    }

    pub fn is_past_paper(&self) -> bool {
        matches!(self, QuestionSource::PastPaper)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamStatus {
    Scheduled,
    InProgress,
    Completed,
}

impl ExamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamStatus::Scheduled => "scheduled",
            ExamStatus::InProgress => "in_progress",
            ExamStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<ExamStatus> {
        match s {
            "scheduled" => Some(ExamStatus::Scheduled),
            "in_progress" => Some(ExamStatus::InProgress),
            "completed" => Some(ExamStatus::Completed),
            _ => None,
        }
    }
}

//=========================================================================================
// Content Entities
//=========================================================================================

/// A multiple-choice question, either generated from slides or imported
/// from a past paper. Append-only: never mutated or deleted by the core.
#[derive(Debug, Clone)]
pub struct Question {
    pub id: i64,
    pub source_document_id: Option<i64>,
    pub slide_id: Option<i64>,
    pub page_number: Option<i32>,
    pub department: Option<String>,
    pub topic: Option<String>,
    pub question_text: String,
    pub correct_answer: String,
    pub distractors: Vec<String>,
    pub explanation: Option<String>,
    pub difficulty: Difficulty,
    pub source: QuestionSource,
    pub created_at: DateTime<Utc>,
}

/// Insert-shape for a question, before the store assigns an identity.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub source_document_id: Option<i64>,
    pub slide_id: Option<i64>,
    pub page_number: Option<i32>,
    pub department: Option<String>,
    pub topic: Option<String>,
    pub question_text: String,
    pub correct_answer: String,
    pub distractors: Vec<String>,
    pub explanation: Option<String>,
    pub difficulty: Difficulty,
    pub source: QuestionSource,
}

/// One page of lecture material. Immutable once imported; the slide id
/// ordering is the generation cursor's unit of progress.
#[derive(Debug, Clone)]
pub struct Slide {
    pub id: i64,
    pub department: String,
    pub topic: String,
    pub page_number: i32,
    pub title: Option<String>,
    pub content: String,
    pub bullet_points: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub professor: Option<String>,
    pub source_file: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSlide {
    pub department: String,
    pub topic: String,
    pub page_number: i32,
    pub title: Option<String>,
    pub content: String,
    pub bullet_points: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub professor: Option<String>,
    pub source_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub term: i32,
    pub description: Option<String>,
}

/// An uploaded document. Questions link to courses through their source
/// document, which is what the course-scope filter joins on.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: i64,
    pub course_id: i64,
    pub filename: String,
    pub total_pages: Option<i32>,
}

/// One parsed page of a document, with an optional embedding for
/// similarity search. An absent embedding means "not available", not an error.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub id: i64,
    pub document_id: i64,
    pub page_number: i32,
    pub content_text: String,
    pub embedding: Option<Vec<f32>>,
}

//=========================================================================================
// Users and Exams
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>, // Optional because old users won't have it
    pub full_name: Option<String>,
    pub term: Option<i32>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// A user's scheduled exam. The exam date carries date-only semantics:
/// day counts are computed from calendar dates, never timestamps.
#[derive(Debug, Clone)]
pub struct UserExam {
    pub id: i64,
    pub user_id: Uuid,
    pub exam_name: String,
    pub exam_date: NaiveDate,
    pub course_id: Option<i64>,
    pub status: ExamStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUserExam {
    pub user_id: Uuid,
    pub exam_name: String,
    pub exam_date: NaiveDate,
    pub course_id: Option<i64>,
}

//=========================================================================================
// Generation Progress
//=========================================================================================

/// The durable cursor record for the progressive generation pipeline.
///
/// The cursor only advances within a cycle; once it reaches the maximum
/// known slide id, the next run wraps it back to 0 and reprocesses from
/// the start.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationProgress {
    pub last_processed_slide_id: i64,
    pub total_questions_generated: i64,
    pub last_run: Option<DateTime<Utc>>,
    pub departments_completed: Vec<String>,
}

impl Default for GenerationProgress {
    fn default() -> Self {
        Self {
            last_processed_slide_id: 0,
            total_questions_generated: 0,
            last_run: None,
            departments_completed: Vec::new(),
        }
    }
}
