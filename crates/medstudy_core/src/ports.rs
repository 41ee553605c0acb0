//! crates/medstudy_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    Course, Difficulty, Document, DocumentChunk, GenerationProgress, NewQuestion, NewSlide,
    NewUserExam, Question, Slide, User, UserCredentials, UserExam,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Provider rate limited: {0}")]
    RateLimited(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Query Shapes
//=========================================================================================

/// Course restriction applied when sampling questions. Scoping goes through
/// the question's source document, which carries the course link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseScope {
    Any,
    Only(i64),
    Excluding(i64),
}

/// Filter for querying the question pool. Results are ordered by question
/// id so that a fixed store snapshot always yields the same rows; any
/// randomization happens in the caller, never in the query.
#[derive(Debug, Clone)]
pub struct QuestionFilter {
    pub difficulty: Option<Difficulty>,
    pub include_past_papers: bool,
    pub course_scope: CourseScope,
    pub limit: i64,
}

/// One question as returned by the AI provider, before it is persisted.
#[derive(Debug, Clone)]
pub struct GeneratedQuestion {
    pub question_text: String,
    pub correct_answer: String,
    pub distractors: Vec<String>,
    pub explanation: Option<String>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The single source of truth for all durable content. The sampler and mode
/// selector only read; the generation worker and bulk import both append.
#[async_trait]
pub trait ContentStore: Send + Sync {
    // --- User Management ---
    async fn get_or_create_user(&self, user_id: Uuid) -> PortResult<User>;

    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: &str,
        term: i32,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Slides ---

    /// Fetches the next `limit` slides with id strictly greater than
    /// `cursor`, ordered by id, skipping slides whose content is too short
    /// to generate from.
    async fn slides_after(
        &self,
        cursor: i64,
        min_content_len: i32,
        limit: i64,
    ) -> PortResult<Vec<Slide>>;

    /// The maximum known slide id, or 0 for an empty store.
    async fn max_slide_id(&self) -> PortResult<i64>;

    async fn slide_departments(&self) -> PortResult<Vec<String>>;

    async fn slides_for_department(&self, department: &str) -> PortResult<Vec<Slide>>;

    /// Slides for one topic, ordered by page number.
    async fn slides_for_topic(&self, department: &str, topic: &str) -> PortResult<Vec<Slide>>;

    async fn insert_slides(&self, slides: Vec<NewSlide>) -> PortResult<u64>;

    // --- Questions ---

    /// Inserts a question and returns it with its assigned identity.
    async fn insert_question(&self, question: NewQuestion) -> PortResult<Question>;

    async fn get_question(&self, question_id: i64) -> PortResult<Question>;

    async fn questions_filtered(&self, filter: &QuestionFilter) -> PortResult<Vec<Question>>;

    async fn count_questions(&self) -> PortResult<i64>;

    // --- Courses ---
    async fn create_course(
        &self,
        name: &str,
        term: i32,
        description: Option<&str>,
    ) -> PortResult<Course>;

    async fn list_courses(&self, term: Option<i32>) -> PortResult<Vec<Course>>;

    async fn get_course(&self, course_id: i64) -> PortResult<Course>;

    // --- Documents ---
    async fn create_document(
        &self,
        course_id: i64,
        filename: &str,
        total_pages: Option<i32>,
    ) -> PortResult<Document>;

    async fn insert_chunk(
        &self,
        document_id: i64,
        page_number: i32,
        content_text: &str,
        embedding: Option<Vec<f32>>,
    ) -> PortResult<DocumentChunk>;

    async fn chunks_for_document(&self, document_id: i64) -> PortResult<Vec<DocumentChunk>>;

    async fn chunk_for_page(
        &self,
        document_id: i64,
        page_number: i32,
    ) -> PortResult<Option<DocumentChunk>>;

    // --- Exams ---
    async fn create_exam(&self, exam: NewUserExam) -> PortResult<UserExam>;

    async fn exams_for_user(&self, user_id: Uuid) -> PortResult<Vec<UserExam>>;

    async fn get_exam_for_user(&self, exam_id: i64, user_id: Uuid) -> PortResult<UserExam>;

    /// The chronologically nearest exam dated `on_or_after` or later.
    /// Past exams are never considered for mode selection.
    async fn next_exam_for_user(
        &self,
        user_id: Uuid,
        on_or_after: NaiveDate,
    ) -> PortResult<Option<UserExam>>;
}

/// The external AI provider consumed by the generation worker.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Generates multiple-choice questions from a blob of slide content.
    ///
    /// Fails soft: malformed provider output yields `Ok(vec![])`, never an
    /// error. Rate limiting surfaces as `PortError::RateLimited` so the
    /// worker can retry the batch.
    async fn generate_questions(
        &self,
        content: &str,
        count: usize,
        difficulty_hint: Difficulty,
    ) -> PortResult<Vec<GeneratedQuestion>>;

    /// Generates a semantic hint for a stuck student. The hint must never
    /// reveal letters or the length of the answer.
    async fn generate_hint(
        &self,
        question: &str,
        correct_answer: &str,
        context: Option<&str>,
    ) -> PortResult<String>;
}

/// Embedding provider for similarity features. An empty vector means
/// "no embedding available"; callers must tolerate it.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>>;
}

/// Durable storage for the generation worker's resumption cursor.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Loads the persisted progress, or the zeroed default when no record
    /// exists yet.
    async fn load(&self) -> PortResult<GenerationProgress>;

    async fn save(&self, progress: &GenerationProgress) -> PortResult<()>;

    async fn reset(&self) -> PortResult<()>;
}
