//! crates/medstudy_core/src/testing.rs
//!
//! In-memory fakes for the core ports, shared by the unit tests in this
//! crate. These are test doubles, not production stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::domain::{
    Course, Difficulty, Document, DocumentChunk, GenerationProgress, NewQuestion, NewSlide,
    NewUserExam, Question, QuestionSource, Slide, User, UserCredentials, UserExam, ExamStatus,
};
use crate::ports::{
    ContentStore, CourseScope, GeneratedQuestion, PortError, PortResult, ProgressStore,
    QuestionFilter, QuestionGenerator,
};

//=========================================================================================
// MemoryStore
//=========================================================================================

#[derive(Default)]
struct StoreInner {
    users: HashMap<Uuid, User>,
    credentials: HashMap<String, UserCredentials>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    slides: Vec<Slide>,
    questions: Vec<Question>,
    courses: Vec<Course>,
    documents: Vec<Document>,
    chunks: Vec<DocumentChunk>,
    exams: Vec<UserExam>,
}

/// An in-memory `ContentStore`. Identities are assigned per collection,
/// starting at 1, so tests can rely on slide ids 1..=n in insert order.
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    pub fn add_slide(&self, department: &str, topic: &str, page_number: i32, content: &str) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.slides.len() as i64 + 1;
        inner.slides.push(Slide {
            id,
            department: department.to_string(),
            topic: topic.to_string(),
            page_number,
            title: None,
            content: content.to_string(),
            bullet_points: None,
            image_url: None,
            professor: None,
            source_file: None,
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_course(&self, name: &str) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.courses.len() as i64 + 1;
        inner.courses.push(Course {
            id,
            name: name.to_string(),
            term: 1,
            description: None,
        });
        id
    }

    pub fn add_document(&self, course_id: i64) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.documents.len() as i64 + 1;
        inner.documents.push(Document {
            id,
            course_id,
            filename: format!("doc-{id}.pdf"),
            total_pages: None,
        });
        id
    }

    pub fn add_question(
        &self,
        difficulty: Difficulty,
        source: QuestionSource,
        source_document_id: Option<i64>,
    ) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.questions.len() as i64 + 1;
        inner.questions.push(Question {
            id,
            source_document_id,
            slide_id: None,
            page_number: None,
            department: None,
            topic: None,
            question_text: format!("question {id}"),
            correct_answer: "right".to_string(),
            distractors: vec!["w1".to_string(), "w2".to_string(), "w3".to_string()],
            explanation: None,
            difficulty,
            source,
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_exam(
        &self,
        user_id: Uuid,
        exam_name: &str,
        exam_date: NaiveDate,
        course_id: Option<i64>,
    ) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.exams.len() as i64 + 1;
        inner.exams.push(UserExam {
            id,
            user_id,
            exam_name: exam_name.to_string(),
            exam_date,
            course_id,
            status: ExamStatus::Scheduled,
            created_at: Utc::now(),
        });
        id
    }

    /// The slide ids recorded on stored questions, in insertion order.
    pub fn question_slide_ids(&self) -> Vec<i64> {
        let inner = self.inner.lock().unwrap();
        inner.questions.iter().filter_map(|q| q.slide_id).collect()
    }

    pub fn question_count(&self) -> usize {
        self.inner.lock().unwrap().questions.len()
    }
}

fn document_course(inner: &StoreInner, document_id: Option<i64>) -> Option<i64> {
    let document_id = document_id?;
    inner
        .documents
        .iter()
        .find(|d| d.id == document_id)
        .map(|d| d.course_id)
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get_or_create_user(&self, user_id: Uuid) -> PortResult<User> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.entry(user_id).or_insert(User {
            user_id,
            email: None,
            full_name: None,
            term: None,
        });
        Ok(user.clone())
    }

    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: &str,
        term: i32,
    ) -> PortResult<User> {
        let mut inner = self.inner.lock().unwrap();
        let user = User {
            user_id: Uuid::new_v4(),
            email: Some(email.to_string()),
            full_name: Some(full_name.to_string()),
            term: Some(term),
        };
        inner.users.insert(user.user_id, user.clone());
        inner.credentials.insert(
            email.to_string(),
            UserCredentials {
                user_id: user.user_id,
                email: email.to_string(),
                hashed_password: hashed_password.to_string(),
            },
        );
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let inner = self.inner.lock().unwrap();
        inner
            .credentials
            .get(email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("user {email}")))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let inner = self.inner.lock().unwrap();
        match inner.sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.sessions.remove(session_id);
        Ok(())
    }

    async fn slides_after(
        &self,
        cursor: i64,
        min_content_len: i32,
        limit: i64,
    ) -> PortResult<Vec<Slide>> {
        let inner = self.inner.lock().unwrap();
        let mut slides: Vec<Slide> = inner
            .slides
            .iter()
            .filter(|s| s.id > cursor && s.content.chars().count() > min_content_len as usize)
            .cloned()
            .collect();
        slides.sort_by_key(|s| s.id);
        slides.truncate(limit as usize);
        Ok(slides)
    }

    async fn max_slide_id(&self) -> PortResult<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.slides.iter().map(|s| s.id).max().unwrap_or(0))
    }

    async fn slide_departments(&self) -> PortResult<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        let mut departments: Vec<String> =
            inner.slides.iter().map(|s| s.department.clone()).collect();
        departments.sort();
        departments.dedup();
        Ok(departments)
    }

    async fn slides_for_department(&self, department: &str) -> PortResult<Vec<Slide>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .slides
            .iter()
            .filter(|s| s.department == department)
            .cloned()
            .collect())
    }

    async fn slides_for_topic(&self, department: &str, topic: &str) -> PortResult<Vec<Slide>> {
        let inner = self.inner.lock().unwrap();
        let mut slides: Vec<Slide> = inner
            .slides
            .iter()
            .filter(|s| s.department == department && s.topic == topic)
            .cloned()
            .collect();
        slides.sort_by_key(|s| s.page_number);
        Ok(slides)
    }

    async fn insert_slides(&self, slides: Vec<NewSlide>) -> PortResult<u64> {
        let count = slides.len() as u64;
        for slide in slides {
            self.add_slide(
                &slide.department,
                &slide.topic,
                slide.page_number,
                &slide.content,
            );
        }
        Ok(count)
    }

    async fn insert_question(&self, question: NewQuestion) -> PortResult<Question> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.questions.len() as i64 + 1;
        let question = Question {
            id,
            source_document_id: question.source_document_id,
            slide_id: question.slide_id,
            page_number: question.page_number,
            department: question.department,
            topic: question.topic,
            question_text: question.question_text,
            correct_answer: question.correct_answer,
            distractors: question.distractors,
            explanation: question.explanation,
            difficulty: question.difficulty,
            source: question.source,
            created_at: Utc::now(),
        };
        inner.questions.push(question.clone());
        Ok(question)
    }

    async fn get_question(&self, question_id: i64) -> PortResult<Question> {
        let inner = self.inner.lock().unwrap();
        inner
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("question {question_id}")))
    }

    async fn questions_filtered(&self, filter: &QuestionFilter) -> PortResult<Vec<Question>> {
        let inner = self.inner.lock().unwrap();
        let mut questions: Vec<Question> = inner
            .questions
            .iter()
            .filter(|q| {
                if let Some(difficulty) = filter.difficulty {
                    if q.difficulty != difficulty {
                        return false;
                    }
                }
                if !filter.include_past_papers && q.source.is_past_paper() {
                    return false;
                }
                match filter.course_scope {
                    CourseScope::Any => true,
                    CourseScope::Only(course_id) => {
                        document_course(&inner, q.source_document_id) == Some(course_id)
                    }
                    CourseScope::Excluding(course_id) => {
                        matches!(document_course(&inner, q.source_document_id), Some(c) if c != course_id)
                    }
                }
            })
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.id);
        questions.truncate(filter.limit as usize);
        Ok(questions)
    }

    async fn count_questions(&self) -> PortResult<i64> {
        Ok(self.inner.lock().unwrap().questions.len() as i64)
    }

    async fn create_course(
        &self,
        name: &str,
        term: i32,
        description: Option<&str>,
    ) -> PortResult<Course> {
        let mut inner = self.inner.lock().unwrap();
        let course = Course {
            id: inner.courses.len() as i64 + 1,
            name: name.to_string(),
            term,
            description: description.map(str::to_string),
        };
        inner.courses.push(course.clone());
        Ok(course)
    }

    async fn list_courses(&self, term: Option<i32>) -> PortResult<Vec<Course>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .courses
            .iter()
            .filter(|c| term.map_or(true, |t| c.term == t))
            .cloned()
            .collect())
    }

    async fn get_course(&self, course_id: i64) -> PortResult<Course> {
        let inner = self.inner.lock().unwrap();
        inner
            .courses
            .iter()
            .find(|c| c.id == course_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("course {course_id}")))
    }

    async fn create_document(
        &self,
        course_id: i64,
        filename: &str,
        total_pages: Option<i32>,
    ) -> PortResult<Document> {
        let mut inner = self.inner.lock().unwrap();
        let document = Document {
            id: inner.documents.len() as i64 + 1,
            course_id,
            filename: filename.to_string(),
            total_pages,
        };
        inner.documents.push(document.clone());
        Ok(document)
    }

    async fn insert_chunk(
        &self,
        document_id: i64,
        page_number: i32,
        content_text: &str,
        embedding: Option<Vec<f32>>,
    ) -> PortResult<DocumentChunk> {
        let mut inner = self.inner.lock().unwrap();
        let chunk = DocumentChunk {
            id: inner.chunks.len() as i64 + 1,
            document_id,
            page_number,
            content_text: content_text.to_string(),
            embedding,
        };
        inner.chunks.push(chunk.clone());
        Ok(chunk)
    }

    async fn chunks_for_document(&self, document_id: i64) -> PortResult<Vec<DocumentChunk>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn chunk_for_page(
        &self,
        document_id: i64,
        page_number: i32,
    ) -> PortResult<Option<DocumentChunk>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .chunks
            .iter()
            .find(|c| c.document_id == document_id && c.page_number == page_number)
            .cloned())
    }

    async fn create_exam(&self, exam: NewUserExam) -> PortResult<UserExam> {
        let mut inner = self.inner.lock().unwrap();
        let exam = UserExam {
            id: inner.exams.len() as i64 + 1,
            user_id: exam.user_id,
            exam_name: exam.exam_name,
            exam_date: exam.exam_date,
            course_id: exam.course_id,
            status: ExamStatus::Scheduled,
            created_at: Utc::now(),
        };
        inner.exams.push(exam.clone());
        Ok(exam)
    }

    async fn exams_for_user(&self, user_id: Uuid) -> PortResult<Vec<UserExam>> {
        let inner = self.inner.lock().unwrap();
        let mut exams: Vec<UserExam> = inner
            .exams
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        exams.sort_by_key(|e| e.exam_date);
        Ok(exams)
    }

    async fn get_exam_for_user(&self, exam_id: i64, user_id: Uuid) -> PortResult<UserExam> {
        let inner = self.inner.lock().unwrap();
        inner
            .exams
            .iter()
            .find(|e| e.id == exam_id && e.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("exam {exam_id}")))
    }

    async fn next_exam_for_user(
        &self,
        user_id: Uuid,
        on_or_after: NaiveDate,
    ) -> PortResult<Option<UserExam>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .exams
            .iter()
            .filter(|e| e.user_id == user_id && e.exam_date >= on_or_after)
            .min_by_key(|e| e.exam_date)
            .cloned())
    }
}

//=========================================================================================
// Generator and Progress Fakes
//=========================================================================================

/// Returns exactly `count` placeholder questions on every call.
pub struct FixedGenerator;

#[async_trait]
impl QuestionGenerator for FixedGenerator {
    async fn generate_questions(
        &self,
        _content: &str,
        count: usize,
        _difficulty_hint: Difficulty,
    ) -> PortResult<Vec<GeneratedQuestion>> {
        Ok(placeholder_questions(count))
    }

    async fn generate_hint(
        &self,
        _question: &str,
        _correct_answer: &str,
        _context: Option<&str>,
    ) -> PortResult<String> {
        Ok("a hint".to_string())
    }
}

/// Fails with `RateLimited` for the first `failures` calls, then succeeds.
pub struct FlakyGenerator {
    failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FlakyGenerator {
    pub fn new(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QuestionGenerator for FlakyGenerator {
    async fn generate_questions(
        &self,
        _content: &str,
        count: usize,
        _difficulty_hint: Difficulty,
    ) -> PortResult<Vec<GeneratedQuestion>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(PortError::RateLimited("quota exhausted".to_string()));
        }
        Ok(placeholder_questions(count))
    }

    async fn generate_hint(
        &self,
        _question: &str,
        _correct_answer: &str,
        _context: Option<&str>,
    ) -> PortResult<String> {
        Ok("a hint".to_string())
    }
}

/// Blocks inside `generate_questions` until `release` is notified, which
/// lets tests hold a run open while probing the concurrency guard.
pub struct BlockingGenerator {
    pub release: Notify,
}

impl BlockingGenerator {
    pub fn new() -> Self {
        Self {
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl QuestionGenerator for BlockingGenerator {
    async fn generate_questions(
        &self,
        _content: &str,
        count: usize,
        _difficulty_hint: Difficulty,
    ) -> PortResult<Vec<GeneratedQuestion>> {
        self.release.notified().await;
        Ok(placeholder_questions(count))
    }

    async fn generate_hint(
        &self,
        _question: &str,
        _correct_answer: &str,
        _context: Option<&str>,
    ) -> PortResult<String> {
        Ok("a hint".to_string())
    }
}

fn placeholder_questions(count: usize) -> Vec<GeneratedQuestion> {
    (0..count)
        .map(|i| GeneratedQuestion {
            question_text: format!("generated question {i}"),
            correct_answer: "right".to_string(),
            distractors: vec!["w1".to_string(), "w2".to_string(), "w3".to_string()],
            explanation: Some("because".to_string()),
        })
        .collect()
}

/// In-memory `ProgressStore`.
pub struct MemoryProgressStore {
    inner: Mutex<Option<GenerationProgress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    pub fn with_cursor(cursor: i64) -> Self {
        let store = Self::new();
        *store.inner.lock().unwrap() = Some(GenerationProgress {
            last_processed_slide_id: cursor,
            ..GenerationProgress::default()
        });
        store
    }

    pub fn snapshot(&self) -> GenerationProgress {
        self.inner.lock().unwrap().clone().unwrap_or_default()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn load(&self) -> PortResult<GenerationProgress> {
        Ok(self.inner.lock().unwrap().clone().unwrap_or_default())
    }

    async fn save(&self, progress: &GenerationProgress) -> PortResult<()> {
        *self.inner.lock().unwrap() = Some(progress.clone());
        Ok(())
    }

    async fn reset(&self) -> PortResult<()> {
        *self.inner.lock().unwrap() = None;
        Ok(())
    }
}
