//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ContentStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use medstudy_core::domain::{
    Course, Difficulty, Document, DocumentChunk, ExamStatus, NewQuestion, NewSlide, NewUserExam,
    Question, QuestionSource, Slide, User, UserCredentials, UserExam,
};
use medstudy_core::ports::{
    ContentStore, CourseScope, PortError, PortResult, QuestionFilter,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ContentStore` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
    full_name: Option<String>,
    term: Option<i32>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            full_name: self.full_name,
            term: self.term,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct SlideRecord {
    id: i64,
    department: String,
    topic: String,
    page_number: i32,
    title: Option<String>,
    content: String,
    bullet_points: Option<Json<Vec<String>>>,
    image_url: Option<String>,
    professor: Option<String>,
    source_file: Option<String>,
    created_at: DateTime<Utc>,
}
impl SlideRecord {
    fn to_domain(self) -> Slide {
        Slide {
            id: self.id,
            department: self.department,
            topic: self.topic,
            page_number: self.page_number,
            title: self.title,
            content: self.content,
            bullet_points: self.bullet_points.map(|b| b.0),
            image_url: self.image_url,
            professor: self.professor,
            source_file: self.source_file,
            created_at: self.created_at,
        }
    }
}

const SLIDE_COLUMNS: &str = "id, department, topic, page_number, title, content, bullet_points, \
     image_url, professor, source_file, created_at";

#[derive(FromRow)]
struct QuestionRecord {
    id: i64,
    source_document_id: Option<i64>,
    slide_id: Option<i64>,
    page_number: Option<i32>,
    department: Option<String>,
    topic: Option<String>,
    question_text: String,
    correct_answer: String,
    distractors: Json<Vec<String>>,
    explanation: Option<String>,
    difficulty: String,
    source: String,
    created_at: DateTime<Utc>,
}
impl QuestionRecord {
    fn to_domain(self) -> PortResult<Question> {
        let difficulty = Difficulty::parse(&self.difficulty).ok_or_else(|| {
            PortError::Unexpected(format!("invalid difficulty '{}' in store", self.difficulty))
        })?;
        let source = QuestionSource::parse(&self.source).ok_or_else(|| {
            PortError::Unexpected(format!("invalid question source '{}' in store", self.source))
        })?;
        Ok(Question {
            id: self.id,
            source_document_id: self.source_document_id,
            slide_id: self.slide_id,
            page_number: self.page_number,
            department: self.department,
            topic: self.topic,
            question_text: self.question_text,
            correct_answer: self.correct_answer,
            distractors: self.distractors.0,
            explanation: self.explanation,
            difficulty,
            source,
            created_at: self.created_at,
        })
    }
}

const QUESTION_COLUMNS: &str = "id, source_document_id, slide_id, page_number, department, topic, \
     question_text, correct_answer, distractors, explanation, difficulty, source, created_at";

#[derive(FromRow)]
struct CourseRecord {
    id: i64,
    name: String,
    term: i32,
    description: Option<String>,
}
impl CourseRecord {
    fn to_domain(self) -> Course {
        Course {
            id: self.id,
            name: self.name,
            term: self.term,
            description: self.description,
        }
    }
}

#[derive(FromRow)]
struct DocumentRecord {
    id: i64,
    course_id: i64,
    filename: String,
    total_pages: Option<i32>,
}
impl DocumentRecord {
    fn to_domain(self) -> Document {
        Document {
            id: self.id,
            course_id: self.course_id,
            filename: self.filename,
            total_pages: self.total_pages,
        }
    }
}

#[derive(FromRow)]
struct ChunkRecord {
    id: i64,
    document_id: i64,
    page_number: i32,
    content_text: String,
    embedding: Option<Json<Vec<f32>>>,
}
impl ChunkRecord {
    fn to_domain(self) -> DocumentChunk {
        DocumentChunk {
            id: self.id,
            document_id: self.document_id,
            page_number: self.page_number,
            content_text: self.content_text,
            embedding: self.embedding.map(|e| e.0),
        }
    }
}

#[derive(FromRow)]
struct ExamRecord {
    id: i64,
    user_id: Uuid,
    exam_name: String,
    exam_date: NaiveDate,
    course_id: Option<i64>,
    status: String,
    created_at: DateTime<Utc>,
}
impl ExamRecord {
    fn to_domain(self) -> PortResult<UserExam> {
        let status = ExamStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("invalid exam status '{}' in store", self.status))
        })?;
        Ok(UserExam {
            id: self.id,
            user_id: self.user_id,
            exam_name: self.exam_name,
            exam_date: self.exam_date,
            course_id: self.course_id,
            status,
            created_at: self.created_at,
        })
    }
}

const EXAM_COLUMNS: &str = "id, user_id, exam_name, exam_date, course_id, status, created_at";

//=========================================================================================
// `ContentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentStore for PgStore {
    async fn get_or_create_user(&self, user_id: Uuid) -> PortResult<User> {
        sqlx::query("INSERT INTO users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, full_name, term FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: &str,
        term: i32,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password, full_name, term) \
             VALUES ($1, $2, $3, $4, $5) RETURNING user_id, email, full_name, term",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .bind(full_name)
        .bind(term)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict("email is already registered".to_string())
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users \
             WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn slides_after(
        &self,
        cursor: i64,
        min_content_len: i32,
        limit: i64,
    ) -> PortResult<Vec<Slide>> {
        let records = sqlx::query_as::<_, SlideRecord>(&format!(
            "SELECT {SLIDE_COLUMNS} FROM slides \
             WHERE id > $1 AND char_length(content) > $2 ORDER BY id LIMIT $3",
        ))
        .bind(cursor)
        .bind(min_content_len)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(SlideRecord::to_domain).collect())
    }

    async fn max_slide_id(&self) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(id), 0) FROM slides")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn slide_departments(&self) -> PortResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT department FROM slides ORDER BY department",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn slides_for_department(&self, department: &str) -> PortResult<Vec<Slide>> {
        let records = sqlx::query_as::<_, SlideRecord>(&format!(
            "SELECT {SLIDE_COLUMNS} FROM slides WHERE department = $1 ORDER BY topic, page_number",
        ))
        .bind(department)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(SlideRecord::to_domain).collect())
    }

    async fn slides_for_topic(&self, department: &str, topic: &str) -> PortResult<Vec<Slide>> {
        let records = sqlx::query_as::<_, SlideRecord>(&format!(
            "SELECT {SLIDE_COLUMNS} FROM slides \
             WHERE department = $1 AND topic = $2 ORDER BY page_number",
        ))
        .bind(department)
        .bind(topic)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(SlideRecord::to_domain).collect())
    }

    async fn insert_slides(&self, slides: Vec<NewSlide>) -> PortResult<u64> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let mut inserted = 0u64;
        for slide in slides {
            sqlx::query(
                "INSERT INTO slides (department, topic, page_number, title, content, \
                 bullet_points, image_url, professor, source_file) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(&slide.department)
            .bind(&slide.topic)
            .bind(slide.page_number)
            .bind(&slide.title)
            .bind(&slide.content)
            .bind(slide.bullet_points.map(Json))
            .bind(&slide.image_url)
            .bind(&slide.professor)
            .bind(&slide.source_file)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
            inserted += 1;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(inserted)
    }

    async fn insert_question(&self, question: NewQuestion) -> PortResult<Question> {
        let record = sqlx::query_as::<_, QuestionRecord>(&format!(
            "INSERT INTO questions (source_document_id, slide_id, page_number, department, \
             topic, question_text, correct_answer, distractors, explanation, difficulty, source) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {QUESTION_COLUMNS}",
        ))
        .bind(question.source_document_id)
        .bind(question.slide_id)
        .bind(question.page_number)
        .bind(&question.department)
        .bind(&question.topic)
        .bind(&question.question_text)
        .bind(&question.correct_answer)
        .bind(Json(&question.distractors))
        .bind(&question.explanation)
        .bind(question.difficulty.as_str())
        .bind(question.source.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_question(&self, question_id: i64) -> PortResult<Question> {
        let record = sqlx::query_as::<_, QuestionRecord>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1",
        ))
        .bind(question_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Question {} not found", question_id))
            }
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn questions_filtered(&self, filter: &QuestionFilter) -> PortResult<Vec<Question>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM questions q",
            QUESTION_COLUMNS
                .split(", ")
                .map(|c| format!("q.{c}"))
                .collect::<Vec<_>>()
                .join(", "),
        ));

        // Course scoping goes through the source document, so questions
        // without one drop out of any course-restricted query.
        match filter.course_scope {
            CourseScope::Any => {
                builder.push(" WHERE TRUE");
            }
            CourseScope::Only(course_id) => {
                builder.push(" JOIN documents d ON d.id = q.source_document_id WHERE d.course_id = ");
                builder.push_bind(course_id);
            }
            CourseScope::Excluding(course_id) => {
                builder
                    .push(" JOIN documents d ON d.id = q.source_document_id WHERE d.course_id <> ");
                builder.push_bind(course_id);
            }
        }

        if let Some(difficulty) = filter.difficulty {
            builder.push(" AND q.difficulty = ");
            builder.push_bind(difficulty.as_str());
        }
        if !filter.include_past_papers {
            builder.push(" AND q.source <> 'past_paper'");
        }

        // Deterministic order: randomization is the caller's job.
        builder.push(" ORDER BY q.id LIMIT ");
        builder.push_bind(filter.limit);

        let records = builder
            .build_query_as::<QuestionRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(QuestionRecord::to_domain).collect()
    }

    async fn count_questions(&self) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn create_course(
        &self,
        name: &str,
        term: i32,
        description: Option<&str>,
    ) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(
            "INSERT INTO courses (name, term, description) VALUES ($1, $2, $3) \
             RETURNING id, name, term, description",
        )
        .bind(name)
        .bind(term)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_courses(&self, term: Option<i32>) -> PortResult<Vec<Course>> {
        let records = match term {
            Some(term) => {
                sqlx::query_as::<_, CourseRecord>(
                    "SELECT id, name, term, description FROM courses WHERE term = $1 \
                     ORDER BY term, name",
                )
                .bind(term)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, CourseRecord>(
                    "SELECT id, name, term, description FROM courses ORDER BY term, name",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(unexpected)?;
        Ok(records.into_iter().map(CourseRecord::to_domain).collect())
    }

    async fn get_course(&self, course_id: i64) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(
            "SELECT id, name, term, description FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Course {} not found", course_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_document(
        &self,
        course_id: i64,
        filename: &str,
        total_pages: Option<i32>,
    ) -> PortResult<Document> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "INSERT INTO documents (course_id, filename, total_pages) VALUES ($1, $2, $3) \
             RETURNING id, course_id, filename, total_pages",
        )
        .bind(course_id)
        .bind(filename)
        .bind(total_pages)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn insert_chunk(
        &self,
        document_id: i64,
        page_number: i32,
        content_text: &str,
        embedding: Option<Vec<f32>>,
    ) -> PortResult<DocumentChunk> {
        let record = sqlx::query_as::<_, ChunkRecord>(
            "INSERT INTO document_chunks (document_id, page_number, content_text, embedding) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, document_id, page_number, content_text, embedding",
        )
        .bind(document_id)
        .bind(page_number)
        .bind(content_text)
        .bind(embedding.map(Json))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn chunks_for_document(&self, document_id: i64) -> PortResult<Vec<DocumentChunk>> {
        let records = sqlx::query_as::<_, ChunkRecord>(
            "SELECT id, document_id, page_number, content_text, embedding \
             FROM document_chunks WHERE document_id = $1 ORDER BY page_number",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ChunkRecord::to_domain).collect())
    }

    async fn chunk_for_page(
        &self,
        document_id: i64,
        page_number: i32,
    ) -> PortResult<Option<DocumentChunk>> {
        let record = sqlx::query_as::<_, ChunkRecord>(
            "SELECT id, document_id, page_number, content_text, embedding \
             FROM document_chunks WHERE document_id = $1 AND page_number = $2",
        )
        .bind(document_id)
        .bind(page_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(ChunkRecord::to_domain))
    }

    async fn create_exam(&self, exam: NewUserExam) -> PortResult<UserExam> {
        let record = sqlx::query_as::<_, ExamRecord>(&format!(
            "INSERT INTO user_exams (user_id, exam_name, exam_date, course_id) \
             VALUES ($1, $2, $3, $4) RETURNING {EXAM_COLUMNS}",
        ))
        .bind(exam.user_id)
        .bind(&exam.exam_name)
        .bind(exam.exam_date)
        .bind(exam.course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn exams_for_user(&self, user_id: Uuid) -> PortResult<Vec<UserExam>> {
        let records = sqlx::query_as::<_, ExamRecord>(&format!(
            "SELECT {EXAM_COLUMNS} FROM user_exams WHERE user_id = $1 ORDER BY exam_date",
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(ExamRecord::to_domain).collect()
    }

    async fn get_exam_for_user(&self, exam_id: i64, user_id: Uuid) -> PortResult<UserExam> {
        let record = sqlx::query_as::<_, ExamRecord>(&format!(
            "SELECT {EXAM_COLUMNS} FROM user_exams WHERE id = $1 AND user_id = $2",
        ))
        .bind(exam_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Exam {} not found", exam_id)),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn next_exam_for_user(
        &self,
        user_id: Uuid,
        on_or_after: NaiveDate,
    ) -> PortResult<Option<UserExam>> {
        let record = sqlx::query_as::<_, ExamRecord>(&format!(
            "SELECT {EXAM_COLUMNS} FROM user_exams \
             WHERE user_id = $1 AND exam_date >= $2 ORDER BY exam_date LIMIT 1",
        ))
        .bind(user_id)
        .bind(on_or_after)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(ExamRecord::to_domain).transpose()
    }
}
