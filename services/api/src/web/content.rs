//! services/api/src/web/content.rs
//!
//! Content endpoints: courses, slide browsing/import, and document import
//! with best-effort embedding search.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::web::rest::port_error_response;
use crate::web::state::AppState;
use medstudy_core::domain::{NewSlide, Slide};
use medstudy_core::similarity::rank_chunks;

const SEARCH_DEFAULT_TOP_K: usize = 5;
const SEARCH_SNIPPET_CHAR_LIMIT: usize = 200;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CourseCreate {
    pub name: String,
    pub term: i32,
    pub description: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CourseResponse {
    pub id: i64,
    pub name: String,
    pub term: i32,
    pub description: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCoursesParams {
    /// Filter to one term, e.g. the user's current dönem.
    pub term: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct SlideResponse {
    pub id: i64,
    pub department: String,
    pub topic: String,
    pub page_number: i32,
    pub title: Option<String>,
    pub content: String,
    pub bullet_points: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub professor: Option<String>,
}

impl SlideResponse {
    fn from_slide(slide: Slide) -> Self {
        Self {
            id: slide.id,
            department: slide.department,
            topic: slide.topic,
            page_number: slide.page_number,
            title: slide.title,
            content: slide.content,
            bullet_points: slide.bullet_points,
            image_url: slide.image_url,
            professor: slide.professor,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TopicSummary {
    pub topic: String,
    pub slide_count: usize,
    pub professor: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SlideImport {
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

#[derive(Serialize, ToSchema)]
pub struct SlideImportResponse {
    pub imported_count: u64,
    pub status: String,
}

/// A document arrives pre-parsed: an ordered sequence of (page, text)
/// pairs. Parsing the file itself happens upstream.
#[derive(Deserialize, ToSchema)]
pub struct DocumentImportRequest {
    pub course_id: i64,
    pub filename: String,
    pub pages: Vec<PageImport>,
}

#[derive(Deserialize, ToSchema)]
pub struct PageImport {
    pub page_number: i32,
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentImportResponse {
    pub document_id: i64,
    pub course_id: i64,
    pub filename: String,
    pub chunks_created: usize,
    pub chunks_embedded: usize,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// The query text.
    pub q: String,
    /// How many chunks to return (default 5).
    pub top_k: Option<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct ChunkSearchResult {
    pub page_number: i32,
    pub score: f32,
    pub snippet: String,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentSearchResponse {
    pub results: Vec<ChunkSearchResult>,
}

//=========================================================================================
// Course Handlers
//=========================================================================================

/// GET /courses - List all courses, optionally filtered by term.
#[utoipa::path(
    get,
    path = "/courses",
    params(ListCoursesParams),
    responses((status = 200, description = "Courses", body = [CourseResponse]))
)]
pub async fn list_courses_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListCoursesParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let courses = state
        .store
        .list_courses(params.term)
        .await
        .map_err(port_error_response)?;
    let response: Vec<CourseResponse> = courses
        .into_iter()
        .map(|c| CourseResponse {
            id: c.id,
            name: c.name,
            term: c.term,
            description: c.description,
        })
        .collect();
    Ok(Json(response))
}

/// POST /courses - Create a new course.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = CourseCreate,
    responses((status = 201, description = "Course created", body = CourseResponse))
)]
pub async fn create_course_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CourseCreate>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = state
        .store
        .create_course(&req.name, req.term, req.description.as_deref())
        .await
        .map_err(port_error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(CourseResponse {
            id: course.id,
            name: course.name,
            term: course.term,
            description: course.description,
        }),
    ))
}

/// GET /courses/{id} - Get a specific course by ID.
#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = i64, Path, description = "Course id")),
    responses(
        (status = 200, description = "The course", body = CourseResponse),
        (status = 404, description = "Course not found")
    )
)]
pub async fn get_course_handler(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = state
        .store
        .get_course(course_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(CourseResponse {
        id: course.id,
        name: course.name,
        term: course.term,
        description: course.description,
    }))
}

//=========================================================================================
// Slide Handlers
//=========================================================================================

/// GET /slides/departments - All departments that have slides.
#[utoipa::path(
    get,
    path = "/slides/departments",
    responses((status = 200, description = "Department names"))
)]
pub async fn slide_departments_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let departments = state
        .store
        .slide_departments()
        .await
        .map_err(port_error_response)?;
    Ok(Json(serde_json::json!({ "departments": departments })))
}

/// GET /slides/departments/{department}/topics - Topics in a department.
#[utoipa::path(
    get,
    path = "/slides/departments/{department}/topics",
    params(("department" = String, Path, description = "Department name")),
    responses((status = 200, description = "Topics with slide counts", body = [TopicSummary]))
)]
pub async fn department_topics_handler(
    State(state): State<Arc<AppState>>,
    Path(department): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let slides = state
        .store
        .slides_for_department(&department)
        .await
        .map_err(port_error_response)?;

    // Group by topic; a BTreeMap keeps the topic list sorted.
    let mut topics: BTreeMap<String, TopicSummary> = BTreeMap::new();
    for slide in slides {
        let entry = topics.entry(slide.topic.clone()).or_insert(TopicSummary {
            topic: slide.topic,
            slide_count: 0,
            professor: slide.professor,
        });
        entry.slide_count += 1;
    }
    let response: Vec<TopicSummary> = topics.into_values().collect();
    Ok(Json(response))
}

/// GET /slides/departments/{department}/topics/{topic} - Slides for one topic.
#[utoipa::path(
    get,
    path = "/slides/departments/{department}/topics/{topic}",
    params(
        ("department" = String, Path, description = "Department name"),
        ("topic" = String, Path, description = "Topic name")
    ),
    responses((status = 200, description = "Slides ordered by page", body = [SlideResponse]))
)]
pub async fn topic_slides_handler(
    State(state): State<Arc<AppState>>,
    Path((department, topic)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let slides = state
        .store
        .slides_for_topic(&department, &topic)
        .await
        .map_err(port_error_response)?;
    let response: Vec<SlideResponse> = slides.into_iter().map(SlideResponse::from_slide).collect();
    Ok(Json(response))
}

/// POST /slides/import - Bulk import parsed slides.
#[utoipa::path(
    post,
    path = "/slides/import",
    request_body = [SlideImport],
    responses((status = 201, description = "Slides imported", body = SlideImportResponse))
)]
pub async fn import_slides_handler(
    State(state): State<Arc<AppState>>,
    Json(slides): Json<Vec<SlideImport>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let new_slides: Vec<NewSlide> = slides
        .into_iter()
        .map(|s| NewSlide {
            department: s.department,
            topic: s.topic,
            page_number: s.page_number,
            title: s.title,
            content: s.content,
            bullet_points: s.bullet_points,
            image_url: s.image_url,
            professor: s.professor,
            source_file: s.source_file,
        })
        .collect();

    let imported_count = state
        .store
        .insert_slides(new_slides)
        .await
        .map_err(port_error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(SlideImportResponse {
            imported_count,
            status: "imported".to_string(),
        }),
    ))
}

//=========================================================================================
// Document Handlers
//=========================================================================================

/// POST /documents - Import a pre-parsed document with its pages.
///
/// Embeddings are computed per page on a best-effort basis; pages the
/// embedding provider cannot handle are stored without one and simply
/// never rank in search.
#[utoipa::path(
    post,
    path = "/documents",
    request_body = DocumentImportRequest,
    responses(
        (status = 201, description = "Document stored", body = DocumentImportResponse),
        (status = 404, description = "Course not found")
    )
)]
pub async fn import_document_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DocumentImportRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = state
        .store
        .get_course(req.course_id)
        .await
        .map_err(port_error_response)?;

    let document = state
        .store
        .create_document(course.id, &req.filename, Some(req.pages.len() as i32))
        .await
        .map_err(port_error_response)?;

    let mut chunks_created = 0usize;
    let mut chunks_embedded = 0usize;
    for page in req.pages {
        let embedding = state
            .embedder
            .embed(&page.text)
            .await
            .map_err(port_error_response)?;
        let embedding = if embedding.is_empty() {
            None
        } else {
            chunks_embedded += 1;
            Some(embedding)
        };
        state
            .store
            .insert_chunk(document.id, page.page_number, &page.text, embedding)
            .await
            .map_err(port_error_response)?;
        chunks_created += 1;
    }

    Ok((
        StatusCode::CREATED,
        Json(DocumentImportResponse {
            document_id: document.id,
            course_id: document.course_id,
            filename: document.filename,
            chunks_created,
            chunks_embedded,
        }),
    ))
}

/// GET /documents/{id}/search - Rank a document's chunks against a query.
///
/// Best-effort similarity: when the query cannot be embedded the result is
/// an empty list, not an error.
#[utoipa::path(
    get,
    path = "/documents/{id}/search",
    params(("id" = i64, Path, description = "Document id"), SearchParams),
    responses((status = 200, description = "Chunks ranked by similarity", body = DocumentSearchResponse))
)]
pub async fn search_document_handler(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<i64>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let query_embedding = state
        .embedder
        .embed(&params.q)
        .await
        .map_err(port_error_response)?;
    if query_embedding.is_empty() {
        return Ok(Json(DocumentSearchResponse { results: Vec::new() }));
    }

    let chunks = state
        .store
        .chunks_for_document(document_id)
        .await
        .map_err(port_error_response)?;

    let top_k = params.top_k.unwrap_or(SEARCH_DEFAULT_TOP_K);
    let results = rank_chunks(&query_embedding, chunks, top_k)
        .into_iter()
        .map(|scored| ChunkSearchResult {
            page_number: scored.chunk.page_number,
            score: scored.score,
            snippet: scored
                .chunk
                .content_text
                .chars()
                .take(SEARCH_SNIPPET_CHAR_LIMIT)
                .collect(),
        })
        .collect();

    Ok(Json(DocumentSearchResponse { results }))
}
