//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{FileProgressStore, HttpEmbeddingAdapter, OpenAiQuestionAdapter, PgStore},
    config::Config,
    error::ApiError,
    web::{admin, auth, content, exams, questions, require_auth, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use medstudy_core::generation::{GenerationConfig, GenerationCoordinator};
use medstudy_core::ports::{ContentStore, EmbeddingService, QuestionGenerator};
use medstudy_core::sampler::DailyMixService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool.clone()));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let generator: Arc<dyn QuestionGenerator> = Arc::new(OpenAiQuestionAdapter::new(
        openai_client.clone(),
        config.question_model.clone(),
        config.hint_model.clone(),
    ));
    let embedder: Arc<dyn EmbeddingService> = Arc::new(HttpEmbeddingAdapter::new(
        config.embedding_api_base.clone(),
        config.openai_api_key.clone(),
        config.embedding_model.clone(),
    ));
    let progress_store = Arc::new(FileProgressStore::new(
        config.generation_progress_path.clone(),
    ));

    // --- 4. Build the Core Services and Shared AppState ---
    let content_store: Arc<dyn ContentStore> = store;
    let coordinator = Arc::new(GenerationCoordinator::new(
        Arc::clone(&content_store),
        Arc::clone(&generator),
        progress_store,
        GenerationConfig::default(),
    ));
    let daily_mix = Arc::new(DailyMixService::new(Arc::clone(&content_store)));

    let app_state = Arc::new(AppState {
        store: content_store,
        config: config.clone(),
        generator,
        embedder,
        daily_mix,
        coordinator,
    });

    let cors_origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {e}")))?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/questions", get(questions::list_questions_handler))
        .route("/questions/{id}", get(questions::get_question_handler))
        .route(
            "/questions/{id}/hint",
            post(questions::question_hint_handler),
        )
        .route(
            "/questions/{id}/answer",
            post(questions::submit_answer_handler),
        )
        .route(
            "/exams",
            post(exams::create_exam_handler).get(exams::list_exams_handler),
        )
        .route("/exams/daily", get(exams::daily_mix_handler))
        .route("/exams/{id}", get(exams::get_exam_handler))
        .route(
            "/courses",
            get(content::list_courses_handler).post(content::create_course_handler),
        )
        .route("/courses/{id}", get(content::get_course_handler))
        .route(
            "/slides/departments",
            get(content::slide_departments_handler),
        )
        .route(
            "/slides/departments/{department}/topics",
            get(content::department_topics_handler),
        )
        .route(
            "/slides/departments/{department}/topics/{topic}",
            get(content::topic_slides_handler),
        )
        .route("/slides/import", post(content::import_slides_handler))
        .route("/documents", post(content::import_document_handler))
        .route(
            "/documents/{id}/search",
            get(content::search_document_handler),
        )
        .route(
            "/admin/generate-questions",
            post(admin::trigger_generation_handler),
        )
        .route(
            "/admin/generate-questions/status",
            get(admin::generation_status_handler),
        )
        .route(
            "/admin/generation-stats",
            get(admin::generation_stats_handler),
        )
        .route(
            "/admin/reset-generation-progress",
            post(admin::reset_generation_progress_handler),
        )
        .route(
            "/admin/import-questions",
            post(admin::import_questions_handler),
        )
        .route("/admin/question-count", get(admin::question_count_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
