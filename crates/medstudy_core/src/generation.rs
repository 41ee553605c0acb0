//! crates/medstudy_core/src/generation.rs
//!
//! The progressive question-generation worker. One background pass at a
//! time walks the slide corpus in id order behind a durable cursor,
//! batching slides into provider calls and persisting both questions and
//! progress after every batch, so a crash loses at most one batch of work.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::domain::{Difficulty, NewQuestion, QuestionSource, Slide};
use crate::ports::{
    ContentStore, GeneratedQuestion, PortError, PortResult, ProgressStore, QuestionGenerator,
};

//=========================================================================================
// Configuration
//=========================================================================================

/// Tunables for one generation pass. Tests shrink the delays to zero; the
/// defaults match the provider's free-tier rate limits.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Slides combined into one provider call.
    pub slide_batch_size: i64,
    /// Questions requested per batch.
    pub questions_per_batch: u32,
    /// Slides with content at or below this many characters are skipped.
    pub min_slide_content_len: i32,
    /// Upper bound on the context blob sent to the provider.
    pub context_char_limit: usize,
    pub inter_batch_delay: Duration,
    pub rate_limit_retries: u32,
    pub rate_limit_backoff: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            slide_batch_size: 3,
            questions_per_batch: 3,
            min_slide_content_len: 100,
            context_char_limit: 4000,
            inter_batch_delay: Duration::from_millis(500),
            rate_limit_retries: 3,
            rate_limit_backoff: Duration::from_secs(35),
        }
    }
}

//=========================================================================================
// Run State
//=========================================================================================

/// Result of a finished pass, kept for status queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub questions_generated: u32,
    pub slides_processed: u32,
    pub last_slide_id: i64,
}

/// Externally queryable worker state. `Completed` and `Failed` both mean
/// idle: a new run may be started from either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed(RunOutcome),
    Failed(String),
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }
}

//=========================================================================================
// GenerationCoordinator
//=========================================================================================

/// Owns the single-run guard and drives generation passes.
///
/// At most one run is active per process; a trigger while a run is active
/// is rejected with `Conflict`, never queued. Concurrent runs would race
/// on the persisted cursor, so the guard is the correctness boundary, not
/// just politeness. Single-process deployment is assumed; multi-instance
/// triggering would need a shared lock this design does not provide.
#[derive(Clone)]
pub struct GenerationCoordinator {
    store: Arc<dyn ContentStore>,
    generator: Arc<dyn QuestionGenerator>,
    progress: Arc<dyn ProgressStore>,
    config: GenerationConfig,
    state: Arc<Mutex<RunState>>,
}

impl GenerationCoordinator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        generator: Arc<dyn QuestionGenerator>,
        progress: Arc<dyn ProgressStore>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            store,
            generator,
            progress,
            config,
            state: Arc::new(Mutex::new(RunState::Idle)),
        }
    }

    /// Snapshot of the current run state.
    pub async fn status(&self) -> RunState {
        self.state.lock().await.clone()
    }

    /// Current persisted progress, for the stats endpoint.
    pub async fn progress_snapshot(&self) -> PortResult<crate::domain::GenerationProgress> {
        self.progress.load().await
    }

    /// Claims the run guard and spawns a background pass for up to
    /// `max_questions` new questions. Returns `Conflict` while another run
    /// is active.
    pub async fn start(&self, max_questions: u32) -> PortResult<()> {
        {
            let mut state = self.state.lock().await;
            if state.is_running() {
                return Err(PortError::Conflict(
                    "question generation is already running".to_string(),
                ));
            }
            *state = RunState::Running;
        }

        info!(max_questions, "starting generation run");
        let coordinator = self.clone();
        tokio::spawn(async move {
            let outcome = coordinator.run_pass(max_questions).await;
            let mut state = coordinator.state.lock().await;
            *state = match outcome {
                Ok(outcome) => {
                    info!(
                        questions = outcome.questions_generated,
                        slides = outcome.slides_processed,
                        cursor = outcome.last_slide_id,
                        "generation run completed"
                    );
                    RunState::Completed(outcome)
                }
                Err(e) => {
                    error!("generation run failed: {e}");
                    RunState::Failed(e.to_string())
                }
            };
        });
        Ok(())
    }

    /// Clears the durable progress record. Rejected while a run is active:
    /// a concurrent reset and run would race on the cursor.
    pub async fn reset_progress(&self) -> PortResult<()> {
        let state = self.state.lock().await;
        if state.is_running() {
            return Err(PortError::Conflict(
                "cannot reset progress while a run is active".to_string(),
            ));
        }
        self.progress.reset().await
    }

    /// One sequential pass over the slide corpus. Batches are strictly
    /// ordered by slide id; the cursor never moves backwards within a
    /// cycle.
    async fn run_pass(&self, max_questions: u32) -> PortResult<RunOutcome> {
        let mut progress = self.progress.load().await?;
        let max_slide_id = self.store.max_slide_id().await?;

        // A cursor at or past the last slide means the previous cycle is
        // done: wrap to the start and recycle the corpus for fresh variants.
        if progress.last_processed_slide_id >= max_slide_id {
            if progress.last_processed_slide_id > 0 {
                info!("all slides processed, wrapping cursor to the start");
            }
            progress.last_processed_slide_id = 0;
            progress.departments_completed.clear();
        }

        let mut generated: u32 = 0;
        let mut slides_processed: u32 = 0;

        while generated < max_questions {
            let slides = self
                .store
                .slides_after(
                    progress.last_processed_slide_id,
                    self.config.min_slide_content_len,
                    self.config.slide_batch_size,
                )
                .await?;
            let Some(last_slide) = slides.last() else {
                // Nothing usable past the cursor: the pass is over. The
                // wrap back to 0 only ever happens at the start of a run.
                break;
            };
            let last_slide_id = last_slide.id;

            let context = build_context(&slides, self.config.context_char_limit);
            let department = slides[0].department.clone();
            let topic = slides[0].topic.clone();
            let need = (max_questions - generated).min(self.config.questions_per_batch) as usize;

            let batch = self.generate_with_retry(&context, need).await;
            let batch_len = batch.len() as u32;
            for question in batch {
                self.persist_question(question, &slides[0], &department, &topic)
                    .await?;
                generated += 1;
            }

            slides_processed += slides.len() as u32;
            progress.last_processed_slide_id = last_slide_id;
            progress.total_questions_generated += batch_len as i64;
            if !progress.departments_completed.contains(&department) {
                progress.departments_completed.push(department);
            }
            progress.last_run = Some(Utc::now());
            self.progress.save(&progress).await?;

            tokio::time::sleep(self.config.inter_batch_delay).await;
        }

        Ok(RunOutcome {
            questions_generated: generated,
            slides_processed,
            last_slide_id: progress.last_processed_slide_id,
        })
    }

    /// Calls the provider, retrying the batch on rate limits with a fixed
    /// backoff. A batch that keeps failing is abandoned (zero questions),
    /// and the pass moves on; provider trouble is never fatal to the run.
    async fn generate_with_retry(&self, context: &str, count: usize) -> Vec<GeneratedQuestion> {
        for attempt in 1..=self.config.rate_limit_retries {
            match self
                .generator
                .generate_questions(context, count, Difficulty::Medium)
                .await
            {
                Ok(questions) => return questions,
                Err(PortError::RateLimited(msg)) if attempt < self.config.rate_limit_retries => {
                    warn!(attempt, "provider rate limited, backing off: {msg}");
                    tokio::time::sleep(self.config.rate_limit_backoff).await;
                }
                Err(e) => {
                    warn!("abandoning batch after provider error: {e}");
                    return Vec::new();
                }
            }
        }
        Vec::new()
    }

    async fn persist_question(
        &self,
        question: GeneratedQuestion,
        first_slide: &Slide,
        department: &str,
        topic: &str,
    ) -> PortResult<()> {
        self.store
            .insert_question(NewQuestion {
                source_document_id: None,
                slide_id: Some(first_slide.id),
                page_number: Some(first_slide.page_number),
                department: Some(department.to_string()),
                topic: Some(topic.to_string()),
                question_text: question.question_text,
                correct_answer: question.correct_answer,
                distractors: question.distractors,
                explanation: question.explanation,
                difficulty: Difficulty::Medium,
                source: QuestionSource::Generated,
            })
            .await?;
        Ok(())
    }
}

/// Concatenates a batch of slides into one provider context blob, bounded
/// to `char_limit` characters on a char boundary.
fn build_context(slides: &[Slide], char_limit: usize) -> String {
    let mut blob = String::new();
    for slide in slides {
        blob.push_str("\n\n[Page ");
        blob.push_str(&slide.page_number.to_string());
        blob.push_str("] ");
        if let Some(title) = &slide.title {
            blob.push_str(title);
        }
        blob.push('\n');
        blob.push_str(&slide.content);
    }
    truncate_chars(&blob, char_limit)
}

fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
