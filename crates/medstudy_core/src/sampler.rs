//! crates/medstudy_core/src/sampler.rs
//!
//! The weighted question sampler and the daily-mix orchestration built on
//! top of it. Store queries stay deterministic (ordered by id); any
//! shuffling happens here, after the rows come back.

use std::sync::Arc;

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::domain::{Difficulty, Question};
use crate::exam_logic::{
    resolve_mode, DifficultyWeights, StudyMode, QUESTIONS_PER_COURSE,
};
use crate::ports::{ContentStore, CourseScope, PortResult, QuestionFilter};

/// Free-study serving size when no exam is scheduled.
pub const FREE_STUDY_LIMIT: usize = 20;
/// Cramming split: most questions come from the focus course.
pub const CRAMMING_FOCUS_LIMIT: usize = 15;
pub const CRAMMING_OTHER_LIMIT: usize = 5;
/// Cramming without a focus course falls back to one unscoped batch.
pub const CRAMMING_UNSCOPED_LIMIT: usize = 20;

//=========================================================================================
// Weighted Counts
//=========================================================================================

/// Splits `target` into per-difficulty counts using `floor(target * weight)`
/// for every difficulty with a positive weight.
///
/// The integer shortfall left by truncation is added entirely to medium,
/// even when medium's weight is zero. The total therefore never falls short
/// of `target`, at the cost of skewing toward medium when the weights do
/// not divide evenly. This rounding policy is a contract, not an
/// approximation detail.
pub fn difficulty_counts(weights: &DifficultyWeights, target: usize) -> Vec<(Difficulty, usize)> {
    let weight_of = |difficulty: Difficulty| match difficulty {
        Difficulty::Easy => weights.easy,
        Difficulty::Medium => weights.medium,
        Difficulty::Hard => weights.hard,
    };

    let mut counts: Vec<(Difficulty, usize)> = Difficulty::ALL
        .into_iter()
        .map(|difficulty| {
            let weight = weight_of(difficulty);
            let count = if weight > 0.0 {
                (target as f64 * weight).floor() as usize
            } else {
                0
            };
            (difficulty, count)
        })
        .collect();

    let assigned: usize = counts.iter().map(|(_, count)| count).sum();
    let shortfall = target.saturating_sub(assigned);
    if shortfall > 0 {
        counts[1].1 += shortfall; // medium
    }
    counts
}

//=========================================================================================
// QuestionSampler
//=========================================================================================

/// Samples a weighted difficulty mixture out of the question pool.
pub struct QuestionSampler {
    store: Arc<dyn ContentStore>,
}

impl QuestionSampler {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Runs one store query per non-zero difficulty count and concatenates
    /// the batches. The result is in per-difficulty store order; the caller
    /// is responsible for the final shuffle.
    ///
    /// An empty store or scope yields an empty (or short) list, never an
    /// error.
    pub async fn sample(
        &self,
        weights: &DifficultyWeights,
        target: usize,
        course_scope: CourseScope,
        past_papers_allowed: bool,
    ) -> PortResult<Vec<Question>> {
        let mut questions = Vec::with_capacity(target);
        for (difficulty, count) in difficulty_counts(weights, target) {
            if count == 0 {
                continue;
            }
            let filter = QuestionFilter {
                difficulty: Some(difficulty),
                include_past_papers: past_papers_allowed,
                course_scope,
                limit: count as i64,
            };
            questions.extend(self.store.questions_filtered(&filter).await?);
        }
        Ok(questions)
    }
}

//=========================================================================================
// Daily Mix
//=========================================================================================

/// What the client gets for "today's questions".
#[derive(Debug, Clone)]
pub struct DailyMix {
    pub mode: StudyMode,
    pub days_remaining: i64,
    pub past_papers_unlocked: bool,
    pub exam_name: Option<String>,
    pub questions: Vec<Question>,
}

/// Composes the mode selector and the sampler into the daily serving.
pub struct DailyMixService {
    store: Arc<dyn ContentStore>,
    sampler: QuestionSampler,
}

impl DailyMixService {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            sampler: QuestionSampler::new(Arc::clone(&store)),
            store,
        }
    }

    /// Builds the daily question mix for one user.
    ///
    /// `today` is injected rather than read from the clock so the whole
    /// policy stays testable with fixed dates.
    pub async fn daily_mix(&self, user_id: Uuid, today: NaiveDate) -> PortResult<DailyMix> {
        let exam = self.store.next_exam_for_user(user_id, today).await?;
        let decision = resolve_mode(today, exam.as_ref().map(|e| e.exam_date));

        let questions = match decision.mode {
            StudyMode::FreeStudy => self.free_study_questions().await?,
            StudyMode::GeneralReview => self.general_review_questions(&decision.weights).await?,
            StudyMode::Cramming => {
                let focus_course = exam.as_ref().and_then(|e| e.course_id);
                self.cramming_questions(focus_course, &decision.weights)
                    .await?
            }
        };

        Ok(DailyMix {
            mode: decision.mode,
            days_remaining: decision.days_remaining,
            past_papers_unlocked: decision.past_papers_unlocked,
            exam_name: exam.map(|e| e.exam_name),
            questions,
        })
    }

    /// No exam: a fixed serving of non-past-paper questions in store order.
    async fn free_study_questions(&self) -> PortResult<Vec<Question>> {
        let filter = QuestionFilter {
            difficulty: None,
            include_past_papers: false,
            course_scope: CourseScope::Any,
            limit: FREE_STUDY_LIMIT as i64,
        };
        self.store.questions_filtered(&filter).await
    }

    /// More than a week out: a small weighted batch from every course in
    /// the catalog, shuffled together.
    async fn general_review_questions(
        &self,
        weights: &DifficultyWeights,
    ) -> PortResult<Vec<Question>> {
        let mut questions = Vec::new();
        for course in self.store.list_courses(None).await? {
            let batch = self
                .sampler
                .sample(weights, QUESTIONS_PER_COURSE, CourseScope::Only(course.id), false)
                .await?;
            questions.extend(batch);
        }
        questions.shuffle(&mut rand::thread_rng());
        Ok(questions)
    }

    /// Final week: concentrate on the focus course with past papers
    /// unlocked, topped up from the other courses.
    async fn cramming_questions(
        &self,
        focus_course: Option<i64>,
        weights: &DifficultyWeights,
    ) -> PortResult<Vec<Question>> {
        let mut questions = match focus_course {
            Some(course_id) => {
                let mut questions = self
                    .sampler
                    .sample(weights, CRAMMING_FOCUS_LIMIT, CourseScope::Only(course_id), true)
                    .await?;
                let others = self
                    .sampler
                    .sample(
                        weights,
                        CRAMMING_OTHER_LIMIT,
                        CourseScope::Excluding(course_id),
                        false,
                    )
                    .await?;
                questions.extend(others);
                questions
            }
            None => {
                self.sampler
                    .sample(weights, CRAMMING_UNSCOPED_LIMIT, CourseScope::Any, true)
                    .await?
            }
        };
        questions.shuffle(&mut rand::thread_rng());
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuestionSource;
    use crate::exam_logic::{CRAMMING_WEIGHTS, GENERAL_REVIEW_WEIGHTS};
    use crate::testing::MemoryStore;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn review_weights_split_seven_as_four_three() {
        let counts = difficulty_counts(&GENERAL_REVIEW_WEIGHTS, 7);
        assert_eq!(
            counts,
            vec![
                (Difficulty::Easy, 4),
                (Difficulty::Medium, 3),
                (Difficulty::Hard, 0),
            ]
        );
    }

    #[test]
    fn cramming_weights_split_twenty_cleanly() {
        let counts = difficulty_counts(&CRAMMING_WEIGHTS, 20);
        assert_eq!(
            counts,
            vec![
                (Difficulty::Easy, 0),
                (Difficulty::Medium, 8),
                (Difficulty::Hard, 12),
            ]
        );
    }

    #[test]
    fn truncation_shortfall_lands_on_medium() {
        // 7 * 0.4 = 2.8 and 7 * 0.6 = 4.2 floor to 2 + 4 = 6; the missing
        // question goes to medium.
        let counts = difficulty_counts(&CRAMMING_WEIGHTS, 7);
        assert_eq!(
            counts,
            vec![
                (Difficulty::Easy, 0),
                (Difficulty::Medium, 3),
                (Difficulty::Hard, 4),
            ]
        );
        let total: usize = counts.iter().map(|(_, c)| c).sum();
        assert_eq!(total, 7);
    }

    #[test]
    fn shortfall_reaches_medium_even_with_zero_medium_weight() {
        let hard_only = DifficultyWeights {
            easy: 0.0,
            medium: 0.0,
            hard: 0.9,
        };
        let counts = difficulty_counts(&hard_only, 10);
        assert_eq!(
            counts,
            vec![
                (Difficulty::Easy, 0),
                (Difficulty::Medium, 1),
                (Difficulty::Hard, 9),
            ]
        );
    }

    #[tokio::test]
    async fn sample_returns_exactly_target_when_pool_is_deep() {
        let store = Arc::new(MemoryStore::new());
        for _ in 0..20 {
            store.add_question(Difficulty::Easy, QuestionSource::Generated, None);
            store.add_question(Difficulty::Medium, QuestionSource::Generated, None);
        }
        let sampler = QuestionSampler::new(store);
        let questions = sampler
            .sample(&GENERAL_REVIEW_WEIGHTS, 7, CourseScope::Any, false)
            .await
            .unwrap();
        assert_eq!(questions.len(), 7);
        let easy = questions
            .iter()
            .filter(|q| q.difficulty == Difficulty::Easy)
            .count();
        assert_eq!(easy, 4);
    }

    #[tokio::test]
    async fn sample_degrades_to_what_the_store_has() {
        let store = Arc::new(MemoryStore::new());
        store.add_question(Difficulty::Easy, QuestionSource::Generated, None);
        let sampler = QuestionSampler::new(store);
        let questions = sampler
            .sample(&GENERAL_REVIEW_WEIGHTS, 7, CourseScope::Any, false)
            .await
            .unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[tokio::test]
    async fn empty_store_yields_empty_list_not_error() {
        let store = Arc::new(MemoryStore::new());
        let sampler = QuestionSampler::new(store);
        let questions = sampler
            .sample(&CRAMMING_WEIGHTS, 20, CourseScope::Any, true)
            .await
            .unwrap();
        assert!(questions.is_empty());
    }

    #[tokio::test]
    async fn past_papers_filtered_unless_allowed() {
        let store = Arc::new(MemoryStore::new());
        for _ in 0..5 {
            store.add_question(Difficulty::Hard, QuestionSource::PastPaper, None);
            store.add_question(Difficulty::Hard, QuestionSource::Generated, None);
        }
        let sampler = QuestionSampler::new(Arc::clone(&store) as Arc<dyn ContentStore>);

        let locked = sampler
            .sample(&CRAMMING_WEIGHTS, 10, CourseScope::Any, false)
            .await
            .unwrap();
        assert!(locked.iter().all(|q| !q.source.is_past_paper()));

        let unlocked = sampler
            .sample(&CRAMMING_WEIGHTS, 10, CourseScope::Any, true)
            .await
            .unwrap();
        assert!(unlocked.iter().any(|q| q.source.is_past_paper()));
    }

    #[tokio::test]
    async fn course_scope_follows_the_source_document() {
        let store = Arc::new(MemoryStore::new());
        let anatomy = store.add_course("Anatomy");
        let pharmacology = store.add_course("Pharmacology");
        let anatomy_doc = store.add_document(anatomy);
        let pharmacology_doc = store.add_document(pharmacology);
        for _ in 0..10 {
            store.add_question(Difficulty::Medium, QuestionSource::Generated, Some(anatomy_doc));
            store.add_question(
                Difficulty::Medium,
                QuestionSource::Generated,
                Some(pharmacology_doc),
            );
        }
        let sampler = QuestionSampler::new(Arc::clone(&store) as Arc<dyn ContentStore>);
        let weights = DifficultyWeights {
            easy: 0.0,
            medium: 1.0,
            hard: 0.0,
        };

        let only = sampler
            .sample(&weights, 5, CourseScope::Only(anatomy), false)
            .await
            .unwrap();
        assert_eq!(only.len(), 5);
        assert!(only.iter().all(|q| q.source_document_id == Some(anatomy_doc)));

        let excluding = sampler
            .sample(&weights, 5, CourseScope::Excluding(anatomy), false)
            .await
            .unwrap();
        assert_eq!(excluding.len(), 5);
        assert!(excluding
            .iter()
            .all(|q| q.source_document_id == Some(pharmacology_doc)));
    }

    #[tokio::test]
    async fn daily_mix_without_exam_is_deterministic_free_study() {
        let store = Arc::new(MemoryStore::new());
        for _ in 0..30 {
            store.add_question(Difficulty::Easy, QuestionSource::Generated, None);
        }
        store.add_question(Difficulty::Easy, QuestionSource::PastPaper, None);
        let service = DailyMixService::new(Arc::clone(&store) as Arc<dyn ContentStore>);

        let mix = service
            .daily_mix(Uuid::new_v4(), date(2024, 3, 1))
            .await
            .unwrap();
        assert_eq!(mix.mode, StudyMode::FreeStudy);
        assert_eq!(mix.days_remaining, -1);
        assert!(!mix.past_papers_unlocked);
        assert_eq!(mix.exam_name, None);
        assert_eq!(mix.questions.len(), FREE_STUDY_LIMIT);
        assert!(mix.questions.iter().all(|q| !q.source.is_past_paper()));
        // Deterministic: ids come back in store order.
        let ids: Vec<i64> = mix.questions.iter().map(|q| q.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn daily_mix_far_exam_reviews_every_course() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        for name in ["Anatomy", "Pharmacology", "Pathology"] {
            let course = store.add_course(name);
            let document = store.add_document(course);
            for _ in 0..10 {
                store.add_question(Difficulty::Easy, QuestionSource::Generated, Some(document));
                store.add_question(Difficulty::Medium, QuestionSource::Generated, Some(document));
            }
        }
        store.add_exam(user, "Committee I", date(2024, 3, 20), None);
        let service = DailyMixService::new(Arc::clone(&store) as Arc<dyn ContentStore>);

        let mix = service.daily_mix(user, date(2024, 3, 1)).await.unwrap();
        assert_eq!(mix.mode, StudyMode::GeneralReview);
        assert_eq!(mix.days_remaining, 19);
        assert!(!mix.past_papers_unlocked);
        assert_eq!(mix.exam_name.as_deref(), Some("Committee I"));
        assert_eq!(mix.questions.len(), 3 * QUESTIONS_PER_COURSE);
    }

    #[tokio::test]
    async fn daily_mix_near_exam_crams_on_the_focus_course() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        let focus = store.add_course("Pathology");
        let other = store.add_course("Anatomy");
        let focus_doc = store.add_document(focus);
        let other_doc = store.add_document(other);
        for _ in 0..20 {
            store.add_question(Difficulty::Medium, QuestionSource::Generated, Some(focus_doc));
            store.add_question(Difficulty::Hard, QuestionSource::Generated, Some(focus_doc));
            store.add_question(Difficulty::Medium, QuestionSource::Generated, Some(other_doc));
            store.add_question(Difficulty::Hard, QuestionSource::Generated, Some(other_doc));
        }
        store.add_exam(user, "Pathology Final", date(2024, 3, 4), Some(focus));
        let service = DailyMixService::new(Arc::clone(&store) as Arc<dyn ContentStore>);

        let mix = service.daily_mix(user, date(2024, 3, 1)).await.unwrap();
        assert_eq!(mix.mode, StudyMode::Cramming);
        assert_eq!(mix.days_remaining, 3);
        assert!(mix.past_papers_unlocked);
        assert_eq!(
            mix.questions.len(),
            CRAMMING_FOCUS_LIMIT + CRAMMING_OTHER_LIMIT
        );
        let from_focus = mix
            .questions
            .iter()
            .filter(|q| q.source_document_id == Some(focus_doc))
            .count();
        assert_eq!(from_focus, CRAMMING_FOCUS_LIMIT);
    }

    #[tokio::test]
    async fn nearest_future_exam_wins_and_past_exams_are_ignored() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        store.add_exam(user, "Already over", date(2024, 2, 1), None);
        store.add_exam(user, "Soon", date(2024, 3, 5), None);
        store.add_exam(user, "Later", date(2024, 4, 1), None);
        let service = DailyMixService::new(Arc::clone(&store) as Arc<dyn ContentStore>);

        let mix = service.daily_mix(user, date(2024, 3, 1)).await.unwrap();
        assert_eq!(mix.exam_name.as_deref(), Some("Soon"));
        assert_eq!(mix.days_remaining, 4);
        assert_eq!(mix.mode, StudyMode::Cramming);
    }
}
