//! crates/medstudy_core/src/exam_logic.rs
//!
//! The 7-day logic: maps days-until-exam onto a study mode with a
//! difficulty-weight distribution and a past-paper gate. Pure functions of
//! the dates passed in, so the whole policy is unit-testable.

use chrono::NaiveDate;

/// Days remaining above which the app stays in general review.
pub const GENERAL_REVIEW_THRESHOLD_DAYS: i64 = 7;

/// How many questions each course contributes in general review.
pub const QUESTIONS_PER_COURSE: usize = 7;

/// Sentinel for "no upcoming exam".
pub const NO_EXAM_DAYS_REMAINING: i64 = -1;

//=========================================================================================
// Modes and Weights
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyMode {
    FreeStudy,
    GeneralReview,
    Cramming,
}

impl StudyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyMode::FreeStudy => "free_study",
            StudyMode::GeneralReview => "general_review",
            StudyMode::Cramming => "cramming",
        }
    }
}

/// Fractions of a target count per difficulty. Conceptually these sum to
/// 1.0; the sampler's rounding rule decides what happens to the remainder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyWeights {
    pub easy: f64,
    pub medium: f64,
    pub hard: f64,
}

/// Easy-leaning mix used while the exam is still far away.
pub const GENERAL_REVIEW_WEIGHTS: DifficultyWeights = DifficultyWeights {
    easy: 0.6,
    medium: 0.4,
    hard: 0.0,
};

/// Hard-leaning mix for the final week.
pub const CRAMMING_WEIGHTS: DifficultyWeights = DifficultyWeights {
    easy: 0.0,
    medium: 0.4,
    hard: 0.6,
};

/// Placeholder used in free study, where no weighting is applied.
pub const UNWEIGHTED: DifficultyWeights = DifficultyWeights {
    easy: 0.0,
    medium: 0.0,
    hard: 0.0,
};

//=========================================================================================
// Mode Resolution
//=========================================================================================

/// The resolved study strategy for one user on one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeDecision {
    pub mode: StudyMode,
    pub weights: DifficultyWeights,
    pub past_papers_unlocked: bool,
    pub days_remaining: i64,
}

/// Whole days between today and the exam, clamped at 0. A passed exam is
/// the most urgent cramming case, not an error.
pub fn days_remaining(today: NaiveDate, exam_date: NaiveDate) -> i64 {
    (exam_date - today).num_days().max(0)
}

/// Resolves the study mode from the calendar alone.
pub fn resolve_mode(today: NaiveDate, exam_date: Option<NaiveDate>) -> ModeDecision {
    let Some(exam_date) = exam_date else {
        return ModeDecision {
            mode: StudyMode::FreeStudy,
            weights: UNWEIGHTED,
            past_papers_unlocked: false,
            days_remaining: NO_EXAM_DAYS_REMAINING,
        };
    };

    let remaining = days_remaining(today, exam_date);
    if remaining > GENERAL_REVIEW_THRESHOLD_DAYS {
        ModeDecision {
            mode: StudyMode::GeneralReview,
            weights: GENERAL_REVIEW_WEIGHTS,
            past_papers_unlocked: false,
            days_remaining: remaining,
        }
    } else {
        ModeDecision {
            mode: StudyMode::Cramming,
            weights: CRAMMING_WEIGHTS,
            past_papers_unlocked: true,
            days_remaining: remaining,
        }
    }
}
