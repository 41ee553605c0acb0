pub mod domain;
pub mod exam_logic;
pub mod generation;
pub mod ports;
pub mod sampler;
pub mod similarity;

#[cfg(test)]
pub(crate) mod testing;

pub use domain::{
    Course, Difficulty, Document, DocumentChunk, ExamStatus, GenerationProgress, NewQuestion,
    NewSlide, NewUserExam, Question, QuestionSource, Slide, User, UserCredentials, UserExam,
};
pub use exam_logic::{resolve_mode, DifficultyWeights, ModeDecision, StudyMode};
pub use generation::{GenerationConfig, GenerationCoordinator, RunOutcome, RunState};
pub use ports::{
    ContentStore, CourseScope, EmbeddingService, GeneratedQuestion, PortError, PortResult,
    ProgressStore, QuestionFilter, QuestionGenerator,
};
pub use sampler::{DailyMix, DailyMixService, QuestionSampler};
