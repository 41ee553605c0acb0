pub mod db;
pub mod embeddings;
pub mod progress;
pub mod question_llm;

pub use db::PgStore;
pub use embeddings::HttpEmbeddingAdapter;
pub use progress::FileProgressStore;
pub use question_llm::OpenAiQuestionAdapter;
