//! services/api/src/adapters/progress.rs
//!
//! File-backed implementation of the `ProgressStore` port. The generation
//! worker's cursor lives in one small JSON record next to the service, so
//! a restart resumes exactly where the last run left off.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medstudy_core::domain::GenerationProgress;
use medstudy_core::ports::{PortError, PortResult, ProgressStore};
use serde::{Deserialize, Serialize};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A progress store persisting to a JSON file at a configured path.
#[derive(Clone)]
pub struct FileProgressStore {
    path: PathBuf,
}

impl FileProgressStore {
    /// Creates a new `FileProgressStore`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

//=========================================================================================
// "Impure" Record Struct
//=========================================================================================

#[derive(Serialize, Deserialize)]
struct ProgressRecord {
    last_processed_slide_id: i64,
    total_questions_generated: i64,
    last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    departments_completed: Vec<String>,
}

impl ProgressRecord {
    fn to_domain(self) -> GenerationProgress {
        GenerationProgress {
            last_processed_slide_id: self.last_processed_slide_id,
            total_questions_generated: self.total_questions_generated,
            last_run: self.last_run,
            departments_completed: self.departments_completed,
        }
    }

    fn from_domain(progress: &GenerationProgress) -> Self {
        Self {
            last_processed_slide_id: progress.last_processed_slide_id,
            total_questions_generated: progress.total_questions_generated,
            last_run: progress.last_run,
            departments_completed: progress.departments_completed.clone(),
        }
    }
}

//=========================================================================================
// `ProgressStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProgressStore for FileProgressStore {
    /// A missing file is the zeroed default; a corrupt file is an error,
    /// not a silent restart from slide 0.
    async fn load(&self) -> PortResult<GenerationProgress> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str::<ProgressRecord>(&raw)
                .map(ProgressRecord::to_domain)
                .map_err(|e| {
                    PortError::Unexpected(format!(
                        "corrupt progress file {}: {e}",
                        self.path.display()
                    ))
                }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(GenerationProgress::default()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }

    async fn save(&self, progress: &GenerationProgress) -> PortResult<()> {
        let record = ProgressRecord::from_domain(progress);
        let raw = serde_json::to_string_pretty(&record)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn reset(&self) -> PortResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir().join(format!("medstudy-progress-{}.json", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn missing_file_loads_as_default() {
        let store = FileProgressStore::new(scratch_path());
        let progress = store.load().await.unwrap();
        assert_eq!(progress, GenerationProgress::default());
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let path = scratch_path();
        let store = FileProgressStore::new(path.clone());
        let progress = GenerationProgress {
            last_processed_slide_id: 42,
            total_questions_generated: 120,
            last_run: Some(Utc::now()),
            departments_completed: vec!["Anatomy".to_string()],
        };

        store.save(&progress).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, progress);

        store.reset().await.unwrap();
        assert_eq!(store.load().await.unwrap(), GenerationProgress::default());
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let store = FileProgressStore::new(scratch_path());
        store.reset().await.unwrap();
        store.reset().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error_not_a_silent_restart() {
        let path = scratch_path();
        tokio::fs::write(&path, "not json").await.unwrap();
        let store = FileProgressStore::new(path.clone());
        assert!(store.load().await.is_err());
        let _ = tokio::fs::remove_file(&path).await;
    }
}
