//! Core bookkeeping for the CodeQuest learning platform: per-topic
//! progress, timed learning sessions, achievement rules, and the account
//! ledger that applies their rewards, all persisted through an embedded
//! SQLite record store.

pub mod achievements;
pub mod auth;
pub mod env;
pub mod error;
pub mod ledger;
pub mod models;
pub mod progress;
pub mod sessions;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod validation;

#[cfg(test)]
mod test;

pub use error::AppError;
pub use models::{
    Achievement, LearningSession, ProgressStatus, StoredUser, User, UserPreferences, UserProgress,
};
pub use service::{QuestService, QuizOutcome, UserDataExport};
pub use store::{Collection, RecordStore};
