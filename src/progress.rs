use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::error::AppError;
use crate::models::{LearningSession, ProgressStatus, User, UserProgress};
use crate::sessions::current_streak;
use crate::store::{Collection, RecordStore};
use crate::validation::ValidateExt;

/// Partial update for a topic's progress record. Absent fields keep their
/// current value.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressUpdate {
    pub status: Option<ProgressStatus>,
    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: Option<i64>,
    #[validate(range(min = 0, message = "Attempts cannot be negative"))]
    pub attempts: Option<i64>,
    #[validate(range(min = 0, message = "Best score cannot be negative"))]
    pub best_score: Option<i64>,
    #[serde(rename = "timeSpent")]
    #[validate(range(min = 0, message = "Time spent cannot be negative"))]
    pub time_spent_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    pub completed_topics: i64,
    /// Counts only topics the user has a progress record for, not the full
    /// curriculum.
    pub total_topics: i64,
    pub progress_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserStatistics {
    pub user: UserBlock,
    pub progress: ProgressBlock,
    pub performance: PerformanceBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserBlock {
    pub level: i64,
    pub xp: i64,
    pub coins: i64,
    /// Badge count, not the titles themselves.
    pub badges: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressBlock {
    pub completed_topics: i64,
    pub in_progress_topics: i64,
    pub total_topics: i64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceBlock {
    pub average_score: i64,
    #[serde(rename = "totalTimeSpent")]
    pub total_time_spent_ms: i64,
    pub current_streak: u32,
    pub total_sessions: i64,
}

pub(crate) fn progress_key(user_id: &str, subject_id: &str, topic_id: &str) -> String {
    format!("{}:{}:{}", user_id, subject_id, topic_id)
}

/// CRUD over per-(user, subject, topic) progress records plus the
/// aggregates derived from them.
#[derive(Debug)]
pub struct ProgressTracker<'a> {
    store: &'a RecordStore,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// Merges partial fields onto the existing record, or a fresh
    /// in-progress default for a first interaction. Stamps
    /// `last_accessed_at` on every write. Attempts and best score are
    /// monotonic; an update that would lower either is rejected.
    #[instrument(skip(self, update))]
    pub async fn upsert_progress(
        &self,
        user_id: &str,
        subject_id: &str,
        topic_id: &str,
        update: ProgressUpdate,
    ) -> Result<UserProgress, AppError> {
        let update = update.validated()?;
        let now = Utc::now();

        let mut record = self
            .topic_progress(user_id, subject_id, topic_id)
            .await?
            .unwrap_or_else(|| UserProgress::new(user_id, subject_id, topic_id, now));

        if let Some(attempts) = update.attempts {
            if attempts < record.attempts {
                return Err(AppError::Validation(format!(
                    "Attempts cannot decrease ({} -> {})",
                    record.attempts, attempts
                )));
            }
            record.attempts = attempts;
        }
        if let Some(best_score) = update.best_score {
            if best_score < record.best_score {
                return Err(AppError::Validation(format!(
                    "Best score cannot decrease ({} -> {})",
                    record.best_score, best_score
                )));
            }
            record.best_score = best_score;
        }
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(progress) = update.progress {
            record.progress = progress;
        }
        if let Some(time_spent_ms) = update.time_spent_ms {
            record.time_spent_ms = time_spent_ms;
        }
        record.last_accessed_at = now;

        info!(status = %record.status, progress = record.progress, "Saving topic progress");
        self.store
            .put(
                Collection::Progress,
                &progress_key(user_id, subject_id, topic_id),
                user_id,
                &record,
            )
            .await?;

        Ok(record)
    }

    /// Marks a topic completed: status and progress are forced, attempts
    /// are incremented, best score only ever rises, and `completed_at` is
    /// stamped on the first completion only.
    #[instrument(skip(self))]
    pub async fn complete_topic(
        &self,
        user_id: &str,
        subject_id: &str,
        topic_id: &str,
        score: i64,
    ) -> Result<UserProgress, AppError> {
        let now = Utc::now();

        let mut record = self
            .topic_progress(user_id, subject_id, topic_id)
            .await?
            .unwrap_or_else(|| UserProgress::new(user_id, subject_id, topic_id, now));

        record.status = ProgressStatus::Completed;
        record.progress = 100;
        record.attempts += 1;
        record.best_score = record.best_score.max(score);
        record.completed_at = record.completed_at.or(Some(now));
        record.last_accessed_at = now;

        info!(attempts = record.attempts, best_score = record.best_score, "Completing topic");
        self.store
            .put(
                Collection::Progress,
                &progress_key(user_id, subject_id, topic_id),
                user_id,
                &record,
            )
            .await?;

        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn topic_progress(
        &self,
        user_id: &str,
        subject_id: &str,
        topic_id: &str,
    ) -> Result<Option<UserProgress>, AppError> {
        self.store
            .get(
                Collection::Progress,
                &progress_key(user_id, subject_id, topic_id),
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn user_progress(&self, user_id: &str) -> Result<Vec<UserProgress>, AppError> {
        self.store.list_by_owner(Collection::Progress, user_id).await
    }

    #[instrument(skip(self))]
    pub async fn subject_progress(
        &self,
        user_id: &str,
        subject_id: &str,
    ) -> Result<Vec<UserProgress>, AppError> {
        Ok(self
            .user_progress(user_id)
            .await?
            .into_iter()
            .filter(|p| p.subject_id == subject_id)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn subject_summary(
        &self,
        user_id: &str,
        subject_id: &str,
    ) -> Result<SubjectSummary, AppError> {
        let records = self.subject_progress(user_id, subject_id).await?;

        let completed_topics = records.iter().filter(|p| p.is_completed()).count() as i64;
        let total_topics = records.len() as i64;
        let progress_percent = if total_topics > 0 {
            completed_topics as f64 / total_topics as f64 * 100.0
        } else {
            0.0
        };

        Ok(SubjectSummary {
            completed_topics,
            total_topics,
            progress_percent,
        })
    }

    /// The dashboard aggregate: account fields, progress counts, and
    /// session-derived performance. `total_topics` counts records that have
    /// been started, in line with [`SubjectSummary`].
    #[instrument(skip(self, user, sessions))]
    pub async fn user_statistics(
        &self,
        user: &User,
        sessions: &[LearningSession],
    ) -> Result<UserStatistics, AppError> {
        let progress = self.user_progress(&user.id).await?;

        let completed_topics = progress.iter().filter(|p| p.is_completed()).count() as i64;
        let in_progress_topics = progress
            .iter()
            .filter(|p| p.status == ProgressStatus::InProgress)
            .count() as i64;
        let total_topics = completed_topics + in_progress_topics;
        let completion_rate = if completed_topics > 0 {
            completed_topics as f64 / total_topics as f64 * 100.0
        } else {
            0.0
        };

        let total_sessions = sessions.len() as i64;
        let total_time_spent_ms = sessions.iter().map(|s| s.time_spent_ms).sum();
        let average_score = if total_sessions > 0 {
            (sessions.iter().map(|s| s.score).sum::<i64>() as f64 / total_sessions as f64).round()
                as i64
        } else {
            0
        };

        Ok(UserStatistics {
            user: UserBlock {
                level: user.level,
                xp: user.xp,
                coins: user.coins,
                badges: user.badges.len() as i64,
            },
            progress: ProgressBlock {
                completed_topics,
                in_progress_topics,
                total_topics,
                completion_rate,
            },
            performance: PerformanceBlock {
                average_score,
                total_time_spent_ms,
                current_streak: current_streak(sessions, Utc::now().date_naive()),
                total_sessions,
            },
        })
    }
}
