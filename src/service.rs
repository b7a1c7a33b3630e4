use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::achievements;
use crate::auth::{Authenticator, CURRENT_USER_KEY};
use crate::error::{AppError, LogErrExt};
use crate::ledger;
use crate::models::{Achievement, LearningSession, StoredUser, User, UserProgress};
use crate::progress::{ProgressTracker, ProgressUpdate, UserStatistics, progress_key};
use crate::sessions::SessionRecorder;
use crate::store::{Collection, RecordStore};

/// What flows back to the UI after a quiz-completed event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOutcome {
    pub user: User,
    pub progress: UserProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<LearningSession>,
    pub new_achievements: Vec<Achievement>,
}

/// Snapshot of everything recorded for a user, for backup or moving to a
/// real backend later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataExport {
    pub user: User,
    pub progress: Vec<UserProgress>,
    pub sessions: Vec<LearningSession>,
    pub statistics: UserStatistics,
    pub exported_at: DateTime<Utc>,
}

/// Wires the components together for the UI's discrete events. Every
/// mutating flow for a given user runs under that user's lock, so the
/// tracker and the ledger never race on the same account.
pub struct QuestService {
    store: RecordStore,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl QuestService {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn auth(&self) -> Authenticator<'_> {
        Authenticator::new(&self.store)
    }

    pub fn progress(&self) -> ProgressTracker<'_> {
        ProgressTracker::new(&self.store)
    }

    pub fn sessions(&self) -> SessionRecorder<'_> {
        SessionRecorder::new(&self.store)
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load_account(&self, user_id: &str) -> Result<StoredUser, AppError> {
        self.store
            .get(Collection::Users, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    /// Writes the account back, refreshing the active-user snapshot when
    /// it is this account.
    async fn persist_account(&self, stored: &StoredUser) -> Result<(), AppError> {
        self.store
            .put(Collection::Users, &stored.user.id, &stored.user.id, stored)
            .await?;

        let current: Option<User> = self
            .store
            .get(Collection::CurrentUser, CURRENT_USER_KEY)
            .await?;
        if current.is_some_and(|c| c.id == stored.user.id) {
            self.store
                .put(
                    Collection::CurrentUser,
                    CURRENT_USER_KEY,
                    &stored.user.id,
                    &stored.user,
                )
                .await?;
        }

        Ok(())
    }

    /// First touch of a topic: records it as in-progress and opens a
    /// learning session.
    #[instrument(skip(self))]
    pub async fn start_topic(
        &self,
        user_id: &str,
        subject_id: &str,
        topic_id: &str,
    ) -> Result<(UserProgress, LearningSession), AppError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let progress = self
            .progress()
            .upsert_progress(user_id, subject_id, topic_id, ProgressUpdate::default())
            .await?;
        let session = self.sessions().start(user_id, topic_id).await?;

        Ok((progress, session))
    }

    #[instrument(skip(self, update))]
    pub async fn update_topic_progress(
        &self,
        user_id: &str,
        subject_id: &str,
        topic_id: &str,
        update: ProgressUpdate,
    ) -> Result<UserProgress, AppError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        self.progress()
            .upsert_progress(user_id, subject_id, topic_id, update)
            .await
            .log_err("update_topic_progress")
    }

    /// The quiz-completed pipeline: apply the event rewards, persist the
    /// topic as completed, close the open session, re-check achievement
    /// rules against the updated state, and fold anything newly earned
    /// back into the account in the same pass.
    #[instrument(skip(self))]
    pub async fn complete_quiz(
        &self,
        user_id: &str,
        subject_id: &str,
        topic_id: &str,
        score: i64,
        xp_earned: i64,
        coins_earned: i64,
    ) -> Result<QuizOutcome, AppError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let mut stored = self.load_account(user_id).await.log_err("complete_quiz")?;

        ledger::apply_rewards(&mut stored.user, xp_earned, coins_earned, &[]);

        let progress = self
            .progress()
            .complete_topic(user_id, subject_id, topic_id, score)
            .await?;

        let recorder = self.sessions();
        let session = match recorder.open_session(user_id, topic_id).await? {
            Some(open) => Some(
                recorder
                    .complete(&open.id, xp_earned, coins_earned, score)
                    .await?,
            ),
            _ => None,
        };

        let all_progress = self.progress().user_progress(user_id).await?;
        let all_sessions = recorder.sessions_for_user(user_id).await?;
        let earned = achievements::evaluate(
            &stored.user,
            &all_progress,
            &all_sessions,
            Utc::now().date_naive(),
        );
        ledger::apply_achievements(&mut stored.user, &earned);

        self.persist_account(&stored).await?;

        info!(
            user_id = %stored.user.id,
            xp = stored.user.xp,
            level = stored.user.level,
            new_achievements = earned.len(),
            "Quiz completed"
        );

        Ok(QuizOutcome {
            user: stored.user,
            progress,
            session,
            new_achievements: earned.into_iter().cloned().collect(),
        })
    }

    #[instrument(skip(self))]
    pub async fn statistics(&self, user_id: &str) -> Result<UserStatistics, AppError> {
        let stored = self.load_account(user_id).await?;
        let sessions = self.sessions().sessions_for_user(user_id).await?;

        self.progress()
            .user_statistics(&stored.user, &sessions)
            .await
            .log_err("statistics")
    }

    #[instrument(skip(self))]
    pub async fn export_user_data(&self, user_id: &str) -> Result<UserDataExport, AppError> {
        let stored = self.load_account(user_id).await?;
        let progress = self.progress().user_progress(user_id).await?;
        let sessions = self.sessions().sessions_for_user(user_id).await?;
        let statistics = self
            .progress()
            .user_statistics(&stored.user, &sessions)
            .await?;

        Ok(UserDataExport {
            user: stored.user,
            progress,
            sessions,
            statistics,
            exported_at: Utc::now(),
        })
    }

    /// Replays an export through the store. Credentials are not part of an
    /// export: an existing account keeps its hash, a new one is created
    /// without a usable password. Sessions are derived history and are not
    /// replayed.
    #[instrument(skip(self, export))]
    pub async fn import_user_data(&self, export: UserDataExport) -> Result<User, AppError> {
        let lock = self.user_lock(&export.user.id).await;
        let _guard = lock.lock().await;

        let password_hash = match self
            .store
            .get::<StoredUser>(Collection::Users, &export.user.id)
            .await?
        {
            Some(existing) => existing.password_hash,
            _ => String::new(),
        };

        let stored = StoredUser {
            user: export.user,
            password_hash,
        };
        self.persist_account(&stored).await?;

        let now = Utc::now();
        for mut record in export.progress {
            record.last_accessed_at = now;
            self.store
                .put(
                    Collection::Progress,
                    &progress_key(&record.user_id, &record.subject_id, &record.topic_id),
                    &record.user_id,
                    &record,
                )
                .await?;
        }

        info!(user_id = %stored.user.id, "Imported user data");
        Ok(stored.user)
    }
}
