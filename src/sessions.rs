use chrono::{NaiveDate, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::LearningSession;
use crate::store::{Collection, RecordStore};

/// Tracks timed learning sessions: open on `start`, closed once on
/// `complete`. At most one session is open per (user, topic).
#[derive(Debug)]
pub struct SessionRecorder<'a> {
    store: &'a RecordStore,
}

impl<'a> SessionRecorder<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// Opens a session with zero rewards. If one is already open for this
    /// topic it is returned as-is rather than opening a duplicate.
    #[instrument(skip(self))]
    pub async fn start(&self, user_id: &str, topic_id: &str) -> Result<LearningSession, AppError> {
        if let Some(open) = self.open_session(user_id, topic_id).await? {
            info!(session_id = %open.id, "Session already open for topic, reusing");
            return Ok(open);
        }

        info!("Starting learning session");
        let session = LearningSession {
            id: format!("session-{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            topic_id: topic_id.to_string(),
            started_at: Utc::now(),
            completed_at: None,
            xp_earned: 0,
            coins_earned: 0,
            score: 0,
            time_spent_ms: 0,
        };

        self.store
            .put(Collection::Sessions, &session.id, user_id, &session)
            .await?;

        Ok(session)
    }

    /// Closes a session, recording rewards and the elapsed time since it
    /// was started.
    #[instrument(skip(self))]
    pub async fn complete(
        &self,
        session_id: &str,
        xp_earned: i64,
        coins_earned: i64,
        score: i64,
    ) -> Result<LearningSession, AppError> {
        let mut session: LearningSession = self
            .store
            .get(Collection::Sessions, session_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Learning session {} not found", session_id))
            })?;

        if !session.is_open() {
            return Err(AppError::Validation(format!(
                "Learning session {} is already completed",
                session_id
            )));
        }

        info!("Completing learning session");
        let now = Utc::now();
        session.completed_at = Some(now);
        session.xp_earned = xp_earned;
        session.coins_earned = coins_earned;
        session.score = score;
        session.time_spent_ms = (now - session.started_at).num_milliseconds();

        self.store
            .put(Collection::Sessions, &session.id, &session.user_id, &session)
            .await?;

        Ok(session)
    }

    #[instrument(skip(self))]
    pub async fn sessions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<LearningSession>, AppError> {
        self.store.list_by_owner(Collection::Sessions, user_id).await
    }

    pub async fn open_session(
        &self,
        user_id: &str,
        topic_id: &str,
    ) -> Result<Option<LearningSession>, AppError> {
        Ok(self
            .sessions_for_user(user_id)
            .await?
            .into_iter()
            .find(|s| s.topic_id == topic_id && s.is_open()))
    }
}

/// Consecutive-day streak ending at `today`, walked over closed sessions
/// newest-first. A gap of exactly one extra day still extends the streak,
/// so a single skipped day does not break the chain; a larger gap stops
/// the walk. No closed sessions means streak 0.
pub fn current_streak(sessions: &[LearningSession], today: NaiveDate) -> u32 {
    let mut completed: Vec<_> = sessions.iter().filter_map(|s| s.completed_at).collect();
    completed.sort_by_key(|at| std::cmp::Reverse(*at));

    let mut streak: i64 = 0;
    for completed_at in completed {
        let days_diff = (today - completed_at.date_naive()).num_days();

        if days_diff == streak || days_diff == streak + 1 {
            streak += 1;
        } else {
            break;
        }
    }

    streak as u32
}
