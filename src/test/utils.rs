#[cfg(test)]
pub mod fixtures {
    use std::collections::BTreeSet;
    use std::sync::Once;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use crate::achievements;
    use crate::error::AppError;
    use crate::ledger::level_for_xp;
    use crate::models::{LearningSession, StoredUser, User, UserPreferences};
    use crate::progress::ProgressTracker;
    use crate::store::{Collection, RecordStore};
    use crate::telemetry::try_init_tracing;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";
    // DEFAULT_COST is far too slow for fixture churn
    const FIXTURE_BCRYPT_COST: u32 = 4;

    struct TestUser {
        id: String,
        email: String,
        name: String,
        xp: i64,
        coins: i64,
        achievements: Vec<String>,
    }

    struct TestProgress {
        user_id: String,
        subject_id: String,
        topic_id: String,
        completed: bool,
        score: i64,
    }

    struct TestSession {
        user_id: String,
        topic_id: String,
        completed_days_ago: Option<i64>,
        score: i64,
    }

    /// Declarative in-memory store setup, one builder call per record.
    #[derive(Default)]
    pub struct TestStoreBuilder {
        users: Vec<TestUser>,
        progress: Vec<TestProgress>,
        sessions: Vec<TestSession>,
    }

    impl TestStoreBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(self, id: &str, email: &str, name: &str) -> Self {
            self.user_with_stats(id, email, name, 0, 100)
        }

        pub fn user_with_stats(
            mut self,
            id: &str,
            email: &str,
            name: &str,
            xp: i64,
            coins: i64,
        ) -> Self {
            self.users.push(TestUser {
                id: id.to_string(),
                email: email.to_string(),
                name: name.to_string(),
                xp,
                coins,
                achievements: Vec::new(),
            });
            self
        }

        /// Marks an achievement as already awarded to the last-added user.
        pub fn awarded(mut self, achievement_id: &str) -> Self {
            self.users
                .last_mut()
                .expect("awarded() requires a user")
                .achievements
                .push(achievement_id.to_string());
            self
        }

        pub fn completed_topic(
            mut self,
            user_id: &str,
            subject_id: &str,
            topic_id: &str,
            score: i64,
        ) -> Self {
            self.progress.push(TestProgress {
                user_id: user_id.to_string(),
                subject_id: subject_id.to_string(),
                topic_id: topic_id.to_string(),
                completed: true,
                score,
            });
            self
        }

        pub fn topic_in_progress(mut self, user_id: &str, subject_id: &str, topic_id: &str) -> Self {
            self.progress.push(TestProgress {
                user_id: user_id.to_string(),
                subject_id: subject_id.to_string(),
                topic_id: topic_id.to_string(),
                completed: false,
                score: 0,
            });
            self
        }

        pub fn closed_session(
            mut self,
            user_id: &str,
            topic_id: &str,
            days_ago: i64,
            score: i64,
        ) -> Self {
            self.sessions.push(TestSession {
                user_id: user_id.to_string(),
                topic_id: topic_id.to_string(),
                completed_days_ago: Some(days_ago),
                score,
            });
            self
        }

        pub fn open_session(mut self, user_id: &str, topic_id: &str) -> Self {
            self.sessions.push(TestSession {
                user_id: user_id.to_string(),
                topic_id: topic_id.to_string(),
                completed_days_ago: None,
                score: 0,
            });
            self
        }

        pub async fn build(self) -> Result<TestStore, AppError> {
            INIT.call_once(try_init_tracing);

            let store = RecordStore::in_memory().await?;
            let now = Utc::now();

            for user in &self.users {
                let mut badges = vec!["Welcome".to_string()];
                let mut awarded = BTreeSet::new();
                for id in &user.achievements {
                    awarded.insert(id.clone());
                    if let Some(entry) = achievements::find(id) {
                        badges.push(entry.title.to_string());
                    }
                }

                let stored = StoredUser {
                    user: User {
                        id: user.id.clone(),
                        email: user.email.clone(),
                        name: user.name.clone(),
                        level: level_for_xp(user.xp),
                        coins: user.coins,
                        xp: user.xp,
                        badges,
                        achievements: awarded,
                        created_at: now,
                        last_login_at: now,
                        preferences: UserPreferences::default(),
                    },
                    password_hash: bcrypt::hash(STANDARD_PASSWORD, FIXTURE_BCRYPT_COST)?,
                };

                store
                    .put(Collection::Users, &stored.user.id, &stored.user.id, &stored)
                    .await?;
            }

            let tracker = ProgressTracker::new(&store);
            for record in &self.progress {
                if record.completed {
                    tracker
                        .complete_topic(
                            &record.user_id,
                            &record.subject_id,
                            &record.topic_id,
                            record.score,
                        )
                        .await?;
                } else {
                    tracker
                        .upsert_progress(
                            &record.user_id,
                            &record.subject_id,
                            &record.topic_id,
                            Default::default(),
                        )
                        .await?;
                }
            }

            for entry in &self.sessions {
                let session = match entry.completed_days_ago {
                    Some(days_ago) => {
                        let completed_at = now - Duration::days(days_ago);
                        LearningSession {
                            id: format!("session-{}", Uuid::new_v4()),
                            user_id: entry.user_id.clone(),
                            topic_id: entry.topic_id.clone(),
                            started_at: completed_at - Duration::minutes(10),
                            completed_at: Some(completed_at),
                            xp_earned: 50,
                            coins_earned: 25,
                            score: entry.score,
                            time_spent_ms: 600_000,
                        }
                    }
                    _ => LearningSession {
                        id: format!("session-{}", Uuid::new_v4()),
                        user_id: entry.user_id.clone(),
                        topic_id: entry.topic_id.clone(),
                        started_at: now,
                        completed_at: None,
                        xp_earned: 0,
                        coins_earned: 0,
                        score: 0,
                        time_spent_ms: 0,
                    },
                };

                store
                    .put(Collection::Sessions, &session.id, &session.user_id, &session)
                    .await?;
            }

            Ok(TestStore { store })
        }
    }

    pub struct TestStore {
        pub store: RecordStore,
    }

    impl TestStore {
        pub async fn stored_user(&self, id: &str) -> StoredUser {
            self.store
                .get(Collection::Users, id)
                .await
                .expect("Failed to read user")
                .expect("User not found")
        }

        pub async fn user(&self, id: &str) -> User {
            User::from(self.stored_user(id).await)
        }
    }
}
