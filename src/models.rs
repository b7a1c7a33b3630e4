use std::collections::BTreeSet;
use std::fmt;

use anyhow::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A learner account. Everything the UI displays about a user lives here;
/// the credential hash is kept separately on [`StoredUser`] and never leaves
/// the auth layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub level: i64,
    pub coins: i64,
    pub xp: i64,
    /// Display badge titles, deduplicated, in award order.
    pub badges: Vec<String>,
    /// Stable ids of awarded achievements. Possession is keyed on these,
    /// not on badge titles.
    #[serde(default)]
    pub achievements: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
    pub preferences: UserPreferences,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub theme: Theme,
    pub notifications: bool,
    pub sound_effects: bool,
    pub auto_save: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            notifications: true,
            sound_effects: true,
            auto_save: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

/// Persistence shape of a user record in the `codequest-users` collection:
/// the public profile plus the bcrypt hash used for credential matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    #[serde(flatten)]
    pub user: User,
    pub password_hash: String,
}

impl From<StoredUser> for User {
    fn from(stored: StoredUser) -> Self {
        stored.user
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not-started",
            ProgressStatus::InProgress => "in-progress",
            ProgressStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "not-started" => Ok(ProgressStatus::NotStarted),
            "in-progress" => Ok(ProgressStatus::InProgress),
            "completed" => Ok(ProgressStatus::Completed),
            _ => Err(Error::msg(format!("Unknown progress status: {}", s))),
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-(user, subject, topic) completion state. One record per triple,
/// created on first interaction and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: String,
    pub subject_id: String,
    pub topic_id: String,
    pub status: ProgressStatus,
    /// 0-100.
    pub progress: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub attempts: i64,
    pub best_score: i64,
    #[serde(rename = "timeSpent")]
    pub time_spent_ms: i64,
    pub last_accessed_at: DateTime<Utc>,
}

impl UserProgress {
    /// Fresh record for a topic the user has just touched.
    pub fn new(user_id: &str, subject_id: &str, topic_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            subject_id: subject_id.to_string(),
            topic_id: topic_id.to_string(),
            status: ProgressStatus::InProgress,
            progress: 0,
            completed_at: None,
            attempts: 0,
            best_score: 0,
            time_spent_ms: 0,
            last_accessed_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }
}

/// A timed learning session. Open while `completed_at` is `None`, closed
/// once rewards and a score have been recorded against it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearningSession {
    pub id: String,
    pub user_id: String,
    pub topic_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub xp_earned: i64,
    pub coins_earned: i64,
    pub score: i64,
    #[serde(rename = "timeSpent")]
    pub time_spent_ms: i64,
}

impl LearningSession {
    pub fn is_open(&self) -> bool {
        self.completed_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AchievementKind {
    Progress,
    Streak,
    Score,
    Special,
}

/// What a catalog rule measures.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    TopicsCompleted,
    PerfectScores,
    TotalXp,
    DailyStreak,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Requirement {
    pub condition: Condition,
    pub value: i64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Reward {
    pub xp: i64,
    pub coins: i64,
}

/// Static catalog entry. Awarding is recorded per user by id in
/// [`User::achievements`]; the title is only display text.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    #[serde(rename = "type")]
    pub kind: AchievementKind,
    pub requirements: Requirement,
    pub rewards: Reward,
    pub is_secret: bool,
}
