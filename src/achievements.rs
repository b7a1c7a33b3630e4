use chrono::NaiveDate;
use once_cell::sync::Lazy;

use crate::models::{
    Achievement, AchievementKind, Condition, LearningSession, Requirement, Reward, User,
    UserProgress,
};
use crate::sessions::current_streak;

/// Fixed, ordered rule table. Evaluation and the returned batch both follow
/// this order.
pub static CATALOG: Lazy<Vec<Achievement>> = Lazy::new(|| {
    vec![
        Achievement {
            id: "first-steps",
            title: "First Steps",
            description: "Complete your first topic",
            icon: "🎯",
            kind: AchievementKind::Progress,
            requirements: Requirement {
                condition: Condition::TopicsCompleted,
                value: 1,
            },
            rewards: Reward { xp: 50, coins: 25 },
            is_secret: false,
        },
        Achievement {
            id: "knowledge-seeker",
            title: "Knowledge Seeker",
            description: "Complete 5 topics",
            icon: "📚",
            kind: AchievementKind::Progress,
            requirements: Requirement {
                condition: Condition::TopicsCompleted,
                value: 5,
            },
            rewards: Reward {
                xp: 100,
                coins: 50,
            },
            is_secret: false,
        },
        Achievement {
            id: "perfectionist",
            title: "Perfectionist",
            description: "Get perfect scores on 3 quizzes",
            icon: "⭐",
            kind: AchievementKind::Score,
            requirements: Requirement {
                condition: Condition::PerfectScores,
                value: 3,
            },
            rewards: Reward {
                xp: 150,
                coins: 75,
            },
            is_secret: false,
        },
        Achievement {
            id: "rising-star",
            title: "Rising Star",
            description: "Earn 1000 XP",
            icon: "🌟",
            kind: AchievementKind::Special,
            requirements: Requirement {
                condition: Condition::TotalXp,
                value: 1000,
            },
            rewards: Reward {
                xp: 100,
                coins: 100,
            },
            is_secret: false,
        },
        Achievement {
            id: "week-warrior",
            title: "Week Warrior",
            description: "Keep a 7-day learning streak",
            icon: "🔥",
            kind: AchievementKind::Streak,
            requirements: Requirement {
                condition: Condition::DailyStreak,
                value: 7,
            },
            rewards: Reward {
                xp: 250,
                coins: 125,
            },
            is_secret: false,
        },
    ]
});

pub fn find(id: &str) -> Option<&'static Achievement> {
    CATALOG.iter().find(|a| a.id == id)
}

/// Rules the user newly qualifies for, in catalog order. Reads the given
/// state and never mutates it; folding the rewards in is the ledger's job.
/// An achievement already present in `user.achievements` is never
/// re-emitted.
pub fn evaluate(
    user: &User,
    progress: &[UserProgress],
    sessions: &[LearningSession],
    today: NaiveDate,
) -> Vec<&'static Achievement> {
    let topics_completed = progress.iter().filter(|p| p.is_completed()).count() as i64;
    let perfect_scores = sessions.iter().filter(|s| s.score == 100).count() as i64;
    let daily_streak = current_streak(sessions, today) as i64;

    CATALOG
        .iter()
        .filter(|a| !user.achievements.contains(a.id))
        .filter(|a| {
            let observed = match a.requirements.condition {
                Condition::TopicsCompleted => topics_completed,
                Condition::PerfectScores => perfect_scores,
                Condition::TotalXp => user.xp,
                Condition::DailyStreak => daily_streak,
            };
            observed >= a.requirements.value
        })
        .collect()
}
