use tracing::info;

use crate::models::{Achievement, User};

/// Level thresholds. The level computation and the progress-bar helpers
/// below must all derive from this one constant.
pub const XP_PER_LEVEL: i64 = 1000;

pub fn level_for_xp(xp: i64) -> i64 {
    xp / XP_PER_LEVEL + 1
}

/// Applies a reward delta to the account. This is the only place xp,
/// coins, level, and badges are mutated; every other component reads
/// the user.
pub fn apply_rewards(user: &mut User, xp_delta: i64, coins_delta: i64, new_badges: &[String]) {
    user.xp += xp_delta;
    user.coins += coins_delta;
    user.level = level_for_xp(user.xp);

    for badge in new_badges {
        if !user.badges.iter().any(|b| b == badge) {
            user.badges.push(badge.clone());
        }
    }
}

/// Folds a batch of newly earned achievements into the account: records
/// each id, adds its reward, and appends its catalog title as a badge.
/// An id already on the account is skipped entirely.
pub fn apply_achievements(user: &mut User, earned: &[&Achievement]) {
    for achievement in earned {
        if !user.achievements.insert(achievement.id.to_string()) {
            continue;
        }

        info!(
            user_id = %user.id,
            achievement = achievement.id,
            "Awarding achievement"
        );
        apply_rewards(
            user,
            achievement.rewards.xp,
            achievement.rewards.coins,
            &[achievement.title.to_string()],
        );
    }
}

/// XP still needed to reach the next level.
pub fn xp_to_next_level(user: &User) -> i64 {
    XP_PER_LEVEL - user.xp % XP_PER_LEVEL
}

/// How far through the current level the user is, as the UI progress bar
/// shows it.
pub fn level_progress_percent(user: &User) -> f64 {
    (user.xp % XP_PER_LEVEL) as f64 / XP_PER_LEVEL as f64 * 100.0
}
