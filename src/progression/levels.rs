//! XP and Level system
//!
//! Thresholds are a pure function of the level (`level * 100`); titles are
//! cosmetic tiers for the rewards screen.

use crate::domain::{Reward, UserProgress};

/// XP needed per level step, multiplied by the current level
pub const XP_PER_LEVEL: u32 = 100;

/// XP needed to leave `level`
pub fn xp_to_next_level(level: u32) -> u32 {
    level.max(1).saturating_mul(XP_PER_LEVEL)
}

/// Title tier, unlocked from `min_level` on
#[derive(Debug, Clone)]
pub struct LevelTitle {
    pub min_level: u32,
    pub title: &'static str,
}

/// All title tiers (must be sorted by level)
pub static TITLES: &[LevelTitle] = &[
    LevelTitle {
        min_level: 1,
        title: "Rookie",
    },
    LevelTitle {
        min_level: 3,
        title: "Challenger",
    },
    LevelTitle {
        min_level: 5,
        title: "Duelist",
    },
    LevelTitle {
        min_level: 10,
        title: "Quiz Knight",
    },
    LevelTitle {
        min_level: 15,
        title: "Scholar",
    },
    LevelTitle {
        min_level: 20,
        title: "Grandmaster",
    },
    LevelTitle {
        min_level: 30,
        title: "Legend",
    },
];

/// Title shown for a level
pub fn title_for_level(level: u32) -> &'static str {
    TITLES
        .iter()
        .rev()
        .find(|t| level >= t.min_level)
        .map(|t| t.title)
        .unwrap_or(TITLES[0].title)
}

/// A level up event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelUp {
    pub old_level: u32,
    pub new_level: u32,
    pub new_title: String,
}

/// Add `delta_xp` and carry over as many level thresholds as it covers.
///
/// A single grant can cross several levels; each crossed threshold is
/// subtracted at the level it belongs to.
pub fn apply_xp(progress: UserProgress, delta_xp: u32) -> (UserProgress, Option<LevelUp>) {
    let old_level = progress.level.max(1);
    let mut level = old_level;
    let mut xp = u64::from(progress.xp) + u64::from(delta_xp);

    while xp >= u64::from(xp_to_next_level(level)) {
        xp -= u64::from(xp_to_next_level(level));
        level += 1;
    }

    let updated = UserProgress {
        level,
        // Below the current threshold, so it fits
        xp: xp as u32,
        xp_to_next_level: xp_to_next_level(level),
        coins: progress.coins,
    };

    let level_up = (level > old_level).then(|| LevelUp {
        old_level,
        new_level: level,
        new_title: title_for_level(level).to_string(),
    });

    (updated, level_up)
}

/// Apply a reward: XP through [`apply_xp`], coins added on top
pub fn grant(progress: UserProgress, reward: &Reward) -> (UserProgress, Option<LevelUp>) {
    let (mut updated, level_up) = apply_xp(progress, reward.xp());
    updated.coins = updated.coins.saturating_add(reward.coins());
    (updated, level_up)
}

/// Fraction of the way to the next level (0.0 - 1.0)
pub fn progress_to_next(progress: &UserProgress) -> f32 {
    if progress.xp_to_next_level == 0 {
        return 1.0;
    }
    (progress.xp as f32 / progress.xp_to_next_level as f32).min(1.0)
}
