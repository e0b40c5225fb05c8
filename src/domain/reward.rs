use serde::{Deserialize, Serialize};

/// Reward kinds granted by duels and quests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reward {
    XpCoins { xp: u32, coins: u64 },
}

impl Reward {
    pub const fn xp_coins(xp: u32, coins: u64) -> Self {
        Self::XpCoins { xp, coins }
    }

    pub fn xp(&self) -> u32 {
        match self {
            Self::XpCoins { xp, .. } => *xp,
        }
    }

    pub fn coins(&self) -> u64 {
        match self {
            Self::XpCoins { coins, .. } => *coins,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.xp() == 0 && self.coins() == 0
    }
}

impl std::fmt::Display for Reward {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::XpCoins { xp, coins } => write!(f, "+{} XP, +{} coins", xp, coins),
        }
    }
}
