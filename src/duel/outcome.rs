//! Outcome resolution: higher score wins, faster time breaks ties

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{Duel, PlayerResult, UserId};
use crate::error::DuelError;

/// A player's personal result of a duel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
    Draw,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Lose => "lose",
            Outcome::Draw => "draw",
        }
    }

    /// The same duel seen from the other side
    pub fn flipped(self) -> Self {
        match self {
            Outcome::Win => Outcome::Lose,
            Outcome::Lose => Outcome::Win,
            Outcome::Draw => Outcome::Draw,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rank two submitted results. `Greater` means `a` beat `b`.
fn compare(a: &PlayerResult, b: &PlayerResult) -> Ordering {
    a.score.cmp(&b.score).then_with(|| {
        // Lower time is better; a missing time loses to any recorded one
        let time_a = a.time.unwrap_or(u32::MAX);
        let time_b = b.time.unwrap_or(u32::MAX);
        time_b.cmp(&time_a)
    })
}

/// Outcome for `self_id`, given both players' results.
///
/// Pure and deterministic, so every racing observer computes the same answer.
/// Both scores must be present.
pub fn resolve(
    a: (&UserId, &PlayerResult),
    b: (&UserId, &PlayerResult),
    self_id: &UserId,
) -> Result<Outcome, DuelError> {
    let (id_a, result_a) = a;
    let (id_b, result_b) = b;

    for (id, result) in [a, b] {
        if result.score.is_none() {
            return Err(DuelError::MissingScore(id.clone()));
        }
    }

    let outcome_for_a = match compare(result_a, result_b) {
        Ordering::Greater => Outcome::Win,
        Ordering::Less => Outcome::Lose,
        Ordering::Equal => Outcome::Draw,
    };

    if self_id == id_a {
        Ok(outcome_for_a)
    } else if self_id == id_b {
        Ok(outcome_for_a.flipped())
    } else {
        Err(DuelError::UnknownPlayer(self_id.clone()))
    }
}

impl Duel {
    /// Personal outcome of `uid`. Requires both scores.
    pub fn outcome_for(&self, uid: &UserId) -> Result<Outcome, DuelError> {
        if !self.is_participant(uid) {
            return Err(DuelError::NotParticipant {
                duel: self.id.clone(),
                user: uid.clone(),
            });
        }
        let [a, b] = &self.players;
        match (self.submitted(a), self.submitted(b)) {
            (Some(ra), Some(rb)) => resolve((a, ra), (b, rb), uid),
            _ => Err(DuelError::ResultsIncomplete(self.id.clone())),
        }
    }

    fn submitted(&self, uid: &UserId) -> Option<&PlayerResult> {
        self.results.get(uid).filter(|r| r.is_submitted())
    }
}
