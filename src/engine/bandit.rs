//! Thompson-sampling chain selection
//!
//! Each chain is a bandit arm with a Beta(alpha, beta) posterior over its
//! trade win rate. Selection samples every eligible arm's posterior and
//! picks the max; untried arms carry the uniform Beta(1, 1) prior, which
//! keeps exploration alive.

use std::collections::HashMap;

use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BanditArm {
    pub alpha: f64,
    pub beta: f64,
    pub attempts: u64,
    pub wins: u64,
}

impl Default for BanditArm {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
            attempts: 0,
            wins: 0,
        }
    }
}

impl BanditArm {
    pub fn record(&mut self, win: bool) {
        self.attempts += 1;
        if win {
            self.wins += 1;
            self.alpha += 1.0;
        } else {
            self.beta += 1.0;
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.wins as f64 / self.attempts as f64
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match Beta::new(self.alpha, self.beta) {
            Ok(dist) => dist.sample(rng),
            Err(_) => 0.5,
        }
    }
}

/// Sample every eligible arm and return the winner. Arms are created on
/// first sight so a newly eligible chain competes immediately.
pub fn select_chain<R: Rng + ?Sized>(
    arms: &mut HashMap<u64, BanditArm>,
    eligible: &[u64],
    rng: &mut R,
) -> Option<u64> {
    let mut best: Option<(u64, f64)> = None;
    for &id in eligible {
        let arm = arms.entry(id).or_default();
        let sample = arm.sample(rng);
        if best.map_or(true, |(_, s)| sample > s) {
            best = Some((id, sample));
        }
    }
    best.map(|(id, _)| id)
}
