//! Sender selection policies for the optimized scheduler.
//!
//! Selection order is a load-balancing heuristic only; the capacity checks
//! in the allocator enforce the real invariants. Policies are pluggable so
//! tests can pin the order deterministically.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::Tracker;

/// Picks the next sender to try for one allocation attempt.
pub trait SenderSelector: Send {
    fn next(&mut self, identities: &[String], tracker: &Tracker) -> Option<String>;
}

/// Cycles through senders in order.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: usize,
}

impl SenderSelector for RoundRobin {
    fn next(&mut self, identities: &[String], _tracker: &Tracker) -> Option<String> {
        if identities.is_empty() {
            return None;
        }
        let identity = identities[self.cursor % identities.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        Some(identity)
    }
}

/// Picks the sender with the fewest pending queue entries.
#[derive(Debug, Default)]
pub struct LeastLoaded;

impl SenderSelector for LeastLoaded {
    fn next(&mut self, identities: &[String], tracker: &Tracker) -> Option<String> {
        identities
            .iter()
            .min_by_key(|identity| {
                tracker
                    .sending_accounts
                    .get(*identity)
                    .map(|account| account.email_queue.len())
                    .unwrap_or(0)
            })
            .cloned()
    }
}

/// Samples senders uniformly at random. Seedable for deterministic tests.
#[derive(Debug)]
pub struct Randomized {
    rng: StdRng,
}

impl Randomized {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for Randomized {
    fn default() -> Self {
        Self::new()
    }
}

impl SenderSelector for Randomized {
    fn next(&mut self, identities: &[String], _tracker: &Tracker) -> Option<String> {
        if identities.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..identities.len());
        Some(identities[index].clone())
    }
}
