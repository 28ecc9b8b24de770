use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

/// Endless random picks from a pool, avoiding anything picked in the last
/// `min_distance` draws.
#[derive(Debug)]
pub struct Sequence<T, R = StdRng> {
    pool: Vec<T>,
    recent: VecDeque<usize>,
    min_distance: usize,
    rng: R,
}

impl<T: Clone> Sequence<T, StdRng> {
    /// Uses half the pool size as the minimum distance.
    pub fn new(pool: Vec<T>) -> Result<Self> {
        let min_distance = pool.len() / 2;
        Self::with_rng(pool, min_distance, StdRng::from_entropy())
    }
}

impl<T: Clone, R: Rng> Sequence<T, R> {
    /// Fails unless `min_distance < pool.len()`, which also rules out an empty pool.
    pub fn with_rng(pool: Vec<T>, min_distance: usize, rng: R) -> Result<Self> {
        if min_distance >= pool.len() {
            return Err(Error::Config(format!(
                "minimum distance {min_distance} must be smaller than the pool size {}",
                pool.len()
            )));
        }

        Ok(Self {
            pool,
            recent: VecDeque::with_capacity(min_distance + 1),
            min_distance,
            rng,
        })
    }
}

impl<T: Clone, R: Rng> Iterator for Sequence<T, R> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let candidates: Vec<usize> = (0..self.pool.len())
            .filter(|i| !self.recent.contains(i))
            .collect();
        // Never empty: `recent` holds at most `min_distance` < pool size entries.
        let &choice = candidates.choose(&mut self.rng)?;

        self.recent.push_back(choice);
        if self.recent.len() > self.min_distance {
            self.recent.pop_front();
        }

        Some(self.pool[choice].clone())
    }
}
