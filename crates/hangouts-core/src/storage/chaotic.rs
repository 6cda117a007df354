//! Chaotic storage wrapper for fault injection testing
//!
//! Storage wrapper that randomly fails operations to test error handling.
//! Failures are injected before delegating, so a failed commit never reaches
//! the inner backend: batches stay all-or-nothing under chaos too.

#![allow(clippy::expect_used, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use super::{CacheKey, Storage, StorageError, WriteBatch};

/// Chaotic storage wrapper that randomly injects failures
///
/// Delegates to an underlying storage implementation but randomly fails
/// operations based on a configured failure rate.
#[derive(Clone)]
pub struct ChaoticStorage<S: Storage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Operations attempted, and how many of them were failed
    counters: Arc<Mutex<Counters>>,
}

#[derive(Default)]
struct Counters {
    attempted: usize,
    injected: usize,
}

/// Linear congruential generator, reproducible from its seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: Storage> ChaoticStorage<S> {
    /// Create a new chaotic storage wrapper
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            counters: Arc::new(Mutex::new(Counters::default())),
        }
    }

    /// Underlying storage (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage operations attempted.
    pub fn operation_count(&self) -> usize {
        self.counters.lock().expect("counters mutex poisoned").attempted
    }

    /// Number of operations failed on purpose.
    pub fn injected_failures(&self) -> usize {
        self.counters.lock().expect("counters mutex poisoned").injected
    }

    /// Count the operation and decide whether it fails.
    fn roll(&self, operation: &'static str) -> Result<(), StorageError> {
        let fail = self.rng.lock().expect("ChaoticRng mutex poisoned").next() < self.failure_rate;

        let mut counters = self.counters.lock().expect("counters mutex poisoned");
        counters.attempted += 1;
        if fail {
            counters.injected += 1;
            tracing::debug!(operation, "injecting storage failure");
            return Err(StorageError::Io(format!("chaotic failure injection ({operation})")));
        }

        Ok(())
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn load(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StorageError> {
        self.roll("load")?;
        self.inner.load(key)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        self.roll("commit")?;
        self.inner.commit(batch)
    }
}

#[cfg(test)]
mod tests {
    use hangouts_proto::{Hangout, HangoutState};

    use super::*;
    use crate::storage::MemoryStorage;

    fn hangout(peer: &str) -> Hangout {
        Hangout::new(peer, "", HangoutState::Invited, 1)
    }

    #[test]
    fn test_chaotic_with_zero_failure_rate() {
        let chaotic = ChaoticStorage::new(MemoryStorage::new(), 0.0);

        for i in 0..50 {
            chaotic.put_hangout("alice", hangout(&format!("peer{i}"))).unwrap();
        }

        assert_eq!(chaotic.hangouts("alice").unwrap().len(), 50);
        assert_eq!(chaotic.injected_failures(), 0);
    }

    #[test]
    fn test_chaotic_with_100_failure_rate() {
        let chaotic = ChaoticStorage::new(MemoryStorage::new(), 1.0);

        assert!(chaotic.put_hangout("alice", hangout("bob")).is_err());
        assert!(chaotic.hangouts("alice").is_err());
        assert!(chaotic.inner().is_empty());
    }

    #[test]
    fn test_failed_commit_writes_nothing() {
        let memory = MemoryStorage::new();
        let chaotic = ChaoticStorage::with_seed(memory.clone(), 0.5, 7);

        for i in 0..200 {
            let mut batch = WriteBatch::new();
            batch.put_list(CacheKey::hangouts("alice"), &[hangout("bob")]).unwrap();
            batch.put_list(CacheKey::unread("alice"), &[hangout("bob")]).unwrap();
            batch.put_list(CacheKey::messages("alice", &format!("p{i}")), &[0u8]).unwrap();

            let before = memory.len();
            match chaotic.commit(batch) {
                Ok(()) => assert!(memory.len() > before),
                Err(_) => assert_eq!(memory.len(), before),
            }
        }

        assert!(chaotic.injected_failures() > 0);
        assert!(chaotic.injected_failures() < chaotic.operation_count());
    }

    #[test]
    fn test_same_seed_same_failures() {
        let a = ChaoticStorage::with_seed(MemoryStorage::new(), 0.3, 42);
        let b = ChaoticStorage::with_seed(MemoryStorage::new(), 0.3, 42);

        let outcomes_a: Vec<bool> = (0..100).map(|_| a.hangouts("alice").is_ok()).collect();
        let outcomes_b: Vec<bool> = (0..100).map(|_| b.hangouts("alice").is_ok()).collect();

        assert_eq!(outcomes_a, outcomes_b);
    }

    #[test]
    #[should_panic(expected = "failure_rate must be between 0.0 and 1.0")]
    fn test_invalid_failure_rate() {
        let _ = ChaoticStorage::new(MemoryStorage::new(), 1.5);
    }
}
