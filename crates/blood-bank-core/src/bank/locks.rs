//! Per-blood-type stock locks.
//!
//! One mutex per type. A caller locks every type its decision reads or
//! writes and holds the guard from the availability read through the commit.
//! Locks are always taken in `BloodType` order, so two callers with
//! overlapping sets cannot deadlock, and callers with disjoint sets never
//! wait on each other.

use std::sync::{Mutex, MutexGuard};

use super::{BankError, BankResult};
use crate::models::BloodType;

#[derive(Default)]
pub struct StockLocks {
    locks: [Mutex<()>; 8],
}

/// Held locks for a set of blood types. Released on drop.
pub struct StockGuard<'a> {
    types: Vec<BloodType>,
    _guards: Vec<MutexGuard<'a, ()>>,
}

impl StockLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every type in `types`, in canonical order.
    pub fn acquire(&self, types: &[BloodType]) -> BankResult<StockGuard<'_>> {
        let mut ordered = types.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for t in &ordered {
            let guard = self.locks[t.index()]
                .lock()
                .map_err(|_| BankError::LockPoisoned(format!("stock lock for {}", t)))?;
            guards.push(guard);
        }

        Ok(StockGuard {
            types: ordered,
            _guards: guards,
        })
    }
}

impl StockGuard<'_> {
    /// Whether this guard holds the lock for `blood_type`.
    pub fn covers(&self, blood_type: BloodType) -> bool {
        self.types.binary_search(&blood_type).is_ok()
    }

    pub fn types(&self) -> &[BloodType] {
        &self.types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use BloodType::*;

    #[test]
    fn test_acquire_sorts_and_dedups() {
        let locks = StockLocks::new();
        let guard = locks.acquire(&[ONeg, APos, ONeg, BNeg]).unwrap();
        assert_eq!(guard.types(), &[APos, BNeg, ONeg]);
        assert!(guard.covers(BNeg));
        assert!(!guard.covers(AbPos));
    }

    #[test]
    fn test_disjoint_sets_do_not_block() {
        let locks = Arc::new(StockLocks::new());
        let _held = locks.acquire(&[APos, ONeg]).unwrap();

        let (tx, rx) = mpsc::channel();
        let other = Arc::clone(&locks);
        thread::spawn(move || {
            let _g = other.acquire(&[BPos, BNeg]).unwrap();
            tx.send(()).unwrap();
        });
        rx.recv_timeout(Duration::from_secs(5))
            .expect("disjoint lock set should not wait");
    }

    #[test]
    fn test_overlapping_sets_wait() {
        let locks = Arc::new(StockLocks::new());
        let held = locks.acquire(&[ONeg]).unwrap();

        let (tx, rx) = mpsc::channel();
        let other = Arc::clone(&locks);
        let handle = thread::spawn(move || {
            let _g = other.acquire(&[APos, ONeg]).unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(held);
        rx.recv_timeout(Duration::from_secs(5))
            .expect("lock should be granted after release");
        handle.join().unwrap();
    }
}
