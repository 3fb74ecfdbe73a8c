//! Process-wide session establishment lock.
//!
//! Prevents two tabs/processes of one device from writing under the same
//! session by acquiring a slot keyed by `accountID_<slot>`, trying
//! `0..max_slots` for a free one. Held for the lifetime of the node handle.

use covalue_core::ids::AgentId;
use covalue_core::CovalueError;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Source of session nonces, injected so tests can run many "devices" of
/// one account in one process without contending on the same slot table.
pub trait SessionLocker: Send + Sync {
    /// Acquire the first free slot for `account`, trying `0..max_slots`.
    fn acquire(&self, account: AgentId, max_slots: u64) -> Result<u64, CovalueError>;

    /// Release a previously acquired slot.
    fn release(&self, account: AgentId, slot: u64);
}

/// In-process slot table, sufficient for a single node/process; a
/// multi-process deployment would back this with a file lock or advisory
/// lock in shared device storage instead.
#[derive(Debug, Default)]
pub struct InMemorySessionLocker {
    taken: Mutex<HashSet<(AgentId, u64)>>,
}

impl InMemorySessionLocker {
    /// An empty slot table.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionLocker for InMemorySessionLocker {
    fn acquire(&self, account: AgentId, max_slots: u64) -> Result<u64, CovalueError> {
        let mut taken = self.taken.lock();
        for slot in 0..max_slots {
            if taken.insert((account, slot)) {
                return Ok(slot);
            }
        }
        Err(CovalueError::internal(format!(
            "no free session slot for {account} within {max_slots} tries"
        )))
    }

    fn release(&self, account: AgentId, slot: u64) {
        self.taken.lock().remove(&(account, slot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covalue_core::random::OsRandom;
    use covalue_crypto::AgentSecret;

    #[test]
    fn first_two_sessions_get_distinct_slots() {
        let locker = InMemorySessionLocker::new();
        let account = AgentSecret::generate(&OsRandom).id();
        let a = locker.acquire(account, 100).unwrap();
        let b = locker.acquire(account, 100).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn released_slot_is_reusable() {
        let locker = InMemorySessionLocker::new();
        let account = AgentSecret::generate(&OsRandom).id();
        let slot = locker.acquire(account, 100).unwrap();
        locker.release(account, slot);
        assert_eq!(locker.acquire(account, 100).unwrap(), slot);
    }

    #[test]
    fn exhausting_all_slots_is_an_error() {
        let locker = InMemorySessionLocker::new();
        let account = AgentSecret::generate(&OsRandom).id();
        for _ in 0..3 {
            locker.acquire(account, 3).unwrap();
        }
        assert!(locker.acquire(account, 3).is_err());
    }
}
