//! Concurrent store of joined sessions.

use std::collections::HashMap;

use huddle_core::{Roster, SessionId};
use parking_lot::RwLock;

/// Map of every session currently in the `Joined` state to its nickname.
///
/// One `RwLock` guards the map and its revision counter. Mutations hold the
/// write lock for O(1) work and take the returned snapshot under the same
/// lock, so a caller never sees a roster that disagrees with its own write.
/// No I/O ever happens under the lock.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<SessionId, String>,
    revision: u64,
}

impl Inner {
    fn roster(&self) -> Roster {
        Roster::new(self.revision, self.entries.values().cloned().collect())
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `session_id`'s nickname and return the roster
    /// that results.
    pub fn join(&self, session_id: &SessionId, nickname: &str) -> Roster {
        let mut inner = self.inner.write();
        let _ = inner.entries.insert(session_id.clone(), nickname.to_owned());
        inner.revision += 1;
        inner.roster()
    }

    /// Remove `session_id` if present and return the roster that results.
    ///
    /// Idempotent: removing an absent id leaves the revision untouched, so
    /// repeated calls return identical rosters.
    pub fn leave(&self, session_id: &SessionId) -> Roster {
        let mut inner = self.inner.write();
        if inner.entries.remove(session_id).is_some() {
            inner.revision += 1;
        }
        inner.roster()
    }

    /// Nickname of a joined session.
    pub fn nickname(&self, session_id: &SessionId) -> Option<String> {
        self.inner.read().entries.get(session_id).cloned()
    }

    /// Current roster.
    pub fn snapshot(&self) -> Roster {
        self.inner.read().roster()
    }

    /// Ids of every joined session, in no particular order.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.inner.read().entries.keys().cloned().collect()
    }

    /// Whether `session_id` is joined.
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.inner.read().entries.contains_key(session_id)
    }

    /// Number of joined sessions.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Whether nobody is joined.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Revision of the last effective mutation.
    pub fn revision(&self) -> u64 {
        self.inner.read().revision
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::from_raw(s)
    }

    #[test]
    fn join_returns_snapshot_with_new_entry() {
        let registry = Registry::new();
        let roster = registry.join(&sid("s1"), "Alice");
        assert_eq!(roster.nicknames, vec!["Alice"]);
        assert_eq!(roster.revision, 1);

        let roster = registry.join(&sid("s2"), "Bob");
        assert_eq!(roster.nicknames, vec!["Alice", "Bob"]);
        assert_eq!(roster.revision, 2);
    }

    #[test]
    fn join_overwrites_same_session() {
        let registry = Registry::new();
        let _ = registry.join(&sid("s1"), "Alice");
        let roster = registry.join(&sid("s1"), "Alicia");
        assert_eq!(roster.nicknames, vec!["Alicia"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_nicknames_allowed() {
        let registry = Registry::new();
        let _ = registry.join(&sid("s1"), "Sam");
        let roster = registry.join(&sid("s2"), "Sam");
        assert_eq!(roster.nicknames, vec!["Sam", "Sam"]);
    }

    #[test]
    fn leave_removes_and_is_idempotent() {
        let registry = Registry::new();
        let _ = registry.join(&sid("s1"), "Alice");
        let _ = registry.join(&sid("s2"), "Bob");

        let once = registry.leave(&sid("s2"));
        let twice = registry.leave(&sid("s2"));
        assert_eq!(once, twice);
        assert_eq!(once.nicknames, vec!["Alice"]);
        assert_eq!(registry.revision(), 3);
    }

    #[test]
    fn leave_unknown_session_is_harmless() {
        let registry = Registry::new();
        let roster = registry.leave(&sid("ghost"));
        assert!(roster.is_empty());
        assert_eq!(roster.revision, 0);
    }

    #[test]
    fn nickname_lookup() {
        let registry = Registry::new();
        let _ = registry.join(&sid("s1"), "Alice");
        assert_eq!(registry.nickname(&sid("s1")).as_deref(), Some("Alice"));
        assert_eq!(registry.nickname(&sid("s2")), None);
        assert!(registry.contains(&sid("s1")));
    }

    #[test]
    fn session_ids_lists_joined_only() {
        let registry = Registry::new();
        let _ = registry.join(&sid("s1"), "Alice");
        let _ = registry.join(&sid("s2"), "Bob");
        let _ = registry.leave(&sid("s1"));
        assert_eq!(registry.session_ids(), vec![sid("s2")]);
    }

    #[test]
    fn concurrent_joins_never_lose_entries() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..16)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let _ = registry.join(&sid(&format!("t{t}_{i}")), "n");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 1600);
        assert_eq!(registry.revision(), 1600);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Join(u8, String),
        Leave(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8, "[a-z]{1,6}").prop_map(|(s, n)| Op::Join(s, n)),
            (0u8..8).prop_map(Op::Leave),
        ]
    }

    proptest! {
        #[test]
        fn snapshot_matches_model(ops in proptest::collection::vec(op(), 0..64)) {
            let registry = Registry::new();
            let mut model: BTreeMap<u8, String> = BTreeMap::new();
            for op in ops {
                match op {
                    Op::Join(s, n) => {
                        let _ = registry.join(&sid(&format!("s{s}")), &n);
                        let _ = model.insert(s, n);
                    }
                    Op::Leave(s) => {
                        let _ = registry.leave(&sid(&format!("s{s}")));
                        let _ = model.remove(&s);
                    }
                }
            }
            let mut expected: Vec<String> = model.values().cloned().collect();
            expected.sort_unstable();
            prop_assert_eq!(registry.snapshot().nicknames, expected);
            for (s, n) in &model {
                prop_assert_eq!(registry.nickname(&sid(&format!("s{s}"))), Some(n.clone()));
            }
        }

        #[test]
        fn leave_twice_equals_leave_once(
            ops in proptest::collection::vec(op(), 0..32),
            target in 0u8..8,
        ) {
            let registry = Registry::new();
            for op in ops {
                match op {
                    Op::Join(s, n) => { let _ = registry.join(&sid(&format!("s{s}")), &n); }
                    Op::Leave(s) => { let _ = registry.leave(&sid(&format!("s{s}"))); }
                }
            }
            let id = sid(&format!("s{target}"));
            let once = registry.leave(&id);
            let twice = registry.leave(&id);
            prop_assert_eq!(once, twice);
        }
    }
}
