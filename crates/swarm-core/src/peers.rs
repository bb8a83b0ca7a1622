//! Registry of remote participants and their last reported pose.
//!
//! Mutation happens only on the session dispatch path; everything else takes
//! `snapshot()` and iterates a consistent copy. The registry is shared across
//! a process's bots behind `Arc<RwLock<_>>` (read-mostly, single writer path).

use std::collections::HashMap;

use tokio::sync::watch;

use crate::pose::Pose;

#[derive(Debug)]
pub struct PeerRegistry {
    peers: HashMap<String, Pose>,
    count_tx: watch::Sender<usize>,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerRegistry {
    pub fn new() -> Self {
        let (count_tx, _) = watch::channel(0);
        Self {
            peers: HashMap::new(),
            count_tx,
        }
    }

    /// Inserts the peer if absent, else overwrites its pose.
    pub fn upsert(&mut self, id: String, pose: Pose) {
        self.peers.insert(id, pose);
        self.count_tx.send_replace(self.peers.len());
    }

    /// Deletes the peer if present; no-op otherwise.
    pub fn remove(&mut self, id: &str) {
        self.peers.remove(id);
        self.count_tx.send_replace(self.peers.len());
    }

    /// A cloned view for read-only iteration over one tick.
    pub fn snapshot(&self) -> HashMap<String, Pose> {
        self.peers.clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.peers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Receiver tracking the peer count. Lets a launcher await "N peers
    /// present" as a rendezvous instead of polling the map.
    pub fn watch_count(&self) -> watch::Receiver<usize> {
        self.count_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_remove_leaves_registry_empty() {
        let mut registry = PeerRegistry::new();
        registry.upsert("A".into(), Pose::default());
        assert!(registry.contains("A"));
        registry.remove("A");
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_of_unknown_id_is_noop() {
        let mut registry = PeerRegistry::new();
        registry.upsert("A".into(), Pose::default());
        registry.remove("B");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn upsert_overwrites_pose() {
        let mut registry = PeerRegistry::new();
        registry.upsert("A".into(), Pose::default());
        let mut moved = Pose::default();
        moved.set_position(0.9, 0.1);
        registry.upsert("A".into(), moved.clone());
        assert_eq!(registry.snapshot()["A"], moved);
    }

    #[test]
    fn watch_count_tracks_membership() {
        let mut registry = PeerRegistry::new();
        let rx = registry.watch_count();
        assert_eq!(*rx.borrow(), 0);
        registry.upsert("A".into(), Pose::default());
        registry.upsert("B".into(), Pose::default());
        assert_eq!(*rx.borrow(), 2);
        registry.remove("A");
        assert_eq!(*rx.borrow(), 1);
    }
}
