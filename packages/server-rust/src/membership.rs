//! Tracks which servers this node believes are alive or suspect.
//!
//! Two independent maps, same locking discipline as
//! [`ringkv_core::View`]'s `buckets`/`ring` split: whenever both locks are
//! needed, `alive` is always taken before `suspected`, to avoid lock-order
//! inversion with any other code path that might need both. Neither lock
//! is ever held while a network call is in flight -- callers snapshot what
//! they need, release the lock, then talk to the network.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::wire::{Record, Server};

/// Current wall-clock time as Unix seconds, the unit `Record::timestamp`
/// uses on the wire.
#[must_use]
pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// This node's view of cluster membership.
pub struct Membership {
    self_server: Server,
    alive: RwLock<HashMap<String, Record>>,
    suspected: RwLock<HashMap<String, Record>>,
}

impl Membership {
    /// Creates a membership view that already considers `self_server`
    /// alive.
    #[must_use]
    pub fn new(self_server: Server) -> Self {
        let mut alive = HashMap::new();
        alive.insert(
            self_server.key(),
            Record {
                did_gossip: true,
                ..Record::new(self_server.clone(), now_unix_secs())
            },
        );
        Self {
            self_server,
            alive: RwLock::new(alive),
            suspected: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn self_server(&self) -> &Server {
        &self.self_server
    }

    /// Marks `server` alive as of `timestamp`, clearing any suspicion.
    /// A no-op if a fresher alive record already exists.
    pub fn mark_alive(&self, server: &Server, timestamp: u64) {
        let key = server.key();
        {
            let mut alive = self.alive.write();
            let fresher = alive.get(&key).is_some_and(|r| r.timestamp >= timestamp);
            if !fresher {
                alive.insert(
                    key.clone(),
                    Record {
                        did_gossip: true,
                        ..Record::new(server.clone(), timestamp)
                    },
                );
            }
        }
        self.suspected.write().remove(&key);
    }

    /// Marks `server` suspect as of `timestamp`, unless it is `self` (a
    /// node never suspects itself), a fresher alive record already exists,
    /// or the peer is already suspected (the suspicion clock, once
    /// started, is never reset or extended by a later claim). A server is
    /// never in both sets at once, so a successful suspicion also drops
    /// any alive record for it.
    pub fn mark_suspected(&self, server: &Server, timestamp: u64, forwarder: Option<Server>) {
        if server.key() == self.self_server.key() {
            tracing::debug!(peer = %server, "refusing to suspect self");
            return;
        }

        let key = server.key();
        {
            let alive = self.alive.read();
            if alive.get(&key).is_some_and(|r| r.timestamp >= timestamp) {
                return;
            }
        }

        let mut suspected = self.suspected.write();
        if !suspected.contains_key(&key) {
            suspected.insert(
                key.clone(),
                Record {
                    forwarder,
                    ..Record::new(server.clone(), timestamp)
                },
            );
        }
        drop(suspected);
        self.alive.write().remove(&key);
    }

    /// Drops `server` from both alive and suspected sets entirely (used
    /// once the grace period has elapsed).
    pub fn evict(&self, key: &str) {
        self.alive.write().remove(key);
        self.suspected.write().remove(key);
    }

    #[must_use]
    pub fn is_alive(&self, key: &str) -> bool {
        self.alive.read().contains_key(key)
    }

    #[must_use]
    pub fn is_suspected(&self, key: &str) -> bool {
        self.suspected.read().contains_key(key)
    }

    /// Snapshot of every alive record, for building an outgoing report.
    #[must_use]
    pub fn alive_records(&self) -> Vec<Record> {
        self.alive.read().values().cloned().collect()
    }

    /// Snapshot of every suspected record, for building an outgoing
    /// report.
    #[must_use]
    pub fn suspected_records(&self) -> Vec<Record> {
        self.suspected.read().values().cloned().collect()
    }

    /// All peers (excluding self) currently considered alive, as targets
    /// for the report loop to gossip to.
    #[must_use]
    pub fn peers(&self) -> Vec<Server> {
        self.alive
            .read()
            .values()
            .map(|r| r.server.clone())
            .filter(|s| s.key() != self.self_server.key())
            .collect()
    }

    /// Suspected servers that have been suspect for at least `grace_period`
    /// seconds as of `now`, and should now be evicted entirely.
    #[must_use]
    pub fn expired(&self, grace_period_secs: u64, now: u64) -> Vec<String> {
        self.suspected
            .read()
            .iter()
            .filter(|(_, r)| now.saturating_sub(r.timestamp) >= grace_period_secs)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Merges an incoming [`Report`](crate::wire::Report) into this node's
    /// view. An incoming record only overrides a local one when it is
    /// strictly newer; a claim that `self` is suspect is always refuted
    /// by re-asserting `self` alive with a fresher timestamp instead of
    /// being applied, matching the self-refutation rule.
    pub fn merge_report(&self, alive: &[Record], suspected: &[Record]) {
        for record in alive {
            self.mark_alive(&record.server, record.timestamp);
        }
        for record in suspected {
            if record.server.key() == self.self_server.key() {
                let refuted_at = record.timestamp + 1;
                tracing::info!(at = refuted_at, "refuting suspicion about self");
                self.mark_alive(&self.self_server.clone(), refuted_at);
                continue;
            }
            self.mark_suspected(&record.server, now_unix_secs(), record.forwarder.clone());
        }
    }
}
