//! In-memory, sharded implementation of [`KeyStore`]/[`PartitionedKeyStore`].

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{KeyStore, PartitionedKeyStore, Stats};
use crate::error::CoreResult;
use crate::hash::{hash_int, hash_str};
use crate::view::View;

/// Maps a key to its position on the hash ring.
///
/// Strings and integers get the two hashing strategies the rest of the
/// system relies on: [`hash_str`] (MD5-based) for strings, [`hash_int`]
/// (plain modulo) for integral keys, since integers are already close to
/// uniform under a modulus and don't benefit from a cryptographic digest.
pub trait HashKey {
    /// Returns this key's position on the `[0, 1)` ring.
    fn hash_key(&self) -> f64;
}

impl HashKey for String {
    fn hash_key(&self) -> f64 {
        hash_str(self)
    }
}

impl HashKey for i64 {
    fn hash_key(&self) -> f64 {
        hash_int(*self)
    }
}

impl HashKey for i32 {
    fn hash_key(&self) -> f64 {
        hash_int(i64::from(*self))
    }
}

/// A sharded, in-process key-value store.
///
/// Several `InMemoryKeyStore`s can share a single [`View`], each one owning
/// a disjoint subset of its buckets: ownership is tracked purely by which
/// shards [`add_bucket`](PartitionedKeyStore::add_bucket) created, not by
/// the view. Routing a key to a bucket this instance was never given isn't
/// an error, it's a normal "not ours" — reported as `Ok(false)`/`Ok(None)`.
/// Each bucket's shard is its own `RwLock<HashMap<K, V>>`, so a `put`/`get`/
/// `remove` call locks exactly one shard and operations against different
/// buckets never contend. The shard-membership map is itself behind its
/// own lock, taken only while adding, removing, or listing shards, never
/// while a per-shard lock is held.
pub struct InMemoryKeyStore<K, V> {
    view: Arc<View>,
    shards: RwLock<HashMap<String, RwLock<HashMap<K, V>>>>,
}

impl<K, V> InMemoryKeyStore<K, V>
where
    K: HashKey + Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a store backed by `view`, owning no buckets yet. Call
    /// [`add_bucket`](PartitionedKeyStore::add_bucket) for each bucket this
    /// instance should serve.
    #[must_use]
    pub fn new(view: Arc<View>) -> Self {
        Self {
            view,
            shards: RwLock::new(HashMap::new()),
        }
    }

    fn shard_for(&self, key: &K) -> CoreResult<String> {
        let bucket = self.view.find(key.hash_key())?;
        Ok(bucket.read().name().to_string())
    }
}

impl<K, V> KeyStore<K, V> for InMemoryKeyStore<K, V>
where
    K: HashKey + Eq + Hash + Clone,
    V: Clone,
{
    fn put(&self, key: K, value: V) -> CoreResult<bool> {
        let name = self.shard_for(&key)?;
        let shards = self.shards.read();
        match shards.get(&name) {
            Some(shard) => {
                shard.write().insert(key, value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get(&self, key: &K) -> CoreResult<Option<V>> {
        let name = self.shard_for(key)?;
        let shards = self.shards.read();
        match shards.get(&name) {
            Some(shard) => Ok(shard.read().get(key).cloned()),
            None => Ok(None),
        }
    }

    fn remove(&self, key: &K) -> CoreResult<bool> {
        let name = self.shard_for(key)?;
        let shards = self.shards.read();
        match shards.get(&name) {
            Some(shard) => Ok(shard.write().remove(key).is_some()),
            None => Ok(false),
        }
    }

    fn stats(&self) -> Stats {
        self.shards
            .read()
            .iter()
            .map(|(name, shard)| (name.clone(), shard.read().len()))
            .collect()
    }
}

impl<K, V> PartitionedKeyStore<K, V> for InMemoryKeyStore<K, V>
where
    K: HashKey + Eq + Hash + Clone,
    V: Clone,
{
    fn add_bucket(&self, bucket_name: &str) {
        self.shards
            .write()
            .entry(bucket_name.to_string())
            .or_insert_with(|| RwLock::new(HashMap::new()));
    }

    fn remove_bucket(
        &self,
        bucket_name: &str,
        destinations: &[&dyn KeyStore<K, V>],
    ) -> CoreResult<bool> {
        let entries: Vec<(K, V)> = {
            let shards = self.shards.read();
            let Some(shard) = shards.get(bucket_name) else {
                return Ok(true);
            };
            shard
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        for (key, value) in entries {
            let mut accepted = false;
            for dest in destinations {
                if dest.put(key.clone(), value.clone())? {
                    accepted = true;
                    break;
                }
            }
            if !accepted {
                tracing::error!(
                    bucket = %bucket_name,
                    "no destination accepted a key while removing bucket; leaving shard intact"
                );
                return Ok(false);
            }
        }

        self.shards.write().remove(bucket_name);
        tracing::debug!(bucket = %bucket_name, "removed bucket");
        Ok(true)
    }

    fn rebalance(&self, source: &str, dest: &dyn KeyStore<K, V>) -> CoreResult<bool> {
        let to_move: Vec<(K, V)> = {
            let shards = self.shards.read();
            let Some(shard) = shards.get(source) else {
                return Ok(true);
            };
            let shard = shard.read();
            let mut to_move = Vec::new();
            for (k, v) in shard.iter() {
                let bucket_name = self.shard_for(k)?;
                if bucket_name != source {
                    to_move.push((k.clone(), v.clone()));
                }
            }
            to_move
        };

        if to_move.is_empty() {
            return Ok(true);
        }

        let mut moved_keys = Vec::with_capacity(to_move.len());
        for (key, value) in to_move {
            if !dest.put(key.clone(), value)? {
                tracing::warn!(source, "rebalance aborted: destination rejected a key");
                return Ok(false);
            }
            moved_keys.push(key);
        }

        if let Some(shard) = self.shards.read().get(source) {
            let mut shard = shard.write();
            for k in &moved_keys {
                shard.remove(k);
            }
        }
        tracing::debug!(source, moved = moved_keys.len(), "rebalanced shard");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::Bucket;
    use crate::view::make_balanced_view;

    #[derive(Clone, Debug)]
    struct Keyed {
        id: u32,
        point: f64,
    }

    impl PartialEq for Keyed {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }
    impl Eq for Keyed {}
    impl Hash for Keyed {
        fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }
    impl HashKey for Keyed {
        fn hash_key(&self) -> f64 {
            self.point
        }
    }

    fn make_view() -> Arc<View> {
        let v = View::new();
        v.add(Arc::new(RwLock::new(Bucket::new("a", vec![0.3]))));
        v.add(Arc::new(RwLock::new(Bucket::new("b", vec![0.7]))));
        Arc::new(v)
    }

    fn store_owning(view: Arc<View>, names: &[&str]) -> InMemoryKeyStore<Keyed, String> {
        let store = InMemoryKeyStore::new(view);
        for name in names {
            store.add_bucket(name);
        }
        store
    }

    #[test]
    fn put_and_get_roundtrip() {
        let view = make_view();
        let store = store_owning(view, &["a", "b"]);
        let key = Keyed { id: 1, point: 0.1 };
        assert!(store.put(key.clone(), "hello".to_string()).unwrap());
        assert_eq!(store.get(&key).unwrap(), Some("hello".to_string()));
    }

    #[test]
    fn put_without_owning_bucket_returns_false() {
        let view = make_view();
        // Store never calls add_bucket, so it owns nothing.
        let store: InMemoryKeyStore<Keyed, String> = InMemoryKeyStore::new(view);
        let key = Keyed { id: 1, point: 0.1 };
        assert!(!store.put(key.clone(), "hello".to_string()).unwrap());
        assert_eq!(store.get(&key).unwrap(), None);
    }

    #[test]
    fn remove_deletes_entry() {
        let view = make_view();
        let store = store_owning(view, &["a", "b"]);
        let key = Keyed { id: 1, point: 0.1 };
        store.put(key.clone(), "hello".to_string()).unwrap();
        assert!(store.remove(&key).unwrap());
        assert_eq!(store.get(&key).unwrap(), None);
        assert!(!store.remove(&key).unwrap());
    }

    #[test]
    fn stats_counts_per_bucket() {
        let view = make_view();
        let store = store_owning(view, &["a", "b"]);
        store.put(Keyed { id: 1, point: 0.1 }, "x".into()).unwrap(); // -> a
        store.put(Keyed { id: 2, point: 0.5 }, "y".into()).unwrap(); // -> b
        store.put(Keyed { id: 3, point: 0.95 }, "z".into()).unwrap(); // wraps -> a

        let stats = store.stats();
        assert_eq!(stats.get("a"), Some(&2));
        assert_eq!(stats.get("b"), Some(&1));
    }

    #[test]
    fn add_bucket_creates_empty_shard() {
        let view = make_view();
        let store = store_owning(view, &["a"]);
        store.add_bucket("c");
        assert_eq!(store.stats().get("c"), Some(&0));
    }

    #[test]
    fn add_bucket_is_idempotent() {
        let view = make_view();
        let store = store_owning(view, &["a"]);
        let key = Keyed { id: 1, point: 0.1 };
        store.put(key.clone(), "x".into()).unwrap();
        store.add_bucket("a");
        assert_eq!(store.get(&key).unwrap(), Some("x".to_string()));
    }

    #[test]
    fn three_stores_partition_keys_disjointly() {
        // 3 stores share one 6-bucket view, each owning 2 buckets; a key
        // must be accepted by exactly one of them.
        let view = Arc::new(make_balanced_view(6, 4).unwrap());
        let store_a = store_owning(Arc::clone(&view), &["bucket-0", "bucket-1"]);
        let store_b = store_owning(Arc::clone(&view), &["bucket-2", "bucket-3"]);
        let store_c = store_owning(view, &["bucket-4", "bucket-5"]);

        for id in 0..2000i64 {
            let key = Keyed {
                id: id as u32,
                point: hash_int(id),
            };
            let results = [
                store_a.put(key.clone(), "v".to_string()).unwrap(),
                store_b.put(key.clone(), "v".to_string()).unwrap(),
                store_c.put(key, "v".to_string()).unwrap(),
            ];
            assert_eq!(
                results.iter().filter(|r| **r).count(),
                1,
                "exactly one store should accept each key"
            );
        }
    }

    #[test]
    fn remove_bucket_unknown_is_noop() {
        let view = make_view();
        let store = store_owning(view, &["a"]);
        let other: InMemoryKeyStore<Keyed, String> = InMemoryKeyStore::new(Arc::new(View::new()));
        let destinations: Vec<&dyn KeyStore<Keyed, String>> = vec![&other];
        assert!(store.remove_bucket("nonexistent", &destinations).unwrap());
    }

    #[test]
    fn remove_bucket_migrates_entries_to_destination() {
        let view = make_view();
        let source = store_owning(Arc::clone(&view), &["a", "b"]);
        let k1 = Keyed { id: 1, point: 0.5 }; // -> b
        let k2 = Keyed { id: 2, point: 0.6 }; // -> b
        source.put(k1.clone(), "one".into()).unwrap();
        source.put(k2.clone(), "two".into()).unwrap();

        let dest = store_owning(view, &["a", "b"]);
        let destinations: Vec<&dyn KeyStore<Keyed, String>> = vec![&dest];
        assert!(source.remove_bucket("b", &destinations).unwrap());

        assert_eq!(source.stats().get("b"), None);
        assert_eq!(dest.get(&k1).unwrap(), Some("one".to_string()));
        assert_eq!(dest.get(&k2).unwrap(), Some("two".to_string()));
    }

    #[test]
    fn remove_bucket_fails_without_erasure_when_no_destination_accepts() {
        let view = make_view();
        let source = store_owning(Arc::clone(&view), &["a", "b"]);
        let key = Keyed { id: 1, point: 0.5 }; // -> b
        source.put(key.clone(), "one".into()).unwrap();

        // Destination owns neither bucket, so it rejects every key.
        let dest: InMemoryKeyStore<Keyed, String> = InMemoryKeyStore::new(view);
        let destinations: Vec<&dyn KeyStore<Keyed, String>> = vec![&dest];

        assert!(!source.remove_bucket("b", &destinations).unwrap());
        // Shard left intact: the key is still there and still reachable.
        assert_eq!(source.get(&key).unwrap(), Some("one".to_string()));
    }

    #[test]
    fn rebalance_moves_misrouted_keys() {
        let view = make_view();
        let store = store_owning(Arc::clone(&view), &["a", "b"]);
        let key = Keyed { id: 1, point: 0.1 }; // initially -> a
        store.put(key.clone(), "x".into()).unwrap();
        assert_eq!(store.stats().get("a"), Some(&1));

        // A new bucket slots in between 0 and "a"'s point, so 0.1 now
        // belongs to it instead.
        view.add(Arc::new(RwLock::new(Bucket::new("c", vec![0.15]))));
        let dest = store_owning(view, &["c"]);

        assert!(store.rebalance("a", &dest).unwrap());

        assert_eq!(store.stats().get("a"), Some(&0));
        assert_eq!(dest.get(&key).unwrap(), Some("x".to_string()));
    }

    #[test]
    fn rebalance_on_unknown_bucket_is_noop() {
        let view = make_view();
        let store = store_owning(Arc::clone(&view), &["a"]);
        let dest: InMemoryKeyStore<Keyed, String> = InMemoryKeyStore::new(view);
        assert!(store.rebalance("nonexistent", &dest).unwrap());
    }

    /// 3 stores share a 6-bucket view and 20,000 keys; a 7th bucket is
    /// added and assigned to store-a, which rebalances the two buckets
    /// whose ring segments it split. Every key must remain retrievable
    /// from exactly one store afterward, with none lost.
    #[test]
    fn rebalance_after_growing_the_view_preserves_every_key() {
        let view = Arc::new(make_balanced_view(6, 4).unwrap());
        let store_a = store_owning(Arc::clone(&view), &["bucket-0", "bucket-1"]);
        let store_b = store_owning(Arc::clone(&view), &["bucket-2", "bucket-3"]);
        let store_c = store_owning(Arc::clone(&view), &["bucket-4", "bucket-5"]);

        for id in 0..20_000i64 {
            let key = Keyed {
                id: id as u32,
                point: hash_int(id),
            };
            let accepted = store_a.put(key.clone(), "v".to_string()).unwrap()
                || store_b.put(key.clone(), "v".to_string()).unwrap()
                || store_c.put(key, "v".to_string()).unwrap();
            assert!(accepted, "every key must land in exactly one store");
        }
        let total_before: usize = store_a.stats().values().sum::<usize>()
            + store_b.stats().values().sum::<usize>()
            + store_c.stats().values().sum::<usize>();
        assert_eq!(total_before, 20_000);

        // Grow the ring: a new bucket slots in and is assigned to store-a.
        // Whichever existing buckets' ring segments it split now need to
        // give up the keys the new bucket claims; try every existing
        // bucket against every store that might own it (a no-op wherever
        // nothing actually moved).
        view.add(Arc::new(RwLock::new(Bucket::new("bucket-6", vec![0.02, 0.52]))));
        store_a.add_bucket("bucket-6");

        for bucket in ["bucket-0", "bucket-1", "bucket-2", "bucket-3", "bucket-4", "bucket-5"] {
            assert!(store_a.rebalance(bucket, &store_a).unwrap());
            assert!(store_b.rebalance(bucket, &store_a).unwrap());
            assert!(store_c.rebalance(bucket, &store_a).unwrap());
        }

        let mut found = 0usize;
        for id in 0..20_000i64 {
            let key = Keyed {
                id: id as u32,
                point: hash_int(id),
            };
            let hits = [
                store_a.get(&key).unwrap(),
                store_b.get(&key).unwrap(),
                store_c.get(&key).unwrap(),
            ]
            .into_iter()
            .flatten()
            .count();
            assert_eq!(hits, 1, "key {id} must be retrievable from exactly one store after rebalancing");
            found += hits;
        }
        assert_eq!(found, 20_000, "no key may be lost across a rebalance");
    }

    #[test]
    fn rebalance_aborts_without_moving_on_rejection() {
        let view = make_view();
        let store = store_owning(Arc::clone(&view), &["a", "b"]);
        let key = Keyed { id: 1, point: 0.1 }; // -> a
        store.put(key.clone(), "x".into()).unwrap();

        view.add(Arc::new(RwLock::new(Bucket::new("c", vec![0.15]))));
        // dest never registers "c", so it rejects the relocated key.
        let dest: InMemoryKeyStore<Keyed, String> = InMemoryKeyStore::new(view);

        assert!(!store.rebalance("a", &dest).unwrap());
        assert_eq!(store.get(&key).unwrap(), Some("x".to_string()));
        assert_eq!(store.stats().get("a"), Some(&1));
    }
}
