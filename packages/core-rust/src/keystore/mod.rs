//! Sharded key-value storage built on top of a [`View`](crate::view::View).
//!
//! `KeyStore` is the read/write surface every backing store exposes;
//! `PartitionedKeyStore` extends it with the operations that change a
//! store's bucket membership (`add_bucket`, `remove_bucket`, `rebalance`).
//! A store only ever holds the shards for the buckets it has been told to
//! own via `add_bucket` — routing a key to a bucket this store hasn't been
//! given does not error, it just means the key isn't ours, reported as
//! `Ok(false)` / `Ok(None)` rather than a [`crate::error::CoreError`]. An
//! actual error means the routing itself broke (e.g. the view has no
//! buckets at all), not "wrong store". The only concrete implementation
//! shipped here is [`memory::InMemoryKeyStore`], but callers should depend
//! on the traits so that a future on-disk store is a drop-in replacement.

mod memory;

pub use memory::{HashKey, InMemoryKeyStore};

use crate::error::CoreResult;

/// Per-bucket size report, keyed by bucket name.
pub type Stats = std::collections::BTreeMap<String, usize>;

/// Read/write surface of a sharded key-value store.
///
/// Implementations route each key to a bucket via a shared [`View`](crate::view::View)
/// and lock only that bucket's shard for the duration of the call; two
/// concurrent calls touching different buckets never block each other.
pub trait KeyStore<K, V> {
    /// Associates `value` with `key`, if `key` routes to a bucket this
    /// store owns. Returns `false` (leaving any prior value untouched)
    /// if the key belongs to some other store.
    ///
    /// # Errors
    /// Returns an error if `key` cannot be routed at all (e.g. the
    /// backing view has no buckets).
    fn put(&self, key: K, value: V) -> CoreResult<bool>;

    /// Looks up the value currently associated with `key`. Returns `None`
    /// both when the key is unset and when it doesn't belong to this
    /// store — callers that need to distinguish the two should check
    /// ownership separately.
    ///
    /// # Errors
    /// Returns an error if `key` cannot be routed at all.
    fn get(&self, key: &K) -> CoreResult<Option<V>>;

    /// Removes `key`, returning whether an entry was actually erased.
    ///
    /// # Errors
    /// Returns an error if `key` cannot be routed at all.
    fn remove(&self, key: &K) -> CoreResult<bool>;

    /// Number of entries currently stored, broken down by bucket name.
    fn stats(&self) -> Stats;
}

/// Extends [`KeyStore`] with operations that change bucket membership.
pub trait PartitionedKeyStore<K, V>: KeyStore<K, V> {
    /// Registers a new, empty shard for `bucket_name`. A no-op if the
    /// bucket is already known.
    fn add_bucket(&self, bucket_name: &str);

    /// Moves every key out of `bucket_name`'s shard, trying each of
    /// `destinations` in turn until one accepts it, then drops the shard.
    ///
    /// Returns `true` once every key found a destination and the shard
    /// was dropped. Returns `false` (leaving the shard untouched) if any
    /// key exhausted every destination without being accepted — in that
    /// case keys already relocated to other destinations before the
    /// failure stay relocated; only the shard deletion is withheld.
    ///
    /// # Errors
    /// Propagates routing errors surfaced while computing where keys
    /// belong, and whatever `destinations[i].put` itself returns as an
    /// error.
    fn remove_bucket(&self, bucket_name: &str, destinations: &[&dyn KeyStore<K, V>])
        -> CoreResult<bool>;

    /// Re-scans `source`'s shard and moves to `dest` any key the view no
    /// longer resolves to `source` (e.g. after a bucket was added or
    /// removed). Aborts and returns `false` on the first key `dest`
    /// rejects, leaving `source`'s shard exactly as it was.
    ///
    /// # Errors
    /// Propagates routing errors from the underlying view.
    fn rebalance(&self, source: &str, dest: &dyn KeyStore<K, V>) -> CoreResult<bool>;
}
