//! Consistent-hash ring and sharded in-memory key-value store.
//!
//! This crate provides the data-placement core of the store:
//!
//! - **Hash** ([`hash`]): `consistent_hash` and the string/integer hashing
//!   wrappers built on it
//! - **Bucket** ([`bucket`]): a named collection of partition points
//! - **View** ([`view`]): the ring itself, mapping `[0, 1)` onto buckets
//! - **Queue** ([`queue`]): `ThreadsafeQueue`, a single-lock FIFO used by
//!   the gossip server's worker pool
//! - **`KeyStore`** ([`keystore`]): sharded Put/Get/Remove, plus the
//!   bucket-membership operations (`add_bucket`/`remove_bucket`/`rebalance`)
//! - **Error** ([`error`]): `CoreError`, the error type shared by all of
//!   the above

pub mod bucket;
pub mod error;
pub mod hash;
pub mod keystore;
pub mod queue;
pub mod view;

// Error
pub use error::{CoreError, CoreResult};

// Hash
pub use hash::{consistent_hash, hash_int, hash_str};

// Bucket
pub use bucket::Bucket;

// View
pub use view::{make_balanced_view, BucketHandle, View, ViewSnapshot, TOLERANCE};

// Queue
pub use queue::ThreadsafeQueue;

// KeyStore
pub use keystore::{HashKey, InMemoryKeyStore, KeyStore, PartitionedKeyStore, Stats};
