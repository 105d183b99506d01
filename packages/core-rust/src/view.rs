//! `View`: the whole hash space mapped onto a set of [`Bucket`]s.
//!
//! A `View` answers "which bucket owns hash `h`?" by keeping a ring of
//! partition points, each pointing back at the bucket that contributed it,
//! plus a name-ordered set of the buckets themselves. Reads (`find`) take a
//! shared lock; structural changes (`add`/`remove`/`rename_buckets`) take an
//! exclusive one. The two locks are independent, matching the source's
//! `buckets_mx_` / `partition_map_mx_` split.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::bucket::Bucket;
use crate::error::{CoreError, CoreResult};

/// Two ring points within this distance are treated as equal.
pub const TOLERANCE: f64 = 1e-5;

/// Shared, lockable handle to a [`Bucket`].
///
/// Buckets live inside the `View`; a `KeyStore` holds handles into the set
/// of buckets it is responsible for. Renaming a bucket goes through
/// [`View::rename_buckets`], which takes the owning lock before mutating.
pub type BucketHandle = Arc<RwLock<Bucket>>;

/// Serializable snapshot of a `View`, used for the JSON rendering contract
/// (`{"view": {"buckets": [...]}}`) and for round-trip tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub view: ViewBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewBody {
    pub buckets: Vec<BucketSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSnapshot {
    pub name: String,
    pub points: Vec<f64>,
}

/// Maps the whole `[0, 1)` hash space onto a set of buckets.
pub struct View {
    /// Ring points in ascending order, each paired with the bucket that
    /// contributed it.
    ring: RwLock<Vec<(f64, BucketHandle)>>,
    /// Buckets ordered by name.
    buckets: RwLock<BTreeMap<String, BucketHandle>>,
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}

impl View {
    /// Creates an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ring: RwLock::new(Vec::new()),
            buckets: RwLock::new(BTreeMap::new()),
        }
    }

    /// Adds a bucket to this view, registering all of its partition points
    /// on the ring.
    ///
    /// Buckets lock is taken first, then the ring lock, matching the
    /// "buckets before ring" ordering rule.
    pub fn add(&self, bucket: BucketHandle) {
        let points: Vec<f64> = bucket.read().partition_points().to_vec();
        let name = bucket.read().name().to_string();

        self.buckets.write().insert(name, Arc::clone(&bucket));

        let mut ring = self.ring.write();
        for point in points {
            let idx = ring
                .iter()
                .position(|(p, _)| *p > point)
                .unwrap_or(ring.len());
            ring.insert(idx, (point, Arc::clone(&bucket)));
        }
    }

    /// Removes a bucket from this view, dropping its points from the ring.
    ///
    /// Returns `true` if a matching bucket was found and removed.
    pub fn remove(&self, bucket: &BucketHandle) -> bool {
        let found = {
            let mut ring = self.ring.write();
            let before = ring.len();
            ring.retain(|(_, b)| !Arc::ptr_eq(b, bucket));
            ring.len() != before
        };

        if found {
            let name = bucket.read().name().to_string();
            self.buckets.write().remove(&name);
            tracing::debug!(bucket = %name, "removed bucket from view");
        }
        found
    }

    /// The number of buckets registered in this view.
    #[must_use]
    pub fn num_buckets(&self) -> usize {
        self.buckets.read().len()
    }

    /// All buckets, ordered by name.
    #[must_use]
    pub fn buckets(&self) -> Vec<BucketHandle> {
        self.buckets.read().values().cloned().collect()
    }

    /// Finds the bucket owning hash `h`.
    ///
    /// Returns the bucket whose partition point is the smallest strictly
    /// greater than `h`; wraps around to the lowest point if `h` is greater
    /// than every point on the ring.
    ///
    /// # Errors
    /// [`CoreError::InvalidArgument`] if `h` is outside `[0, 1 + TOLERANCE]`;
    /// [`CoreError::EmptyView`] if no buckets have been added yet.
    pub fn find(&self, h: f64) -> CoreResult<BucketHandle> {
        if !(0.0..=1.0 + TOLERANCE).contains(&h) {
            return Err(CoreError::InvalidArgument(format!(
                "hash should be in the [0, 1] interval, was: {h}"
            )));
        }

        let ring = self.ring.read();
        if ring.is_empty() {
            return Err(CoreError::EmptyView);
        }

        match ring.iter().find(|(p, _)| *p > h + TOLERANCE) {
            Some((_, bucket)) => Ok(Arc::clone(bucket)),
            None => Ok(Arc::clone(&ring[0].1)),
        }
    }

    /// Renames the first `new_names.len()` buckets, in name-sorted order,
    /// to the given names.
    pub fn rename_buckets(&self, new_names: &[String]) {
        let buckets = self.buckets.read();
        let handles: Vec<BucketHandle> = buckets.values().cloned().collect();
        drop(buckets);

        let mut buckets = self.buckets.write();
        for (handle, new_name) in handles.iter().zip(new_names.iter()) {
            let old_name = handle.read().name().to_string();
            handle.write().set_name(new_name.clone());
            if let Some(b) = buckets.remove(&old_name) {
                buckets.insert(new_name.clone(), b);
            }
        }
    }

    /// Renders this view as a JSON-serializable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        let buckets = self
            .buckets()
            .iter()
            .map(|b| {
                let b = b.read();
                BucketSnapshot {
                    name: b.name().to_string(),
                    points: b.partition_points().to_vec(),
                }
            })
            .collect();
        ViewSnapshot {
            view: ViewBody { buckets },
        }
    }
}

/// Builds a view with `num_buckets` buckets, each owning
/// `partitions_per_bucket` partition points, interleaved uniformly around
/// the ring so that a uniform hash distribution sees roughly even load.
///
/// With `N` buckets each owning `P` partitions, the ring gets `N*P` points
/// spaced by `delta = 1 / (N*P)`; bucket `i` owns points at positions
/// `i*delta + j*N*delta` for `j` in `[0, P)`.
///
/// # Errors
/// [`CoreError::InvalidArgument`] if either argument is zero.
pub fn make_balanced_view(num_buckets: usize, partitions_per_bucket: usize) -> CoreResult<View> {
    if num_buckets == 0 || partitions_per_bucket == 0 {
        return Err(CoreError::InvalidArgument(
            "num_buckets and partitions_per_bucket must both be non-zero".to_string(),
        ));
    }

    let view = View::new();
    let delta = 1.0 / (num_buckets * partitions_per_bucket) as f64;

    // Interleaved so that bucket `num_buckets-1` picks up the point nearest
    // to each `x` increment first; this ordering (rather than a plain `i`
    // walk) is what makes `bucket-(N-1)` own the point nearest 1.0, matching
    // the worked example of a balanced 2-bucket/3-partition view.
    let mut hash_points = vec![Vec::with_capacity(partitions_per_bucket); num_buckets];
    let mut x = delta;
    for j in 0..partitions_per_bucket {
        for i in 0..num_buckets {
            hash_points[num_buckets - 1 - i].push((j, x));
            x += delta;
        }
    }

    for (i, points) in hash_points.into_iter().enumerate() {
        let mut points: Vec<(usize, f64)> = points;
        points.sort_by_key(|(j, _)| *j);
        let points: Vec<f64> = points.into_iter().map(|(_, p)| p).collect();
        let bucket = Arc::new(RwLock::new(Bucket::new(format!("bucket-{i}"), points)));
        view.add(bucket);
    }

    Ok(view)
}
