//! Tunables for the gossip server, client, and failure detector.

use std::time::Duration;

/// Configuration for one gossip-protocol node.
///
/// Every field besides `port` has a documented default; `GossipConfig`
/// implements [`Default`] with those values so tests and small deployments
/// can override just the fields they care about.
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// Port this server listens for gossip traffic on. No sensible
    /// default, so it's the one field worth requiring explicitly at
    /// construction.
    pub port: u16,
    /// How often the report loop gossips this server's view of the
    /// cluster to a random peer.
    pub update_round_interval: Duration,
    /// How long a server stays `Suspected` before the eviction loop drops
    /// it from membership entirely.
    pub grace_period: Duration,
    /// How long to wait for a reply before treating a ping as failed.
    pub ping_timeout: Duration,
    /// Number of peers a single report round gossips to.
    pub num_reports: usize,
    /// Number of peers asked to ping on our behalf when a direct ping
    /// times out, before declaring the target suspect.
    pub num_forwards: usize,
    /// Number of ring partitions each `KeyStore` bucket owns.
    pub partitions_per_bucket: usize,
    /// Number of worker threads pulling connections off the gossip
    /// server's incoming queue.
    pub worker_threads: usize,
}

impl GossipConfig {
    /// Builds a config with every default except `port`.
    #[must_use]
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            port: 0,
            update_round_interval: Duration::from_secs(1),
            grace_period: Duration::from_secs(30),
            ping_timeout: Duration::from_millis(25),
            num_reports: 6,
            num_forwards: 3,
            partitions_per_bucket: 5,
            worker_threads: 4,
        }
    }
}
