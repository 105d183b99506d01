//! Background failure-detection loops: periodic gossip, direct+indirect
//! probing, and grace-period eviction.
//!
//! Two plain OS threads, each looping on a fixed interval -- no async
//! runtime, matching the rest of the gossip core. Both threads hold no
//! lock while they're on the network; they snapshot [`Membership`] state,
//! release it, then make blocking calls via [`crate::gossip_client`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::seq::SliceRandom;

use crate::config::GossipConfig;
use crate::gossip_client::send_or_suspect;
use crate::membership::{now_unix_secs, Membership};
use crate::wire::{Envelope, Report, Server};

/// Owns the report and eviction loop threads; dropping or calling
/// [`Detector::shutdown`] stops both.
pub struct Detector {
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Detector {
    /// Starts the report loop (periodic gossip + failure probing) and the
    /// eviction loop (grace-period cleanup) as background threads.
    pub fn start(config: GossipConfig, self_server: Server, membership: Arc<Membership>) -> Self {
        let running = Arc::new(AtomicBool::new(true));

        let report_handle = {
            let running = Arc::clone(&running);
            let membership = Arc::clone(&membership);
            let config = config.clone();
            let self_server = self_server.clone();
            thread::spawn(move || report_loop(running, membership, config, self_server))
        };

        let eviction_handle = {
            let running = Arc::clone(&running);
            thread::spawn(move || eviction_loop(running, membership, config))
        };

        Self {
            running,
            handles: vec![report_handle, eviction_handle],
        }
    }

    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn report_loop(running: Arc<AtomicBool>, membership: Arc<Membership>, config: GossipConfig, self_server: Server) {
    let mut rng = rand::rng();
    while running.load(Ordering::SeqCst) {
        thread::sleep(config.update_round_interval);
        if !running.load(Ordering::SeqCst) {
            return;
        }
        run_round(&membership, &config, &self_server, &mut rng);
    }
}

/// One report round: pick up to `num_reports` random peers, ping each
/// directly, probe through `num_forwards` other peers on a direct-ping
/// timeout, and gossip a full report to whichever peers answered.
fn run_round(membership: &Membership, config: &GossipConfig, self_server: &Server, rng: &mut impl rand::Rng) {
    let mut peers = membership.peers();
    peers.shuffle(rng);
    let targets: Vec<Server> = peers.into_iter().take(config.num_reports).collect();

    for target in targets {
        probe(&target, membership, config, self_server, rng);
    }

    gossip_report(membership, config, self_server, rng);
}

/// Pings `target` directly; on timeout, asks up to `num_forwards` other
/// alive peers to probe it indirectly before declaring it suspect.
fn probe(target: &Server, membership: &Membership, config: &GossipConfig, self_server: &Server, rng: &mut impl rand::Rng) {
    let ping = Envelope::StatusUpdate {
        sender: self_server.clone(),
    };
    let now = now_unix_secs();

    if send_or_suspect(target, &ping, config.ping_timeout) {
        membership.mark_alive(target, now);
        return;
    }

    let mut forwarders: Vec<Server> = membership
        .peers()
        .into_iter()
        .filter(|s| s.key() != target.key())
        .collect();
    forwarders.shuffle(rng);

    let request = Envelope::StatusRequest {
        sender: self_server.clone(),
        destination: target.clone(),
    };
    let confirmed_alive = forwarders
        .into_iter()
        .take(config.num_forwards)
        .any(|forwarder| send_or_suspect(&forwarder, &request, config.ping_timeout));

    if confirmed_alive {
        membership.mark_alive(target, now);
    } else {
        tracing::info!(peer = %target, "no forwarder could reach peer, marking suspect");
        membership.mark_suspected(target, now, None);
    }
}

/// Gossips this node's current view to up to `num_reports` random peers.
fn gossip_report(membership: &Membership, config: &GossipConfig, self_server: &Server, rng: &mut impl rand::Rng) {
    let mut peers = membership.peers();
    peers.shuffle(rng);

    let report = Report {
        sender: self_server.clone(),
        alive: membership.alive_records(),
        suspected: membership.suspected_records(),
    };
    let envelope = Envelope::StatusReport {
        sender: self_server.clone(),
        report,
    };

    for peer in peers.into_iter().take(config.num_reports) {
        send_or_suspect(&peer, &envelope, config.ping_timeout);
    }
}

fn eviction_loop(running: Arc<AtomicBool>, membership: Arc<Membership>, config: GossipConfig) {
    while running.load(Ordering::SeqCst) {
        thread::sleep(config.update_round_interval);
        if !running.load(Ordering::SeqCst) {
            return;
        }
        let now = now_unix_secs();
        for key in membership.expired(config.grace_period.as_secs(), now) {
            tracing::info!(peer = %key, "grace period elapsed, evicting");
            membership.evict(&key);
        }
    }
}
