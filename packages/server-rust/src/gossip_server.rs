//! Accepts incoming gossip connections and dispatches them to a fixed pool
//! of worker threads.
//!
//! Matches the spec's "parallel OS threads, no cooperative scheduler"
//! model: one accept thread feeds accepted [`TcpStream`]s into a
//! [`ThreadsafeQueue`], and a pool of worker threads pull from it and run
//! [`handle_connection`]. Workers poll rather than block on empty, trading
//! a little idle CPU for a queue that can be drained and dropped cleanly
//! on shutdown.

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ringkv_core::ThreadsafeQueue;

use crate::config::GossipConfig;
use crate::membership::{now_unix_secs, Membership};
use crate::transport::{read_envelope, write_reply_fail, write_reply_ok};
use crate::wire::{Envelope, Server};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A running gossip server: an accept thread plus a worker pool.
pub struct GossipServer {
    running: Arc<AtomicBool>,
    accept_handle: Option<JoinHandle<()>>,
    worker_handles: Vec<JoinHandle<()>>,
    local_addr: std::net::SocketAddr,
}

impl GossipServer {
    /// Binds a listener on `config.port` and starts the accept thread and
    /// worker pool. `self_server` is this node's own identity, used to
    /// reply to probes sent our way.
    ///
    /// # Errors
    /// Propagates the `bind` I/O error if the port is unavailable.
    pub fn start(
        config: GossipConfig,
        self_server: Server,
        membership: Arc<Membership>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", config.port))?;
        let local_addr = listener.local_addr()?;

        let queue: Arc<ThreadsafeQueue<TcpStream>> = Arc::new(ThreadsafeQueue::new());
        let running = Arc::new(AtomicBool::new(true));

        let accept_handle = {
            let queue = Arc::clone(&queue);
            let running = Arc::clone(&running);
            listener.set_nonblocking(true)?;
            thread::spawn(move || accept_loop(listener, queue, running))
        };

        let worker_handles = (0..config.worker_threads.max(1))
            .map(|_| {
                let queue = Arc::clone(&queue);
                let running = Arc::clone(&running);
                let membership = Arc::clone(&membership);
                let config = config.clone();
                let self_server = self_server.clone();
                thread::spawn(move || worker_loop(queue, running, membership, config, self_server))
            })
            .collect();

        Ok(Self {
            running,
            accept_handle: Some(accept_handle),
            worker_handles,
            local_addr,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Stops the accept thread and waits for every queued connection to be
    /// handled before returning.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.accept_handle.take() {
            let _ = handle.join();
        }
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn accept_loop(listener: TcpListener, queue: Arc<ThreadsafeQueue<TcpStream>>, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _addr)) => queue.push(stream),
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                tracing::warn!(error = %e, "gossip accept failed");
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn worker_loop(
    queue: Arc<ThreadsafeQueue<TcpStream>>,
    running: Arc<AtomicBool>,
    membership: Arc<Membership>,
    config: GossipConfig,
    self_server: Server,
) {
    loop {
        match queue.try_pop() {
            Some(stream) => handle_connection(stream, &membership, &config, &self_server),
            None => {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// Handles one gossip connection end to end: decode the envelope, dispatch
/// it, write the `OK`/`FAIL` acknowledgement.
fn handle_connection(
    mut stream: TcpStream,
    membership: &Membership,
    config: &GossipConfig,
    self_server: &Server,
) {
    let placeholder = Server::new("incoming", 0);
    let envelope = match read_envelope(&mut stream, &placeholder) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::warn!(error = %err, "failed to decode incoming gossip envelope");
            let _ = write_reply_fail(&mut stream, &placeholder);
            return;
        }
    };

    let ok = dispatch(&envelope, membership, config, self_server);
    let reply_result = if ok {
        write_reply_ok(&mut stream, envelope.sender())
    } else {
        write_reply_fail(&mut stream, envelope.sender())
    };
    if let Err(err) = reply_result {
        tracing::warn!(peer = %envelope.sender(), error = %err, "failed to send gossip reply");
    }
}

/// Applies one decoded envelope to membership state, returning whether the
/// operation should be acknowledged `OK`.
fn dispatch(
    envelope: &Envelope,
    membership: &Membership,
    config: &GossipConfig,
    self_server: &Server,
) -> bool {
    match envelope {
        Envelope::StatusUpdate { sender } => {
            membership.mark_alive(sender, now_unix_secs());
            true
        }
        Envelope::StatusReport { sender, report } => {
            membership.mark_alive(sender, now_unix_secs());
            membership.merge_report(&report.alive, &report.suspected);
            true
        }
        Envelope::StatusRequest { sender: _, destination } => {
            let ping = Envelope::StatusUpdate {
                sender: self_server.clone(),
            };
            let acked = crate::gossip_client::send_or_suspect(destination, &ping, config.ping_timeout);
            let now = now_unix_secs();
            if acked {
                membership.mark_alive(destination, now);
            } else {
                membership.mark_suspected(destination, now, Some(self_server.clone()));
            }
            acked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gossip_client::send;
    use crate::wire::Report;
    use std::time::Duration as StdDuration;

    fn config_on(port: u16) -> GossipConfig {
        GossipConfig {
            worker_threads: 2,
            ping_timeout: StdDuration::from_millis(100),
            ..GossipConfig::with_port(port)
        }
    }

    #[test]
    fn status_update_marks_sender_alive_and_acks() {
        let self_server = Server::new("127.0.0.1", 0);
        let membership = Arc::new(Membership::new(self_server.clone()));
        let server = GossipServer::start(config_on(0), self_server, Arc::clone(&membership)).unwrap();

        let peer = Server::new("127.0.0.1", server.local_addr().port());
        let sender = Server::new("sender-host", 1234);
        let ok = send(
            &peer,
            &Envelope::StatusUpdate { sender: sender.clone() },
            StdDuration::from_secs(1),
        )
        .unwrap();

        assert!(ok);
        assert!(membership.is_alive(&sender.key()));
        server.shutdown();
    }

    #[test]
    fn status_report_merges_into_membership() {
        let self_server = Server::new("127.0.0.1", 0);
        let membership = Arc::new(Membership::new(self_server.clone()));
        let server = GossipServer::start(config_on(0), self_server, Arc::clone(&membership)).unwrap();

        let peer = Server::new("127.0.0.1", server.local_addr().port());
        let sender = Server::new("sender-host", 1234);
        let gossiped_about = Server::new("third-party", 4321);
        let report = Report {
            sender: sender.clone(),
            alive: vec![crate::wire::Record::new(gossiped_about.clone(), now_unix_secs())],
            suspected: vec![],
        };
        let ok = send(
            &peer,
            &Envelope::StatusReport { sender: sender.clone(), report },
            StdDuration::from_secs(1),
        )
        .unwrap();

        assert!(ok);
        assert!(membership.is_alive(&sender.key()));
        assert!(membership.is_alive(&gossiped_about.key()));
        server.shutdown();
    }

    #[test]
    fn status_request_forwards_ping_and_reports_failure_for_unreachable_target() {
        let self_server = Server::new("127.0.0.1", 0);
        let membership = Arc::new(Membership::new(self_server.clone()));
        let server = GossipServer::start(config_on(0), self_server, Arc::clone(&membership)).unwrap();

        let peer = Server::new("127.0.0.1", server.local_addr().port());
        // Nothing listens on this port, so the forwarded ping fails.
        let unreachable = Server::new("127.0.0.1", 1);
        let ok = send(
            &peer,
            &Envelope::StatusRequest {
                sender: Server::new("requester", 9000),
                destination: unreachable.clone(),
            },
            StdDuration::from_secs(1),
        )
        .unwrap();

        assert!(!ok);
        assert!(membership.is_suspected(&unreachable.key()));
        server.shutdown();
    }

    #[test]
    fn malformed_bytes_get_a_fail_reply() {
        use std::io::Write;
        let self_server = Server::new("127.0.0.1", 0);
        let membership = Arc::new(Membership::new(self_server.clone()));
        let server = GossipServer::start(config_on(0), self_server, membership).unwrap();

        let mut stream = TcpStream::connect(("127.0.0.1", server.local_addr().port())).unwrap();
        stream.write_all(&[0, 0, 0, 3]).unwrap();
        stream.write_all(b"bad").unwrap();
        stream
            .set_read_timeout(Some(StdDuration::from_secs(1)))
            .unwrap();

        let placeholder = Server::new("test", 0);
        let acked = crate::transport::read_reply(&mut stream, &placeholder).unwrap();
        assert!(!acked);
        server.shutdown();
    }
}
