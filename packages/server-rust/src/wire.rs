//! Wire types exchanged between gossip servers.
//!
//! `Envelope` is the single message type that goes over the wire, tagged by
//! `type` the same way `cluster::messages::ClusterMessage` tags its
//! variants, serialized with `rmp-serde` (MessagePack) rather than JSON
//! since these messages cross the wire far more often than the status API's
//! do.

use serde::{Deserialize, Serialize};

/// Identifies one server in the cluster.
///
/// Equality and hashing are `hostname`+`port` only -- `ip_addr` is
/// informational, the same identity convention [`Server::key`] uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub hostname: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ip_addr: Option<String>,
}

impl PartialEq for Server {
    fn eq(&self, other: &Self) -> bool {
        self.hostname == other.hostname && self.port == other.port
    }
}

impl Eq for Server {}

impl std::hash::Hash for Server {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hostname.hash(state);
        self.port.hash(state);
    }
}

impl Server {
    #[must_use]
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            ip_addr: None,
        }
    }

    /// Key used to index this server in membership maps: gossip identity is
    /// `hostname:port`, `ip_addr` is informational only.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

impl std::fmt::Display for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

/// One server's entry in a membership report: who it is, when this server
/// last heard from it, and whether it has actually gossiped back yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub server: Server,
    /// Unix seconds of the last contact (direct or via gossip).
    pub timestamp: u64,
    /// Whether `server` itself has been observed gossiping, as opposed to
    /// only being mentioned by a third party.
    pub did_gossip: bool,
    /// Set when this record was relayed on behalf of another server during
    /// indirect-ping forwarding.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub forwarder: Option<Server>,
}

impl Record {
    #[must_use]
    pub fn new(server: Server, timestamp: u64) -> Self {
        Self {
            server,
            timestamp,
            did_gossip: false,
            forwarder: None,
        }
    }
}

/// A server's current view of the cluster: who it believes is alive, and
/// who it suspects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub sender: Server,
    pub alive: Vec<Record>,
    pub suspected: Vec<Record>,
}

/// The single message type gossip servers exchange, tagged by `type` like
/// `ClusterMessage` tags its variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Envelope {
    /// Sent when a server wants to gossip its own up-to-date membership
    /// view to the recipient.
    StatusUpdate { sender: Server },
    /// A full membership report, either pushed unsolicited or in reply to
    /// a `StatusUpdate`.
    StatusReport { sender: Server, report: Report },
    /// Ask the recipient to ping `destination` on the sender's behalf
    /// (indirect probing after a direct ping timed out).
    StatusRequest { sender: Server, destination: Server },
}

impl Envelope {
    #[must_use]
    pub fn sender(&self) -> &Server {
        match self {
            Envelope::StatusUpdate { sender }
            | Envelope::StatusReport { sender, .. }
            | Envelope::StatusRequest { sender, .. } => sender,
        }
    }
}

/// 2-byte acknowledgement sent in reply to a successfully handled envelope.
pub const REPLY_OK: &[u8] = b"OK";
/// 4-byte acknowledgement sent when an envelope could not be handled
/// (parse failure, unimplemented kind, or an internal error).
pub const REPLY_FAIL: &[u8] = b"FAIL";

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(envelope: &Envelope) -> Envelope {
        let bytes = rmp_serde::to_vec_named(envelope).unwrap();
        rmp_serde::from_slice(&bytes).unwrap()
    }

    #[test]
    fn server_key_is_hostname_colon_port() {
        let s = Server::new("host-a", 7000);
        assert_eq!(s.key(), "host-a:7000");
    }

    #[test]
    fn status_update_round_trips() {
        let envelope = Envelope::StatusUpdate {
            sender: Server::new("host-a", 7000),
        };
        assert_eq!(round_trip(&envelope), envelope);
    }

    #[test]
    fn status_report_round_trips() {
        let sender = Server::new("host-a", 7000);
        let envelope = Envelope::StatusReport {
            sender: sender.clone(),
            report: Report {
                sender,
                alive: vec![Record::new(Server::new("host-b", 7001), 1_700_000_000)],
                suspected: vec![],
            },
        };
        assert_eq!(round_trip(&envelope), envelope);
    }

    #[test]
    fn status_request_round_trips() {
        let envelope = Envelope::StatusRequest {
            sender: Server::new("host-a", 7000),
            destination: Server::new("host-c", 7002),
        };
        assert_eq!(round_trip(&envelope), envelope);
    }

    #[test]
    fn sender_accessor_covers_every_variant() {
        let s = Server::new("host-a", 7000);
        assert_eq!(
            Envelope::StatusUpdate { sender: s.clone() }.sender(),
            &s
        );
        assert_eq!(
            Envelope::StatusRequest {
                sender: s.clone(),
                destination: Server::new("host-b", 7001)
            }
            .sender(),
            &s
        );
    }

    #[test]
    fn record_defaults_did_gossip_false_and_no_forwarder() {
        let r = Record::new(Server::new("host-a", 7000), 42);
        assert!(!r.did_gossip);
        assert!(r.forwarder.is_none());
    }
}
