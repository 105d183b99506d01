//! Stateless request/reply client used by the report and eviction loops to
//! talk to peers.

use std::net::TcpStream;
use std::time::Duration;

use crate::error::{GossipError, GossipResult};
use crate::transport::{read_reply, write_envelope};
use crate::wire::{Envelope, Server};

/// Sends `envelope` to `peer` and waits for its `OK`/`FAIL` acknowledgement.
///
/// A new connection is opened per call: gossip traffic is low-volume and
/// bursty enough that pooling connections buys little, and a fresh
/// connection means a half-open or stale peer surfaces as a timeout rather
/// than a silently hung stream.
///
/// # Errors
/// [`GossipError::TransportFailure`] if the connection can't be
/// established or the socket errors before a reply arrives -- this is the
/// "suspect, don't panic" case in the spec's error taxonomy. Returns
/// whatever [`read_reply`] surfaces for a malformed acknowledgement.
pub fn send(peer: &Server, envelope: &Envelope, timeout: Duration) -> GossipResult<bool> {
    let addr = format!("{}:{}", peer.hostname, peer.port);
    let mut stream = TcpStream::connect(&addr).map_err(|e| GossipError::TransportFailure {
        peer: peer.to_string(),
        reason: e.to_string(),
    })?;
    stream
        .set_read_timeout(Some(timeout))
        .and_then(|()| stream.set_write_timeout(Some(timeout)))
        .map_err(|e| GossipError::TransportFailure {
            peer: peer.to_string(),
            reason: e.to_string(),
        })?;

    write_envelope(&mut stream, envelope, peer)?;
    read_reply(&mut stream, peer)
}

/// Like [`send`], but collapses every error into `false` ("suspect") rather
/// than propagating it -- the shape the report and detector loops actually
/// want, since a transport failure and an explicit `FAIL` acknowledgement
/// are handled identically by SWIM.
#[must_use]
pub fn send_or_suspect(peer: &Server, envelope: &Envelope, timeout: Duration) -> bool {
    match send(peer, envelope, timeout) {
        Ok(acked) => acked,
        Err(err) => {
            tracing::warn!(peer = %peer, error = %err, "gossip send failed, treating peer as suspect");
            false
        }
    }
}
