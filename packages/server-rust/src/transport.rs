//! Length-prefixed `MessagePack` framing over a blocking `TcpStream`.
//!
//! Gossip runs on plain OS threads and blocking sockets (see
//! [`crate::gossip_server`]), not an async runtime -- the protocol is a
//! simple synchronous request/reply, and a dedicated thread per in-flight
//! connection is cheap enough at gossip's fan-out. Every envelope is
//! prefixed with its encoded length as a 4-byte big-endian `u32` so the
//! reader knows exactly how many bytes to pull off the stream; the 2/4-byte
//! `OK`/`FAIL` acknowledgements that follow are unframed, since their
//! length is fixed and known up front.

use std::io::{Read, Write};

use crate::error::{GossipError, GossipResult};
use crate::wire::{Envelope, Server, REPLY_FAIL, REPLY_OK};

fn peer_label(peer: &Server) -> String {
    peer.to_string()
}

/// Writes `envelope` to `stream` as a length-prefixed `MessagePack` frame.
pub fn write_envelope<W: Write>(stream: &mut W, envelope: &Envelope, peer: &Server) -> GossipResult<()> {
    let bytes = rmp_serde::to_vec_named(envelope).map_err(|e| GossipError::ParseFailure {
        peer: peer_label(peer),
        reason: e.to_string(),
    })?;
    let len = u32::try_from(bytes.len()).map_err(|_| GossipError::ParseFailure {
        peer: peer_label(peer),
        reason: "envelope too large to frame".to_string(),
    })?;
    stream
        .write_all(&len.to_be_bytes())
        .and_then(|()| stream.write_all(&bytes))
        .map_err(|e| GossipError::TransportFailure {
            peer: peer_label(peer),
            reason: e.to_string(),
        })
}

/// Reads one length-prefixed `MessagePack` frame from `stream`.
pub fn read_envelope<R: Read>(stream: &mut R, peer: &Server) -> GossipResult<Envelope> {
    let mut len_bytes = [0u8; 4];
    stream
        .read_exact(&mut len_bytes)
        .map_err(|e| GossipError::TransportFailure {
            peer: peer_label(peer),
            reason: e.to_string(),
        })?;
    let len = u32::from_be_bytes(len_bytes) as usize;

    let mut buf = vec![0u8; len];
    stream
        .read_exact(&mut buf)
        .map_err(|e| GossipError::TransportFailure {
            peer: peer_label(peer),
            reason: e.to_string(),
        })?;

    rmp_serde::from_slice(&buf).map_err(|e| GossipError::ParseFailure {
        peer: peer_label(peer),
        reason: e.to_string(),
    })
}

/// Writes the 2-byte `OK` acknowledgement.
pub fn write_reply_ok<W: Write>(stream: &mut W, peer: &Server) -> GossipResult<()> {
    stream
        .write_all(REPLY_OK)
        .map_err(|e| GossipError::TransportFailure {
            peer: peer_label(peer),
            reason: e.to_string(),
        })
}

/// Writes the 4-byte `FAIL` acknowledgement.
pub fn write_reply_fail<W: Write>(stream: &mut W, peer: &Server) -> GossipResult<()> {
    stream
        .write_all(REPLY_FAIL)
        .map_err(|e| GossipError::TransportFailure {
            peer: peer_label(peer),
            reason: e.to_string(),
        })
}

/// Reads a 2-byte `OK` or 4-byte `FAIL` acknowledgement, returning `true`
/// for `OK`.
pub fn read_reply<R: Read>(stream: &mut R, peer: &Server) -> GossipResult<bool> {
    let mut head = [0u8; 2];
    stream
        .read_exact(&mut head)
        .map_err(|e| GossipError::TransportFailure {
            peer: peer_label(peer),
            reason: e.to_string(),
        })?;

    if &head == REPLY_OK {
        return Ok(true);
    }

    let mut tail = [0u8; 2];
    stream
        .read_exact(&mut tail)
        .map_err(|e| GossipError::TransportFailure {
            peer: peer_label(peer),
            reason: e.to_string(),
        })?;

    let mut full = Vec::with_capacity(4);
    full.extend_from_slice(&head);
    full.extend_from_slice(&tail);
    if full == REPLY_FAIL {
        Ok(false)
    } else {
        Err(GossipError::ParseFailure {
            peer: peer_label(peer),
            reason: format!("unrecognized acknowledgement: {full:?}"),
        })
    }
}
