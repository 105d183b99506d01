//! Error types for the gossip membership and status API layer.

use ringkv_core::CoreError;
use thiserror::Error;

/// Errors surfaced by the gossip server, client, and failure detector.
///
/// [`CoreError`] variants from the ring/`KeyStore` layer are wrapped rather
/// than flattened: `InvalidArgument`/`EmptyView`/`EmptySet`/`OutOfRange`
/// bubble up to the caller unchanged, while the gossip-specific variants
/// below describe failures particular to talking to other servers over the
/// network.
#[derive(Debug, Error)]
pub enum GossipError {
    /// A request to a peer did not get a reply in time, or the connection
    /// could not be established at all. Callers treat this as "suspect the
    /// peer", not as a fatal error.
    #[error("transport failure talking to {peer}: {reason}")]
    TransportFailure { peer: String, reason: String },

    /// A reply was received but could not be decoded as a valid envelope.
    /// The peer that sent it is not marked suspect for this alone.
    #[error("failed to parse message from {peer}: {reason}")]
    ParseFailure { peer: String, reason: String },

    /// A well-formed envelope of a kind this server doesn't know how to
    /// handle (reserved for forward compatibility with future message
    /// kinds).
    #[error("unimplemented message kind: {0}")]
    Unimplemented(String),

    /// A placement/ring-level error from the core crate.
    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type GossipResult<T> = Result<T, GossipError>;
