//! Wires the gossip server, failure detector, and status API together into
//! one running node.

use std::sync::Arc;

use axum::Router;

use crate::config::GossipConfig;
use crate::detector::Detector;
use crate::gossip_server::GossipServer;
use crate::membership::Membership;
use crate::wire::Server;

/// A fully running gossip node: the SWIM wire server, the report/eviction
/// background threads, and a handle to build the status API router from
/// the same membership state.
pub struct GossipNode {
    membership: Arc<Membership>,
    server: Option<GossipServer>,
    detector: Option<Detector>,
}

impl GossipNode {
    /// Starts the gossip server and detector threads for `self_server`.
    ///
    /// # Errors
    /// Propagates the underlying `bind` I/O error if `config.port` can't
    /// be listened on.
    pub fn start(config: GossipConfig, self_server: Server) -> std::io::Result<Self> {
        let membership = Arc::new(Membership::new(self_server.clone()));
        let server = GossipServer::start(config.clone(), self_server.clone(), Arc::clone(&membership))?;
        let detector = Detector::start(config, self_server, Arc::clone(&membership));

        Ok(Self {
            membership,
            server: Some(server),
            detector: Some(detector),
        })
    }

    #[must_use]
    pub fn membership(&self) -> Arc<Membership> {
        Arc::clone(&self.membership)
    }

    /// Builds the status API router bound to this node's membership state.
    /// Callers are responsible for serving it (e.g. `axum::serve`).
    #[must_use]
    pub fn api_router(&self) -> Router {
        crate::api::router(Arc::clone(&self.membership))
    }

    #[must_use]
    pub fn gossip_addr(&self) -> Option<std::net::SocketAddr> {
        self.server.as_ref().map(GossipServer::local_addr)
    }

    /// Stops the gossip server and detector threads, waiting for both to
    /// finish.
    pub fn shutdown(mut self) {
        if let Some(server) = self.server.take() {
            server.shutdown();
        }
        if let Some(detector) = self.detector.take() {
            detector.shutdown();
        }
    }
}
