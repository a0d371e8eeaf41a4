//! Peer-connection signaling for media delivery.
//!
//! The gateway does not speak WebRTC itself. A [`PeerConnector`] supplied at
//! startup performs the negotiation; the hub tracks which clients have a peer
//! and buffers ICE candidates that arrive before the offer.

use crate::error::SignalingError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub sdp: String,
    #[serde(rename = "type", default = "default_offer_type")]
    pub sdp_type: String,
}

fn default_offer_type() -> String {
    "offer".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
}

/// Pluggable peer transport.
pub trait PeerConnector: Send + Sync {
    fn name(&self) -> &str;

    /// Accept a remote offer for `client_id` and return the local answer.
    fn answer<'a>(
        &'a self,
        client_id: &'a str,
        offer: SessionDescription,
    ) -> Pin<Box<dyn Future<Output = Result<SessionDescription, SignalingError>> + Send + 'a>>;

    fn add_ice_candidate<'a>(
        &'a self,
        client_id: &'a str,
        candidate: IceCandidate,
    ) -> Pin<Box<dyn Future<Output = Result<(), SignalingError>> + Send + 'a>>;

    /// Release the peer for `client_id`.
    fn close<'a>(&'a self, client_id: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

#[derive(Debug, Default)]
struct PeerState {
    negotiated: bool,
    pending: Vec<IceCandidate>,
}

/// Tracks per-client negotiation state in front of an optional connector.
pub struct SignalingHub {
    connector: Option<Arc<dyn PeerConnector>>,
    peers: Mutex<HashMap<String, PeerState>>,
}

impl SignalingHub {
    pub fn new(connector: Option<Arc<dyn PeerConnector>>) -> Self {
        Self {
            connector,
            peers: Mutex::new(HashMap::new()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_available(&self) -> bool {
        self.connector.is_some()
    }

    /// Clients with a completed negotiation.
    pub fn peer_count(&self) -> usize {
        self.lock().values().filter(|p| p.negotiated).count()
    }

    pub fn pending_candidates(&self, client_id: &str) -> usize {
        self.lock().get(client_id).map_or(0, |p| p.pending.len())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PeerState>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connector(&self) -> Result<&Arc<dyn PeerConnector>, SignalingError> {
        self.connector.as_ref().ok_or(SignalingError::Unavailable)
    }

    /// Negotiate a peer for `client_id`, then replay any buffered candidates.
    pub async fn offer(
        &self,
        client_id: &str,
        offer: SessionDescription,
    ) -> Result<SessionDescription, SignalingError> {
        let connector = self.connector()?;
        let answer = connector.answer(client_id, offer).await?;

        let pending = {
            let mut peers = self.lock();
            let state = peers.entry(client_id.to_string()).or_default();
            state.negotiated = true;
            std::mem::take(&mut state.pending)
        };

        for candidate in pending {
            if let Err(e) = connector.add_ice_candidate(client_id, candidate).await {
                tracing::warn!(client_id = %client_id, error = %e, "buffered ICE candidate rejected");
            }
        }

        tracing::info!(client_id = %client_id, connector = connector.name(), "peer negotiated");
        Ok(answer)
    }

    /// Forward a candidate, or hold it until the offer for this client lands.
    pub async fn add_ice_candidate(
        &self,
        client_id: &str,
        candidate: IceCandidate,
    ) -> Result<(), SignalingError> {
        let connector = self.connector()?;
        let candidate = {
            let mut peers = self.lock();
            let state = peers.entry(client_id.to_string()).or_default();
            if state.negotiated {
                Some(candidate)
            } else {
                state.pending.push(candidate);
                None
            }
        };

        match candidate {
            Some(candidate) => connector.add_ice_candidate(client_id, candidate).await,
            None => {
                tracing::debug!(client_id = %client_id, "ICE candidate buffered");
                Ok(())
            }
        }
    }

    /// Returns whether the client had any signaling state.
    pub async fn disconnect(&self, client_id: &str) -> Result<bool, SignalingError> {
        let connector = self.connector()?;
        let removed = self.lock().remove(client_id);
        match removed {
            Some(state) => {
                if state.negotiated {
                    connector.close(client_id).await;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Release every negotiated peer.
    pub async fn close_all(&self) {
        let drained: Vec<(String, PeerState)> = self.lock().drain().collect();
        let Some(connector) = self.connector.as_ref() else {
            return;
        };
        for (client_id, state) in drained {
            if state.negotiated {
                connector.close(&client_id).await;
            }
        }
    }
}

impl std::fmt::Debug for SignalingHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingHub")
            .field("connector", &self.connector.as_ref().map(|c| c.name()))
            .field("peers", &self.lock().len())
            .finish()
    }
}
