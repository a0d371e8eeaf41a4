//! Connected sessions and their transport state.
//!
//! Every session owns a bounded outbound control queue drained by its socket
//! task. Sends never wait: a closed queue means the peer is gone and the
//! session is dropped, a full queue drops that one message.

use crate::error::TransportError;
use crate::transport::gateway::events::ServerMessage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Negotiated through `/offer` with an injected peer connector.
    Peer,
    /// Binary frames over `/ws/frames`.
    FrameSocket,
}

/// Media attachment of a session. Cancelling the token stops its stream.
#[derive(Debug, Clone)]
pub struct MediaChannel {
    pub client_id: String,
    pub kind: MediaKind,
    pub cancel: CancellationToken,
}

impl MediaChannel {
    pub fn new(client_id: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            client_id: client_id.into(),
            kind,
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    id: String,
    control: mpsc::Sender<ServerMessage>,
    connected_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    media: Option<MediaChannel>,
}

impl Session {
    pub fn new(id: impl Into<String>, control: mpsc::Sender<ServerMessage>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            control,
            connected_at: now,
            last_activity: now,
            media: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Receiving half handed to the socket task of a newly opened session.
#[derive(Debug)]
pub struct SessionChannel {
    pub id: String,
    pub receiver: mpsc::Receiver<ServerMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub media: Option<MediaKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Sessions whose queue was full; they stay registered.
    pub dropped: usize,
    /// Sessions found disconnected and removed.
    pub evicted: Vec<String>,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    max_sessions: usize,
    queue_capacity: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize, queue_capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Create and register a session with a fresh id and queue.
    pub fn open(&self) -> Result<SessionChannel, TransportError> {
        let id = uuid::Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        self.register(Session::new(id.clone(), sender))?;
        Ok(SessionChannel { id, receiver })
    }

    pub fn register(&self, session: Session) -> Result<(), TransportError> {
        let mut sessions = self.write();
        if !sessions.contains_key(&session.id) && sessions.len() >= self.max_sessions {
            return Err(TransportError::SessionLimit(self.max_sessions));
        }
        tracing::info!(session_id = %session.id, active = sessions.len() + 1, "session registered");
        if let Some(previous) = sessions.insert(session.id.clone(), session) {
            cancel_media(&previous);
        }
        Ok(())
    }

    /// Remove a session and stop its media stream. Returns whether it existed.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.write().remove(id);
        match removed {
            Some(session) => {
                cancel_media(&session);
                tracing::info!(session_id = %id, "session unregistered");
                true
            }
            None => false,
        }
    }

    pub fn send_to(&self, id: &str, message: ServerMessage) -> Result<(), TransportError> {
        let result = {
            let sessions = self.read();
            let session = sessions
                .get(id)
                .ok_or_else(|| TransportError::UnknownSession(id.to_string()))?;
            session.control.try_send(message)
        };
        match result {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                tracing::warn!(session_id = %id, kind = message.kind(), "session queue full; message dropped");
                Err(TransportError::Full(id.to_string()))
            }
            Err(TrySendError::Closed(_)) => {
                self.unregister(id);
                Err(TransportError::Closed(id.to_string()))
            }
        }
    }

    /// Deliver to every session. Individual failures never fail the call.
    pub fn broadcast(&self, message: &ServerMessage) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        {
            let sessions = self.read();
            for (id, session) in sessions.iter() {
                match session.control.try_send(message.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(session_id = %id, kind = message.kind(), "session queue full; broadcast dropped");
                        report.dropped += 1;
                    }
                    Err(TrySendError::Closed(_)) => report.evicted.push(id.clone()),
                }
            }
        }
        for id in &report.evicted {
            self.unregister(id);
        }
        report
    }

    pub fn list_active(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .read()
            .values()
            .map(|session| SessionInfo {
                id: session.id.clone(),
                connected_at: session.connected_at,
                last_activity: session.last_activity,
                media: session.media.as_ref().map(|media| media.kind),
            })
            .collect();
        sessions.sort_by(|a, b| a.connected_at.cmp(&b.connected_at).then(a.id.cmp(&b.id)));
        sessions
    }

    pub fn touch(&self, id: &str) -> bool {
        match self.write().get_mut(id) {
            Some(session) => {
                session.last_activity = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Attach a media channel, replacing and cancelling any previous one.
    pub fn attach_media(&self, id: &str, media: MediaChannel) -> Result<(), TransportError> {
        let mut sessions = self.write();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| TransportError::UnknownSession(id.to_string()))?;
        if let Some(previous) = session.media.replace(media) {
            previous.cancel.cancel();
        }
        Ok(())
    }

    pub fn detach_media(&self, id: &str) -> bool {
        let previous = self
            .write()
            .get_mut(id)
            .and_then(|session| session.media.take());
        match previous {
            Some(media) => {
                media.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop every session. Their socket tasks observe the closed queue and exit.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Session> = self.write().drain().map(|(_, session)| session).collect();
        for session in &drained {
            cancel_media(session);
        }
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "closed all sessions");
        }
        drained.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("active", &self.len())
            .field("max_sessions", &self.max_sessions)
            .finish_non_exhaustive()
    }
}

fn cancel_media(session: &Session) {
    if let Some(media) = &session.media {
        media.cancel.cancel();
    }
}
