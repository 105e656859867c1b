//! Session registry.
//!
//! The host page has a single raw-window listener; it hands every message to
//! [`SessionRegistry::route`], which demultiplexes by source window and
//! channel id. Once a session's port is captured, that port belongs to the
//! session's dispatcher task and nothing else can read or write it. When the
//! frame drops its end of the port the task ends and removes its own entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use picker_core::codec::decode_handshake;
use picker_core::messages::HandshakeMessage;
use picker_core::{PickerError, PickerResult};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::dispatcher::Dispatcher;
use crate::handshake::{send_activate, HandshakeOutcome, IgnoreReason, SessionState};
use crate::window::{MessagePort, WindowId, WindowMessage};

type SessionMap = HashMap<SessionKey, SessionEntry>;

/// Identity of a session: the launched window plus its channel id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub window: WindowId,
    pub channel_id: String,
}

impl SessionKey {
    pub fn new(window: WindowId, channel_id: impl Into<String>) -> Self {
        Self {
            window,
            channel_id: channel_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.window, self.channel_id)
    }
}

struct SessionEntry {
    /// Distinguishes re-registrations of the same key.
    serial: u64,
    state: SessionState,
    /// Parked until the handshake hands it a port.
    dispatcher: Option<Dispatcher>,
    task: Option<JoinHandle<()>>,
    registered_at: Instant,
}

/// Information returned when listing sessions.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub key: SessionKey,
    pub state: SessionState,
    pub age_secs: u64,
}

/// All sessions known to one host page.
pub struct SessionRegistry {
    sessions: Arc<RwLock<SessionMap>>,
    next_serial: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_serial: AtomicU64::new(1),
        }
    }

    /// Register a session in `Idle`, parking its dispatcher until the handshake.
    pub async fn register(&self, key: SessionKey, dispatcher: Dispatcher) -> PickerResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&key) {
            return Err(PickerError::ChannelInUse(key.to_string()));
        }
        debug!(session = %key, "session registered");
        sessions.insert(
            key,
            SessionEntry {
                serial: self.next_serial.fetch_add(1, Ordering::Relaxed),
                state: SessionState::Idle,
                dispatcher: Some(dispatcher),
                task: None,
                registered_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Move a registered session from `Idle` to `AwaitingInit`.
    ///
    /// A session that already completed its handshake is left untouched.
    pub async fn arm(&self, key: &SessionKey) -> PickerResult<()> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(key)
            .ok_or_else(|| PickerError::SessionNotFound(key.to_string()))?;
        if entry.state == SessionState::Idle {
            entry.state = SessionState::AwaitingInit;
            trace!(session = %key, "awaiting initialize");
        }
        Ok(())
    }

    /// Offer a raw window message to the registered sessions.
    pub async fn route(&self, mut msg: WindowMessage) -> HandshakeOutcome {
        let channel_id = match decode_handshake(&msg.data) {
            Some(HandshakeMessage::Initialize { channel_id }) => channel_id,
            None => {
                trace!(source = %msg.source, "ignoring non-handshake window message");
                return HandshakeOutcome::Ignored(IgnoreReason::NotInitialize);
            }
        };
        let key = SessionKey::new(msg.source, channel_id);

        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(&key) else {
            trace!(session = %key, "initialize for unknown session");
            return HandshakeOutcome::Ignored(IgnoreReason::UnknownSession);
        };

        if !entry.state.accepts_initialize() {
            debug!(session = %key, "duplicate initialize ignored");
            return HandshakeOutcome::Ignored(IgnoreReason::AlreadyActive);
        }

        if msg.ports.is_empty() {
            warn!(session = %key, "initialize without a port");
            return HandshakeOutcome::Ignored(IgnoreReason::MissingPort);
        }
        let port = msg.ports.swap_remove(0);

        if let Err(e) = send_activate(&port) {
            warn!(session = %key, error = %e, "could not activate captured port");
            return HandshakeOutcome::Ignored(IgnoreReason::PortClosed);
        }

        entry.state = SessionState::Active;
        if let Some(dispatcher) = entry.dispatcher.take() {
            let sessions = Arc::downgrade(&self.sessions);
            entry.task = Some(tokio::spawn(run_session(
                dispatcher,
                port,
                sessions,
                key.clone(),
                entry.serial,
            )));
        }

        info!(session = %key, "picker channel active");
        HandshakeOutcome::Activated {
            channel_id: key.channel_id,
        }
    }

    /// Remove a session and stop its dispatcher. Returns whether it existed.
    pub async fn unregister(&self, key: &SessionKey) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.remove(key) {
            Some(entry) => {
                if let Some(task) = entry.task {
                    task.abort();
                }
                info!(session = %key, "session removed");
                true
            }
            None => false,
        }
    }

    pub async fn state(&self, key: &SessionKey) -> Option<SessionState> {
        self.sessions.read().await.get(key).map(|e| e.state)
    }

    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .map(|(key, e)| SessionInfo {
                key: key.clone(),
                state: e.state,
                age_secs: e.registered_at.elapsed().as_secs(),
            })
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Drive a session's dispatcher, then drop the session once its port is gone.
async fn run_session(
    dispatcher: Dispatcher,
    port: MessagePort,
    sessions: Weak<RwLock<SessionMap>>,
    key: SessionKey,
    serial: u64,
) {
    dispatcher.run(port).await;

    let Some(sessions) = sessions.upgrade() else {
        return;
    };
    let mut sessions = sessions.write().await;
    if sessions.get(&key).is_some_and(|e| e.serial == serial) {
        sessions.remove(&key);
        info!(session = %key, "frame channel closed, session removed");
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        // Only a finishing session task can hold the lock here, and it is
        // about to remove its own entry.
        let Ok(mut sessions) = self.sessions.try_write() else {
            return;
        };
        for entry in sessions.values_mut() {
            if let Some(task) = entry.task.take() {
                task.abort();
            }
        }
    }
}
