//! Launcher: loads the picker into a target frame and registers its session.
//!
//! Ordering matters. The session is registered (its handshake listener is
//! live) before anything is awaited, so the frame cannot signal readiness
//! before the host can hear it.

use std::sync::Arc;

use picker_core::{generate_channel_id, LaunchConfig, LaunchForm, PickerError, PickerResult, Url};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::dispatcher::{Dispatcher, DispatcherSettings};
use crate::events::{EventBridge, PickerEvent, DEFAULT_EVENT_CAPACITY};
use crate::handshake::SessionState;
use crate::registry::{SessionKey, SessionRegistry};
use crate::tokens::TokenProvider;
use crate::window::{TargetFrame, WindowId};

/// Host-wide tunables applied to every launched session.
#[derive(Debug, Clone)]
pub struct HostSettings {
    /// Broadcast capacity of each session's event bridge.
    pub event_capacity: usize,
    pub dispatcher: DispatcherSettings,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            dispatcher: DispatcherSettings::default(),
        }
    }
}

pub struct Launcher {
    registry: Arc<SessionRegistry>,
    tokens: Arc<dyn TokenProvider>,
    settings: HostSettings,
}

impl Launcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        tokens: Arc<dyn TokenProvider>,
        settings: HostSettings,
    ) -> Self {
        Self {
            registry,
            tokens,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Load the picker described by `config` into `frame`.
    ///
    /// Token and submission failures are returned to the caller after the
    /// half-launched session has been withdrawn from the registry.
    pub async fn launch(
        &self,
        frame: &dyn TargetFrame,
        mut config: LaunchConfig,
    ) -> PickerResult<SessionHandle> {
        let channel_id = match config.options().messaging.channel_id.clone() {
            Some(id) if !id.is_empty() => id,
            _ => {
                let id = generate_channel_id();
                config.options_mut().messaging.channel_id = Some(id.clone());
                id
            }
        };
        let address = config.picker_address()?;
        let key = SessionKey::new(frame.window(), channel_id.clone());

        let events = EventBridge::new(self.settings.event_capacity);
        let dispatcher = Dispatcher::new(
            channel_id.clone(),
            self.tokens.clone(),
            events.clone(),
            self.settings.dispatcher.clone(),
        );
        self.registry.register(key.clone(), dispatcher).await?;

        match self.load(frame, &config, address, &key).await {
            Ok(()) => {
                info!(session = %key, base_url = %config.base_url(), "picker launched");
                Ok(SessionHandle {
                    key,
                    registry: self.registry.clone(),
                    events,
                })
            }
            Err(e) => {
                warn!(session = %key, error = %e, "picker launch failed");
                self.registry.unregister(&key).await;
                Err(e)
            }
        }
    }

    async fn load(
        &self,
        frame: &dyn TargetFrame,
        config: &LaunchConfig,
        address: Url,
        key: &SessionKey,
    ) -> PickerResult<()> {
        let resource = config.base_url();
        let request = self.tokens.get_token(resource);
        let token = tokio::time::timeout(self.settings.dispatcher.token_timeout, request)
            .await
            .map_err(|_| PickerError::Timeout)??;
        if token.is_none() {
            warn!(resource, "no launch token available, submitting without credentials");
        }

        let form = LaunchForm::new(address, token.as_ref());
        debug!(session = %key, action = %form.action, "submitting launch form");

        self.registry.arm(key).await?;
        frame.submit_form(form).await
    }
}

/// The host's view of one launched picker.
///
/// Dropping the handle does not end the session. It ends when the frame
/// drops its port or on [`SessionHandle::close`].
#[derive(Clone)]
pub struct SessionHandle {
    key: SessionKey,
    registry: Arc<SessionRegistry>,
    events: EventBridge,
}

impl SessionHandle {
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn channel_id(&self) -> &str {
        &self.key.channel_id
    }

    pub fn window(&self) -> WindowId {
        self.key.window
    }

    /// Receive this session's notification and change events.
    pub fn subscribe(&self) -> broadcast::Receiver<PickerEvent> {
        self.events.subscribe()
    }

    /// Current handshake state; `None` once closed.
    pub async fn state(&self) -> Option<SessionState> {
        self.registry.state(&self.key).await
    }

    /// Tear the session down and stop its dispatcher.
    pub async fn close(&self) -> bool {
        self.registry.unregister(&self.key).await
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").field("key", &self.key).finish()
    }
}
