//! In-process stand-in for the embedded picker frame.
//!
//! Plays the frame's side of the protocol: accepts the launch form, reads the
//! channel id out of the submitted options, posts `initialize` with a fresh
//! port, and issues commands with its own reply timeout. Used by the
//! simulator and by tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use picker_core::codec::{decode_outbound, encode_inbound};
use picker_core::launch::OPTIONS_PARAM;
use picker_core::messages::{
    Command, CommandEnvelope, CorrelationId, InboundMessage, NotificationEnvelope, OutboundMessage,
};
use picker_core::{LaunchForm, PickerError, PickerOptions, PickerResult};
use serde_json::{json, Map};
use tracing::debug;

use crate::handshake::HandshakeOutcome;
use crate::registry::SessionRegistry;
use crate::window::{MessagePort, TargetFrame, WindowId, WindowMessage};

/// How long the frame waits for an acknowledgement or a reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Replies the frame received for one command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandExchange {
    pub id: CorrelationId,
    pub acknowledge: OutboundMessage,
    pub reply: OutboundMessage,
}

pub struct EmbeddedFrame {
    window: WindowId,
    forms: Mutex<Vec<LaunchForm>>,
    fail_submissions: bool,
    port: Option<MessagePort>,
    next_id: u64,
    reply_timeout: Duration,
}

impl EmbeddedFrame {
    pub fn new() -> Self {
        Self {
            window: WindowId::fresh(),
            forms: Mutex::new(Vec::new()),
            fail_submissions: false,
            port: None,
            next_id: 1,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Reject every form submission with a transport error.
    pub fn fail_submissions(mut self) -> Self {
        self.fail_submissions = true;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// The most recently submitted launch form.
    pub fn submitted_form(&self) -> Option<LaunchForm> {
        self.forms.lock().ok()?.last().cloned()
    }

    /// Options the picker page would read from the launch address.
    pub fn launch_options(&self) -> Option<PickerOptions> {
        let form = self.submitted_form()?;
        let (_, raw) = form.action.query_pairs().find(|(k, _)| k == OPTIONS_PARAM)?;
        serde_json::from_str(&raw).ok()
    }

    pub fn launch_channel_id(&self) -> Option<String> {
        self.launch_options()?.messaging.channel_id
    }

    /// Open a channel and post `initialize` to the host page.
    ///
    /// On activation, waits for the host's `activate` on the new port.
    pub async fn initialize(&mut self, host: &SessionRegistry) -> PickerResult<HandshakeOutcome> {
        let channel_id = self
            .launch_channel_id()
            .ok_or_else(|| PickerError::InvalidMessage("no launch form with a channel id".into()))?;

        let (host_end, frame_end) = MessagePort::pair();
        let msg = WindowMessage::new(
            self.window,
            json!({"type": "initialize", "channelId": channel_id}),
        )
        .with_port(host_end);
        self.port = Some(frame_end);

        let outcome = host.route(msg).await;
        if let HandshakeOutcome::Activated { .. } = outcome {
            match self.recv().await? {
                OutboundMessage::Activate => debug!(window = %self.window, "frame activated"),
                other => {
                    return Err(PickerError::InvalidMessage(format!(
                        "expected activate, got {other:?}"
                    )))
                }
            }
        }
        Ok(outcome)
    }

    /// Post a notification to the host.
    pub fn notify(&self, tag: &str) -> PickerResult<()> {
        let msg = InboundMessage::Notification(NotificationEnvelope {
            notification: tag.to_string().into(),
            data: Map::new(),
        });
        self.port()?.post(encode_inbound(&msg)?)
    }

    /// Post a command and wait for its acknowledgement and reply.
    pub async fn send_command(&mut self, command: Command) -> PickerResult<CommandExchange> {
        let id = self.next_id.to_string();
        self.next_id += 1;

        let msg = InboundMessage::Command(CommandEnvelope::new(id.clone(), command));
        self.port()?.post(encode_inbound(&msg)?)?;

        let acknowledge = self.recv_for(&id).await?;
        if acknowledge != OutboundMessage::acknowledge(&id) {
            return Err(PickerError::InvalidMessage(format!(
                "expected acknowledge for {id}, got {acknowledge:?}"
            )));
        }
        let reply = self.recv_for(&id).await?;
        if !reply.is_terminal() {
            return Err(PickerError::InvalidMessage(format!(
                "expected result for {id}, got {reply:?}"
            )));
        }
        Ok(CommandExchange {
            id,
            acknowledge,
            reply,
        })
    }

    /// Next host message without waiting.
    pub fn try_recv(&mut self) -> Option<OutboundMessage> {
        let raw = self.port.as_mut()?.try_recv()?;
        decode_outbound(raw).ok()
    }

    fn port(&self) -> PickerResult<&MessagePort> {
        self.port
            .as_ref()
            .ok_or_else(|| PickerError::Channel("frame has no channel yet".into()))
    }

    async fn recv(&mut self) -> PickerResult<OutboundMessage> {
        let timeout = self.reply_timeout;
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| PickerError::Channel("frame has no channel yet".into()))?;
        let raw = tokio::time::timeout(timeout, port.recv())
            .await
            .map_err(|_| PickerError::Timeout)?
            .ok_or_else(|| PickerError::Channel("host closed the channel".into()))?;
        decode_outbound(raw)
    }

    async fn recv_for(&mut self, id: &str) -> PickerResult<OutboundMessage> {
        let msg = self.recv().await?;
        match msg.correlation_id() {
            Some(got) if got == id => Ok(msg),
            other => Err(PickerError::InvalidMessage(format!(
                "reply for {other:?} while waiting on {id}"
            ))),
        }
    }
}

impl Default for EmbeddedFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetFrame for EmbeddedFrame {
    fn window(&self) -> WindowId {
        self.window
    }

    fn submit_form<'a>(
        &'a self,
        form: LaunchForm,
    ) -> Pin<Box<dyn Future<Output = PickerResult<()>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail_submissions {
                return Err(PickerError::Transport("navigation blocked".into()));
            }
            debug!(window = %self.window, action = %form.action, "frame navigated");
            self.forms
                .lock()
                .map_err(|_| PickerError::Other("form log poisoned".into()))?
                .push(form);
            Ok(())
        })
    }
}
