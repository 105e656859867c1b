//! Channel handshake.
//!
//! `Idle → AwaitingInit → Active`. A session is registered `Idle` before its
//! launch token is fetched and armed (`AwaitingInit`) just before the launch
//! form is submitted. While in either state, the only window message that
//! advances it is an `initialize` from the launched window carrying the
//! session's channel id and at least one port. Everything else is noise from
//! unrelated cross-window traffic and is dropped without error.

use picker_core::codec::encode_outbound;
use picker_core::messages::OutboundMessage;
use picker_core::PickerResult;

use crate::window::MessagePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered; launch in progress.
    Idle,
    /// Launch form submitted; waiting for the frame's `initialize`.
    AwaitingInit,
    /// Port captured; all traffic goes through the dispatcher.
    Active,
}

impl SessionState {
    /// Whether an `initialize` may still complete the handshake.
    pub fn accepts_initialize(&self) -> bool {
        matches!(self, SessionState::Idle | SessionState::AwaitingInit)
    }
}

/// Result of offering a raw window message to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Ignored(IgnoreReason),
    /// The session's port was captured and `activate` was sent.
    Activated { channel_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Not an `initialize` message.
    NotInitialize,
    /// No session for this source window and channel id.
    UnknownSession,
    /// Handshake already completed for this session.
    AlreadyActive,
    /// `initialize` arrived without a transferred port.
    MissingPort,
    /// The transferred port was already closed by the frame.
    PortClosed,
}

/// Tell the frame the host is ready. Sent over the captured port, never the window.
pub fn send_activate(port: &MessagePort) -> PickerResult<()> {
    port.post(encode_outbound(&OutboundMessage::Activate)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use picker_core::codec::decode_outbound;

    #[test]
    fn only_pre_active_states_accept() {
        assert!(SessionState::Idle.accepts_initialize());
        assert!(SessionState::AwaitingInit.accepts_initialize());
        assert!(!SessionState::Active.accepts_initialize());
    }

    #[test]
    fn activate_goes_over_port() {
        let (host, mut frame) = MessagePort::pair();
        send_activate(&host).unwrap();
        let msg = decode_outbound(frame.try_recv().unwrap()).unwrap();
        assert_eq!(msg, OutboundMessage::Activate);
    }
}
