//! Command dispatcher.
//!
//! Runs once a session's port is captured and owns that port exclusively.
//! For every command it sends an `acknowledge` before running the handler,
//! then exactly one `result` or `error` with the same id. Messages are handled
//! one at a time, so replies go out in the order commands arrived.

use std::sync::Arc;
use std::time::Duration;

use picker_core::codec::{command_correlation, decode_inbound, encode_outbound};
use picker_core::messages::{
    AuthenticateCommand, Command, CommandEnvelope, ErrorCode, InboundMessage,
    NotificationEnvelope, NotificationKind, OutboundMessage,
};
use picker_core::{PickerError, PickerResult};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::events::{EventBridge, PickerChange, PickerEvent, PickerOutcome};
use crate::tokens::TokenProvider;
use crate::window::MessagePort;

/// Default upper bound on a single token request.
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for a session's dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// How long an `authenticate` command may wait on the token provider.
    pub token_timeout: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            token_timeout: DEFAULT_TOKEN_TIMEOUT,
        }
    }
}

/// Protocol state machine for one active session.
pub struct Dispatcher {
    channel_id: String,
    tokens: Arc<dyn TokenProvider>,
    events: EventBridge,
    settings: DispatcherSettings,
}

impl Dispatcher {
    pub fn new(
        channel_id: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        events: EventBridge,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            tokens,
            events,
            settings,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Process port traffic until the frame side goes away.
    pub async fn run(self, mut port: MessagePort) {
        debug!(channel_id = %self.channel_id, "dispatcher started");
        while let Some(raw) = port.recv().await {
            if let Err(e) = self.handle(raw, &port).await {
                warn!(channel_id = %self.channel_id, error = %e, "port unusable, stopping dispatcher");
                break;
            }
        }
        debug!(channel_id = %self.channel_id, "dispatcher stopped");
    }

    /// Handle one raw port message.
    ///
    /// A message that carries a command id but does not decode is still
    /// acknowledged and answered with `invalidCommand`; other malformed
    /// messages are logged and skipped. An `Err` means the port can no longer
    /// carry replies.
    pub async fn handle(&self, raw: Value, port: &MessagePort) -> PickerResult<()> {
        let correlation = command_correlation(&raw);
        match decode_inbound(raw) {
            Ok(InboundMessage::Notification(n)) => {
                self.on_notification(n);
                Ok(())
            }
            Ok(InboundMessage::Command(cmd)) => self.on_command(cmd, port).await,
            Err(e) => match correlation {
                Some((id, tag)) => self.on_invalid_command(&id, tag.as_deref(), &e, port),
                None => {
                    warn!(channel_id = %self.channel_id, error = %e, "dropping malformed port message");
                    Ok(())
                }
            },
        }
    }

    fn on_invalid_command(
        &self,
        id: &str,
        tag: Option<&str>,
        error: &PickerError,
        port: &MessagePort,
    ) -> PickerResult<()> {
        let tag = tag.unwrap_or("<missing>");
        warn!(channel_id = %self.channel_id, id, command = tag, error = %error, "invalid command payload");
        send(port, &OutboundMessage::acknowledge(id))?;
        send(
            port,
            &OutboundMessage::error(id, ErrorCode::InvalidCommand, format!("{tag}: {error}"), true),
        )
    }

    fn on_notification(&self, notification: NotificationEnvelope) {
        match &notification.notification {
            NotificationKind::PageLoaded => {
                info!(channel_id = %self.channel_id, "picker page loaded");
            }
            NotificationKind::Other(tag) => {
                debug!(channel_id = %self.channel_id, notification = %tag, "picker notification");
            }
        }
        self.events.emit(PickerEvent::Notification(notification));
    }

    async fn on_command(&self, envelope: CommandEnvelope, port: &MessagePort) -> PickerResult<()> {
        let id = envelope.id.clone();
        debug!(channel_id = %self.channel_id, id = %id, command = envelope.data.tag(), "command received");

        send(port, &OutboundMessage::acknowledge(&id))?;

        let reply = match &envelope.data {
            Command::Authenticate(auth) => self.authenticate(&id, auth).await,
            Command::Close(_) => {
                self.emit_change(PickerOutcome::Closed, &envelope);
                OutboundMessage::success(&id)
            }
            Command::Pick(pick) => {
                self.emit_change(PickerOutcome::Picked(pick.items.clone()), &envelope);
                OutboundMessage::success(&id)
            }
            Command::Unsupported { command, .. } => {
                warn!(channel_id = %self.channel_id, id = %id, command = %command, "unsupported picker command");
                OutboundMessage::error(&id, ErrorCode::UnsupportedCommand, command.clone(), true)
            }
        };

        send(port, &reply)
    }

    fn emit_change(&self, outcome: PickerOutcome, envelope: &CommandEnvelope) {
        self.events
            .emit(PickerEvent::Change(PickerChange::new(outcome, envelope.clone())));
    }

    async fn authenticate(&self, id: &str, auth: &AuthenticateCommand) -> OutboundMessage {
        let request = self.tokens.get_token(&auth.resource);
        let failure = match tokio::time::timeout(self.settings.token_timeout, request).await {
            Ok(Ok(Some(token))) if !token.is_empty() => {
                debug!(channel_id = %self.channel_id, id, resource = %auth.resource, "token issued");
                return OutboundMessage::token(id, token.secret());
            }
            Ok(Ok(_)) => format!("no token available for {}", auth.resource),
            Ok(Err(e)) => e.to_string(),
            Err(_) => PickerError::Timeout.to_string(),
        };

        warn!(
            channel_id = %self.channel_id,
            id,
            resource = %auth.resource,
            reason = %failure,
            "unable to obtain token"
        );
        OutboundMessage::error(id, ErrorCode::UnableToObtainToken, failure, false)
    }
}

fn send(port: &MessagePort, msg: &OutboundMessage) -> PickerResult<()> {
    port.post(encode_outbound(msg)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingTokenProvider, PendingTokenProvider};
    use crate::tokens::StaticTokenProvider;
    use picker_core::codec::decode_outbound;
    use picker_core::messages::{CommandResult, ErrorInfo};
    use serde_json::json;

    fn dispatcher(tokens: Arc<dyn TokenProvider>) -> (Dispatcher, EventBridge) {
        let events = EventBridge::new(16);
        let d = Dispatcher::new("chan", tokens, events.clone(), DispatcherSettings::default());
        (d, events)
    }

    fn static_tokens() -> Arc<dyn TokenProvider> {
        Arc::new(StaticTokenProvider::from_pairs([(
            "https://contoso.sharepoint.com",
            "tok-123",
        )]))
    }

    fn drain(port: &mut MessagePort) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Some(v) = port.try_recv() {
            out.push(decode_outbound(v).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn authenticate_returns_token_after_ack() {
        let (d, _) = dispatcher(static_tokens());
        let (host, mut frame) = MessagePort::pair();

        d.handle(
            json!({"type": "command", "id": "a1", "data": {
                "command": "authenticate", "type": "SharePoint",
                "resource": "https://contoso.sharepoint.com"
            }}),
            &host,
        )
        .await
        .unwrap();

        let out = drain(&mut frame);
        assert_eq!(
            out,
            vec![
                OutboundMessage::acknowledge("a1"),
                OutboundMessage::Result {
                    id: "a1".into(),
                    data: CommandResult::Token {
                        token: "tok-123".into()
                    }
                },
            ]
        );
    }

    #[tokio::test]
    async fn authenticate_without_token_reports_error() {
        let (d, _) = dispatcher(static_tokens());
        let (host, mut frame) = MessagePort::pair();

        d.handle(
            json!({"type": "command", "id": "a2", "data": {
                "command": "authenticate", "resource": "https://elsewhere"
            }}),
            &host,
        )
        .await
        .unwrap();

        let out = drain(&mut frame);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], OutboundMessage::acknowledge("a2"));
        match &out[1] {
            OutboundMessage::Error {
                id,
                error: ErrorInfo { code, .. },
                is_expected,
            } => {
                assert_eq!(id, "a2");
                assert_eq!(*code, ErrorCode::UnableToObtainToken);
                assert!(!is_expected);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn authenticate_provider_failure_reports_error() {
        let (d, _) = dispatcher(Arc::new(FailingTokenProvider));
        let (host, mut frame) = MessagePort::pair();

        d.handle(
            json!({"type": "command", "id": "a3", "data": {"command": "authenticate", "resource": "https://x"}}),
            &host,
        )
        .await
        .unwrap();

        let out = drain(&mut frame);
        assert_eq!(out.len(), 2);
        assert!(matches!(
            &out[1],
            OutboundMessage::Error { error: ErrorInfo { code: ErrorCode::UnableToObtainToken, .. }, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn authenticate_times_out() {
        let events = EventBridge::new(4);
        let d = Dispatcher::new(
            "chan",
            Arc::new(PendingTokenProvider),
            events,
            DispatcherSettings {
                token_timeout: Duration::from_secs(5),
            },
        );
        let (host, mut frame) = MessagePort::pair();

        d.handle(
            json!({"type": "command", "id": "a4", "data": {"command": "authenticate", "resource": "https://x"}}),
            &host,
        )
        .await
        .unwrap();

        let out = drain(&mut frame);
        assert_eq!(out.len(), 2);
        match &out[1] {
            OutboundMessage::Error { error, .. } => {
                assert_eq!(error.code, ErrorCode::UnableToObtainToken);
                assert_eq!(error.message, "timeout");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn pick_emits_change_then_success() {
        let (d, events) = dispatcher(static_tokens());
        let mut rx = events.subscribe();
        let (host, mut frame) = MessagePort::pair();

        let items = json!([{"id": "1", "webUrl": "https://x/a"}]);
        d.handle(
            json!({"type": "command", "id": "p1", "data": {"command": "pick", "items": items}}),
            &host,
        )
        .await
        .unwrap();

        match rx.try_recv().unwrap() {
            PickerEvent::Change(change) => {
                let PickerOutcome::Picked(picked) = &change.outcome else {
                    panic!("expected picked outcome");
                };
                assert_eq!(serde_json::to_value(picked).unwrap(), items);
                assert_eq!(change.envelope.id, "p1");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            drain(&mut frame),
            vec![OutboundMessage::acknowledge("p1"), OutboundMessage::success("p1")]
        );
    }

    #[tokio::test]
    async fn close_emits_closed_without_items() {
        let (d, events) = dispatcher(static_tokens());
        let mut rx = events.subscribe();
        let (host, mut frame) = MessagePort::pair();

        d.handle(
            json!({"type": "command", "id": "c1", "data": {"command": "close"}}),
            &host,
        )
        .await
        .unwrap();

        match rx.try_recv().unwrap() {
            PickerEvent::Change(change) => assert_eq!(change.outcome, PickerOutcome::Closed),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            drain(&mut frame),
            vec![OutboundMessage::acknowledge("c1"), OutboundMessage::success("c1")]
        );
    }

    #[tokio::test]
    async fn unsupported_command_errors_without_events() {
        let (d, events) = dispatcher(static_tokens());
        let mut rx = events.subscribe();
        let (host, mut frame) = MessagePort::pair();

        d.handle(
            json!({"type": "command", "id": "u1", "data": {"command": "share"}}),
            &host,
        )
        .await
        .unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(
            drain(&mut frame),
            vec![
                OutboundMessage::acknowledge("u1"),
                OutboundMessage::error("u1", ErrorCode::UnsupportedCommand, "share", true),
            ]
        );
    }

    #[tokio::test]
    async fn notifications_are_forwarded_without_reply() {
        let (d, events) = dispatcher(static_tokens());
        let mut rx = events.subscribe();
        let (host, mut frame) = MessagePort::pair();

        d.handle(
            json!({"type": "notification", "notification": "page-loaded"}),
            &host,
        )
        .await
        .unwrap();

        match rx.try_recv().unwrap() {
            PickerEvent::Notification(n) => assert_eq!(n.notification, NotificationKind::PageLoaded),
            other => panic!("unexpected {other:?}"),
        }
        assert!(drain(&mut frame).is_empty());
    }

    #[tokio::test]
    async fn malformed_messages_are_skipped() {
        let (d, _) = dispatcher(static_tokens());
        let (host, mut frame) = MessagePort::pair();

        d.handle(json!({"type": "bogus"}), &host).await.unwrap();
        d.handle(json!(42), &host).await.unwrap();
        d.handle(json!({"type": "command", "data": {"command": "close"}}), &host)
            .await
            .unwrap();
        assert!(drain(&mut frame).is_empty());
    }

    #[tokio::test]
    async fn undecodable_commands_are_still_answered() {
        let (d, events) = dispatcher(static_tokens());
        let mut rx = events.subscribe();
        let (host, mut frame) = MessagePort::pair();

        let bad = [
            json!({"type": "command", "id": "m1", "data": {"command": "authenticate"}}),
            json!({"type": "command", "id": "m2", "data": {"command": "pick", "items": [{"webUrl": "https://x/a"}]}}),
            json!({"type": "command", "id": "m3", "data": {"command": "pick", "items": [{"id": 7}]}}),
        ];
        for raw in bad {
            d.handle(raw, &host).await.unwrap();
        }

        let out = drain(&mut frame);
        assert_eq!(out.len(), 6);
        for (pair, id) in out.chunks(2).zip(["m1", "m2", "m3"]) {
            assert_eq!(pair[0], OutboundMessage::acknowledge(id));
            match &pair[1] {
                OutboundMessage::Error {
                    id: got,
                    error,
                    is_expected,
                } => {
                    assert_eq!(got, id);
                    assert_eq!(error.code, ErrorCode::InvalidCommand);
                    assert!(*is_expected);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_port_is_an_error() {
        let (d, _) = dispatcher(static_tokens());
        let (host, frame) = MessagePort::pair();
        drop(frame);

        let err = d
            .handle(json!({"type": "command", "id": "x", "data": {"command": "close"}}), &host)
            .await
            .unwrap_err();
        assert!(matches!(err, PickerError::Channel(_)));
    }

    #[tokio::test]
    async fn run_processes_commands_in_order() {
        let (d, _) = dispatcher(static_tokens());
        let (host, mut frame) = MessagePort::pair();
        let task = tokio::spawn(d.run(host));

        for id in ["1", "2", "3"] {
            frame
                .post(json!({"type": "command", "id": id, "data": {"command": "close"}}))
                .unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(decode_outbound(frame.recv().await.unwrap()).unwrap());
        }
        let ids: Vec<_> = seen.iter().map(|m| m.correlation_id().unwrap().to_string()).collect();
        assert_eq!(ids, ["1", "1", "2", "2", "3", "3"]);
        assert!(seen.iter().step_by(2).all(|m| !m.is_terminal()));
        assert!(seen.iter().skip(1).step_by(2).all(|m| m.is_terminal()));

        drop(frame);
        task.await.unwrap();
    }
}
