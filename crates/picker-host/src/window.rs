//! Window and port primitives.
//!
//! A window is only ever known by an opaque [`WindowId`]; comparing ids is the
//! equivalent of comparing `event.source` against a frame's `contentWindow`.
//! A [`MessagePort`] is one end of an ordered, bidirectional, in-process pipe.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use picker_core::{LaunchForm, PickerError, PickerResult};
use serde_json::Value;
use tokio::sync::mpsc;

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a browsing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Allocate a process-unique id.
    pub fn fresh() -> Self {
        Self(NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// One end of a private message channel.
pub struct MessagePort {
    tx: mpsc::UnboundedSender<Value>,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl MessagePort {
    /// Create an entangled pair of ports.
    pub fn pair() -> (MessagePort, MessagePort) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            MessagePort { tx: a_tx, rx: a_rx },
            MessagePort { tx: b_tx, rx: b_rx },
        )
    }

    /// Post a message to the other end.
    pub fn post(&self, message: Value) -> PickerResult<()> {
        self.tx
            .send(message)
            .map_err(|_| PickerError::Channel("port closed".into()))
    }

    /// Receive the next message; `None` once the other end is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }
}

impl fmt::Debug for MessagePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePort")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// A raw cross-window message as seen by the host page's listener.
#[derive(Debug)]
pub struct WindowMessage {
    /// The window that posted the message.
    pub source: WindowId,
    pub data: Value,
    /// Transferred ports, in transfer order.
    pub ports: Vec<MessagePort>,
}

impl WindowMessage {
    pub fn new(source: WindowId, data: Value) -> Self {
        Self {
            source,
            data,
            ports: Vec::new(),
        }
    }

    pub fn with_port(mut self, port: MessagePort) -> Self {
        self.ports.push(port);
        self
    }
}

/// The frame the picker is navigated into.
pub trait TargetFrame: Send + Sync {
    /// Identity the frame's messages will carry as `source`.
    fn window(&self) -> WindowId;

    /// Append the form to the frame's document and submit it.
    fn submit_form<'a>(
        &'a self,
        form: LaunchForm,
    ) -> Pin<Box<dyn Future<Output = PickerResult<()>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn ports_are_entangled_and_ordered() {
        let (mut a, mut b) = MessagePort::pair();
        a.post(json!(1)).unwrap();
        a.post(json!(2)).unwrap();
        b.post(json!("x")).unwrap();
        assert_eq!(b.recv().await, Some(json!(1)));
        assert_eq!(b.recv().await, Some(json!(2)));
        assert_eq!(a.recv().await, Some(json!("x")));
        assert!(a.try_recv().is_none());
    }

    #[test]
    fn post_to_dropped_port_fails() {
        let (a, b) = MessagePort::pair();
        drop(b);
        assert!(matches!(a.post(json!(1)), Err(PickerError::Channel(_))));
    }

    #[test]
    fn fresh_window_ids_differ() {
        assert_ne!(WindowId::fresh(), WindowId::fresh());
        assert_eq!(WindowId::new(7).to_string(), "window#7");
    }
}
