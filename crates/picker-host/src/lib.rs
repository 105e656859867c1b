//! picker-host: host side of the picker-bridge protocol.
//!
//! Launches a file picker into a target frame, captures the private channel
//! the frame opens, and runs one dispatcher task per session that answers the
//! frame's commands and surfaces outcomes as typed events.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use picker_core::{LaunchConfig, PickerOptions};
//! use picker_host::{EmbeddedFrame, HostSettings, Launcher, SessionRegistry, StaticTokenProvider};
//!
//! # async fn example() -> picker_core::PickerResult<()> {
//! let registry = Arc::new(SessionRegistry::new());
//! let tokens = Arc::new(StaticTokenProvider::from_pairs([("https://contoso.sharepoint.com", "tok")]));
//! let launcher = Launcher::new(registry.clone(), tokens, HostSettings::default());
//!
//! let frame = EmbeddedFrame::new();
//! let session = launcher
//!     .launch(&frame, LaunchConfig::Odsp {
//!         base_url: "https://contoso.sharepoint.com".into(),
//!         options: PickerOptions::default(),
//!     })
//!     .await?;
//! let mut events = session.subscribe();
//! // The page's window listener forwards raw messages with `registry.route(msg)`.
//! # let _ = &mut events;
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod events;
pub mod frame;
pub mod handshake;
pub mod launcher;
pub mod registry;
pub mod tokens;
pub mod window;

#[cfg(test)]
mod test_support;

// Re-export primary public types.
pub use dispatcher::{Dispatcher, DispatcherSettings};
pub use events::{next_change, EventBridge, PickerChange, PickerEvent, PickerOutcome};
pub use frame::{CommandExchange, EmbeddedFrame};
pub use handshake::{HandshakeOutcome, IgnoreReason, SessionState};
pub use launcher::{HostSettings, Launcher, SessionHandle};
pub use registry::{SessionInfo, SessionKey, SessionRegistry};
pub use tokens::{HttpTokenProvider, StaticTokenProvider, TokenProvider};
pub use window::{MessagePort, TargetFrame, WindowId, WindowMessage};

// Re-export picker-core error types for convenience.
pub use picker_core::{PickerError, PickerResult};
