//! picker-core: Shared protocol library for picker-bridge.
//!
//! Provides the envelope types exchanged with an embedded file-picker frame,
//! the picker option model, launch address/form synthesis, and the JSON
//! codec used at the window and port boundaries.

pub mod codec;
pub mod error;
pub mod launch;
pub mod messages;
pub mod options;
pub mod token;

// Re-export commonly used items at crate root.
pub use error::{PickerError, PickerResult};
pub use launch::{LaunchConfig, LaunchForm};
pub use messages::{
    Command, CommandEnvelope, CommandResult, ErrorCode, InboundMessage, NotificationEnvelope,
    OutboundMessage, PickedItem,
};
pub use options::PickerOptions;
pub use token::{generate_channel_id, AuthToken};
pub use url::Url;
