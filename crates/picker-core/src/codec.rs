//! Conversion between structured-clone payloads and typed envelopes.
//!
//! Messages cross the window and port boundaries as JSON values; this module
//! is the only place they are turned into protocol types.

use serde_json::Value;

use crate::error::{PickerError, PickerResult};
use crate::messages::{HandshakeMessage, InboundMessage, OutboundMessage};

/// Encode a host → frame envelope.
pub fn encode_outbound(msg: &OutboundMessage) -> PickerResult<Value> {
    Ok(serde_json::to_value(msg)?)
}

/// Decode a host → frame envelope (used by frame-side drivers).
pub fn decode_outbound(value: Value) -> PickerResult<OutboundMessage> {
    Ok(serde_json::from_value(value)?)
}

/// Decode a frame → host envelope received on a port.
pub fn decode_inbound(value: Value) -> PickerResult<InboundMessage> {
    match value.get("type").and_then(Value::as_str) {
        Some("notification") | Some("command") => Ok(serde_json::from_value(value)?),
        Some(other) => Err(PickerError::InvalidMessage(format!(
            "unexpected envelope type: {other}"
        ))),
        None => Err(PickerError::InvalidMessage("missing envelope type".into())),
    }
}

/// Correlation id of a message that looks like a command, even when its
/// payload does not decode.
///
/// A message qualifies when it has a string `id` and either `type: "command"`
/// or a string `data.command` tag. Returns the id and the tag if any.
pub fn command_correlation(value: &Value) -> Option<(String, Option<String>)> {
    let id = value.get("id")?.as_str()?;
    let tag = value
        .get("data")
        .and_then(|d| d.get("command"))
        .and_then(Value::as_str);
    let is_command = value.get("type").and_then(Value::as_str) == Some("command");
    if !is_command && tag.is_none() {
        return None;
    }
    Some((id.to_string(), tag.map(str::to_string)))
}

/// Encode a frame → host envelope (used by frame-side drivers).
pub fn encode_inbound(msg: &InboundMessage) -> PickerResult<Value> {
    Ok(serde_json::to_value(msg)?)
}

/// Interpret a raw window message as a handshake request.
///
/// Returns `None` for anything that is not a well-formed `initialize`;
/// unrelated window traffic is expected and is not an error.
pub fn decode_handshake(value: &Value) -> Option<HandshakeMessage> {
    if value.get("type").and_then(Value::as_str) != Some("initialize") {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Command, CommandEnvelope, CloseCommand};
    use serde_json::json;

    #[test]
    fn handshake_filters_unrelated_traffic() {
        assert!(decode_handshake(&json!({"type": "resize", "width": 3})).is_none());
        assert!(decode_handshake(&json!("hello")).is_none());
        assert!(decode_handshake(&json!({"type": "initialize"})).is_none());
        assert_eq!(
            decode_handshake(&json!({"type": "initialize", "channelId": "c"})),
            Some(HandshakeMessage::Initialize {
                channel_id: "c".into()
            })
        );
    }

    #[test]
    fn inbound_rejects_unknown_types() {
        let err = decode_inbound(json!({"type": "activate"})).unwrap_err();
        assert!(matches!(err, PickerError::InvalidMessage(_)));
        let err = decode_inbound(json!({"id": "1"})).unwrap_err();
        assert!(matches!(err, PickerError::InvalidMessage(_)));
    }

    #[test]
    fn correlation_of_undecodable_commands() {
        let bad_auth = json!({"type": "command", "id": "m1", "data": {"command": "authenticate"}});
        assert!(decode_inbound(bad_auth.clone()).is_err());
        assert_eq!(
            command_correlation(&bad_auth),
            Some(("m1".into(), Some("authenticate".into())))
        );

        let untyped = json!({"id": "m2", "data": {"command": "pick", "items": [{"id": 3}]}});
        assert_eq!(
            command_correlation(&untyped),
            Some(("m2".into(), Some("pick".into())))
        );

        assert_eq!(
            command_correlation(&json!({"type": "command", "id": "m3"})),
            Some(("m3".into(), None))
        );
        assert!(command_correlation(&json!({"type": "command", "id": 4})).is_none());
        assert!(command_correlation(&json!({"type": "notification", "id": "n"})).is_none());
        assert!(command_correlation(&json!({"type": "command", "data": {"command": "close"}})).is_none());
    }

    #[test]
    fn inbound_malformed_command_is_codec_error() {
        let err = decode_inbound(json!({"type": "command", "data": {"command": "close"}})).unwrap_err();
        assert!(matches!(err, PickerError::Codec(_)));
    }

    #[test]
    fn inbound_encode_decode() {
        let msg = InboundMessage::Command(CommandEnvelope::new(
            "5",
            Command::Close(CloseCommand::default()),
        ));
        let value = encode_inbound(&msg).unwrap();
        assert_eq!(value, json!({"type": "command", "id": "5", "data": {"command": "close"}}));
        assert_eq!(decode_inbound(value).unwrap(), msg);
    }
}
