//! Picker protocol envelopes.
//!
//! Field names are contractual: they must match what the embedded picker
//! frame posts and expects. Every envelope carries a `type` discriminator;
//! commands additionally carry a `command` tag inside `data`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Correlation identifier linking a command to its acknowledgement and result.
pub type CorrelationId = String;

/// Notification tag sent by the frame once the picker page is interactive.
pub const PAGE_LOADED: &str = "page-loaded";

// ── Window surface ────────────────────────────────────────────────────

/// Messages the frame posts on the raw window surface (before a port exists).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HandshakeMessage {
    /// The frame opened a channel and transfers one end of it.
    Initialize {
        #[serde(rename = "channelId")]
        channel_id: String,
    },
}

// ── Frame → host (over the port) ──────────────────────────────────────

/// Everything the frame may send over the private port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    Notification(NotificationEnvelope),
    Command(CommandEnvelope),
}

/// Fire-and-forget notification; no id, no acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub notification: NotificationKind,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

/// Notification tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    PageLoaded,
    Other(String),
}

impl From<String> for NotificationKind {
    fn from(s: String) -> Self {
        if s == PAGE_LOADED {
            NotificationKind::PageLoaded
        } else {
            NotificationKind::Other(s)
        }
    }
}

impl From<NotificationKind> for String {
    fn from(k: NotificationKind) -> String {
        match k {
            NotificationKind::PageLoaded => PAGE_LOADED.to_string(),
            NotificationKind::Other(s) => s,
        }
    }
}

/// A command posted by the frame. Answered by one acknowledgement followed by
/// one result or error envelope carrying the same `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: CorrelationId,
    pub data: Command,
}

impl CommandEnvelope {
    pub fn new(id: impl Into<CorrelationId>, data: Command) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// Commands the host understands. Tags the host does not know are kept as
/// [`Command::Unsupported`] so they can be answered with an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCommand", into = "RawCommand")]
pub enum Command {
    Authenticate(AuthenticateCommand),
    Close(CloseCommand),
    Pick(PickCommand),
    Unsupported {
        command: String,
        fields: Map<String, Value>,
    },
}

impl Command {
    /// The wire tag of this command.
    pub fn tag(&self) -> &str {
        match self {
            Command::Authenticate(_) => "authenticate",
            Command::Close(_) => "close",
            Command::Pick(_) => "pick",
            Command::Unsupported { command, .. } => command,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticateCommand {
    /// Resource audience the frame wants a token for.
    pub resource: String,
    /// Token flavour requested by the frame (e.g. `"SharePoint"`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloseCommand {
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PickCommand {
    #[serde(default)]
    pub items: Vec<PickedItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One selected item. Everything besides `id` is kept verbatim in
/// `metadata`, including `webUrl`, so items re-serialize exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickedItem {
    pub id: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl PickedItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_web_url(mut self, web_url: impl Into<String>) -> Self {
        self.metadata
            .insert("webUrl".into(), Value::String(web_url.into()));
        self
    }

    /// The item's `webUrl`, when present and a string.
    pub fn web_url(&self) -> Option<&str> {
        self.metadata.get("webUrl").and_then(Value::as_str)
    }
}

/// Untyped command shape used to route on the `command` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawCommand {
    command: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl TryFrom<RawCommand> for Command {
    type Error = serde_json::Error;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        let fields = Value::Object(raw.fields);
        match raw.command.as_str() {
            "authenticate" => Ok(Command::Authenticate(serde_json::from_value(fields)?)),
            "close" => Ok(Command::Close(serde_json::from_value(fields)?)),
            "pick" => Ok(Command::Pick(serde_json::from_value(fields)?)),
            _ => Ok(Command::Unsupported {
                command: raw.command,
                fields: match fields {
                    Value::Object(m) => m,
                    _ => Map::new(),
                },
            }),
        }
    }
}

impl From<Command> for RawCommand {
    fn from(cmd: Command) -> Self {
        let command = cmd.tag().to_string();
        let fields = match cmd {
            Command::Authenticate(c) => object_fields(serde_json::to_value(c)),
            Command::Close(c) => object_fields(serde_json::to_value(c)),
            Command::Pick(c) => object_fields(serde_json::to_value(c)),
            Command::Unsupported { fields, .. } => fields,
        };
        RawCommand { command, fields }
    }
}

fn object_fields(value: Result<Value, serde_json::Error>) -> Map<String, Value> {
    match value {
        Ok(Value::Object(m)) => m,
        _ => Map::new(),
    }
}

// ── Host → frame ──────────────────────────────────────────────────────

/// Everything the host sends over the private port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Host is ready; first message on a freshly captured port.
    Activate,
    /// Command received, handler running.
    Acknowledge { id: CorrelationId },
    Result {
        id: CorrelationId,
        data: CommandResult,
    },
    Error {
        id: CorrelationId,
        error: ErrorInfo,
        #[serde(rename = "isExpected")]
        is_expected: bool,
    },
}

impl OutboundMessage {
    pub fn acknowledge(id: &str) -> Self {
        OutboundMessage::Acknowledge { id: id.to_string() }
    }

    pub fn success(id: &str) -> Self {
        OutboundMessage::Result {
            id: id.to_string(),
            data: CommandResult::Success,
        }
    }

    pub fn token(id: &str, token: impl Into<String>) -> Self {
        OutboundMessage::Result {
            id: id.to_string(),
            data: CommandResult::Token {
                token: token.into(),
            },
        }
    }

    pub fn error(id: &str, code: ErrorCode, message: impl Into<String>, is_expected: bool) -> Self {
        OutboundMessage::Error {
            id: id.to_string(),
            error: ErrorInfo {
                code,
                message: message.into(),
            },
            is_expected,
        }
    }

    /// The correlation id, if this envelope answers a command.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            OutboundMessage::Activate => None,
            OutboundMessage::Acknowledge { id }
            | OutboundMessage::Result { id, .. }
            | OutboundMessage::Error { id, .. } => Some(id),
        }
    }

    /// Whether this envelope terminates a command (result or error).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OutboundMessage::Result { .. } | OutboundMessage::Error { .. }
        )
    }
}

/// Payload of a `result` envelope, discriminated by `result`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum CommandResult {
    Token { token: String },
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    UnsupportedCommand,
    UnableToObtainToken,
    /// Recognizable command envelope whose payload could not be decoded.
    InvalidCommand,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initialize_wire_shape() {
        let msg: HandshakeMessage =
            serde_json::from_value(json!({"type": "initialize", "channelId": "abc"})).unwrap();
        assert_eq!(
            msg,
            HandshakeMessage::Initialize {
                channel_id: "abc".into()
            }
        );
    }

    #[test]
    fn pick_command_keeps_items_verbatim() {
        let raw = json!({
            "type": "command",
            "id": "7",
            "data": {
                "command": "pick",
                "items": [{"id": "1", "webUrl": "https://x/a", "parentReference": {"driveId": "d"}}]
            }
        });
        let msg: InboundMessage = serde_json::from_value(raw.clone()).unwrap();
        let InboundMessage::Command(env) = &msg else {
            panic!("expected command");
        };
        let Command::Pick(pick) = &env.data else {
            panic!("expected pick");
        };
        assert_eq!(pick.items.len(), 1);
        assert_eq!(pick.items[0].web_url(), Some("https://x/a"));
        assert_eq!(
            serde_json::to_value(&pick.items).unwrap(),
            raw["data"]["items"]
        );
        assert_eq!(serde_json::to_value(&msg).unwrap(), raw);
    }

    #[test]
    fn null_and_missing_web_urls_survive_round_trip() {
        let items = json!([
            {"id": "1", "webUrl": null, "name": "a.docx"},
            {"id": "2"}
        ]);
        let pick: PickCommand = serde_json::from_value(json!({"items": items})).unwrap();
        assert_eq!(pick.items[0].web_url(), None);
        assert_eq!(pick.items[1].web_url(), None);
        assert_eq!(serde_json::to_value(&pick.items).unwrap(), items);

        let built = PickedItem::new("3").with_web_url("https://x/c");
        assert_eq!(
            serde_json::to_value(&built).unwrap(),
            json!({"id": "3", "webUrl": "https://x/c"})
        );
    }

    #[test]
    fn unknown_command_tag_is_preserved() {
        let msg: InboundMessage = serde_json::from_value(json!({
            "type": "command",
            "id": "9",
            "data": {"command": "share", "target": "x"}
        }))
        .unwrap();
        let InboundMessage::Command(env) = msg else {
            panic!("expected command");
        };
        assert_eq!(env.data.tag(), "share");
        match env.data {
            Command::Unsupported { fields, .. } => assert_eq!(fields["target"], "x"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn authenticate_command_fields() {
        let msg: InboundMessage = serde_json::from_value(json!({
            "type": "command",
            "id": "1",
            "data": {"command": "authenticate", "type": "SharePoint", "resource": "https://contoso.sharepoint.com"}
        }))
        .unwrap();
        let InboundMessage::Command(CommandEnvelope {
            data: Command::Authenticate(auth),
            ..
        }) = msg
        else {
            panic!("expected authenticate");
        };
        assert_eq!(auth.resource, "https://contoso.sharepoint.com");
        assert_eq!(auth.token_type.as_deref(), Some("SharePoint"));
    }

    #[test]
    fn notification_tags() {
        let msg: InboundMessage = serde_json::from_value(json!({
            "type": "notification",
            "notification": "page-loaded",
            "timestamp": 3
        }))
        .unwrap();
        let InboundMessage::Notification(n) = msg else {
            panic!("expected notification");
        };
        assert_eq!(n.notification, NotificationKind::PageLoaded);
        assert_eq!(n.data["timestamp"], 3);
    }

    #[test]
    fn outbound_wire_shapes() {
        assert_eq!(
            serde_json::to_value(OutboundMessage::Activate).unwrap(),
            json!({"type": "activate"})
        );
        assert_eq!(
            serde_json::to_value(OutboundMessage::acknowledge("4")).unwrap(),
            json!({"type": "acknowledge", "id": "4"})
        );
        assert_eq!(
            serde_json::to_value(OutboundMessage::token("4", "tok-123")).unwrap(),
            json!({"type": "result", "id": "4", "data": {"result": "token", "token": "tok-123"}})
        );
        assert_eq!(
            serde_json::to_value(OutboundMessage::success("4")).unwrap(),
            json!({"type": "result", "id": "4", "data": {"result": "success"}})
        );
        assert_eq!(
            serde_json::to_value(OutboundMessage::error(
                "4",
                ErrorCode::UnsupportedCommand,
                "share",
                true
            ))
            .unwrap(),
            json!({
                "type": "error",
                "id": "4",
                "error": {"code": "unsupportedCommand", "message": "share"},
                "isExpected": true
            })
        );
    }

    #[test]
    fn terminal_classification() {
        assert!(!OutboundMessage::acknowledge("1").is_terminal());
        assert!(OutboundMessage::success("1").is_terminal());
        assert_eq!(OutboundMessage::Activate.correlation_id(), None);
        assert_eq!(OutboundMessage::success("1").correlation_id(), Some("1"));
    }
}
