//! `picker simulate`: drive a full session against an in-process frame.
//!
//! Performs the handshake, sends `page-loaded`, authenticates against the
//! configured resource, then picks the given items (or closes). Every reply
//! and the final change event are printed as JSON lines.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use picker_core::messages::{
    AuthenticateCommand, CloseCommand, Command, OutboundMessage, PickCommand, PickedItem,
    PAGE_LOADED,
};
use picker_host::{next_change, EmbeddedFrame, HandshakeOutcome, PickerOutcome};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::REDACTED;
use crate::config::Config;

/// How long to wait for the change event after the terminal command.
const CHANGE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(cfg: &Config, items: &[String], show_token: bool) -> Result<()> {
    let launch = cfg.launch_config()?;
    let launcher = super::launcher(cfg)?;
    let mut frame = EmbeddedFrame::new();

    let session = launcher
        .launch(&frame, launch)
        .await
        .context("failed to launch picker")?;
    let mut events = session.subscribe();
    info!(channel_id = %session.channel_id(), "simulating picker session");

    match frame.initialize(launcher.registry()).await? {
        HandshakeOutcome::Activated { channel_id } => {
            print_line(&json!({"type": "activate", "channelId": channel_id}))?
        }
        HandshakeOutcome::Ignored(reason) => bail!("handshake ignored: {reason:?}"),
    }

    frame.notify(PAGE_LOADED)?;

    let auth = frame
        .send_command(Command::Authenticate(AuthenticateCommand {
            resource: cfg.resource().to_string(),
            token_type: None,
            extra: Map::new(),
        }))
        .await
        .context("authenticate exchange failed")?;
    print_reply(&auth.reply, show_token)?;

    let terminal = if items.is_empty() {
        Command::Close(CloseCommand::default())
    } else {
        Command::Pick(PickCommand {
            items: items.iter().map(PickedItem::new).collect(),
            extra: Map::new(),
        })
    };
    debug!(command = terminal.tag(), "sending terminal command");
    let exchange = frame
        .send_command(terminal)
        .await
        .context("terminal command exchange failed")?;
    print_reply(&exchange.reply, show_token)?;

    let change = tokio::time::timeout(CHANGE_TIMEOUT, next_change(&mut events))
        .await
        .context("timed out waiting for change event")?
        .context("session ended without a change event")?;
    let event = match change.outcome {
        PickerOutcome::Picked(items) => {
            json!({"event": "pickerchange", "outcome": "picked", "items": items})
        }
        PickerOutcome::Closed => json!({"event": "pickerchange", "outcome": "closed"}),
    };
    print_line(&event)?;

    session.close().await;
    Ok(())
}

fn print_reply(reply: &OutboundMessage, show_token: bool) -> Result<()> {
    let mut value = serde_json::to_value(reply)?;
    if !show_token && value["data"]["result"] == "token" {
        value["data"]["token"] = Value::String(REDACTED.into());
    }
    print_line(&value)
}

fn print_line(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
