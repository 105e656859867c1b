//! `picker launch`: print the form that would load the picker.
//!
//! Runs the launcher against an in-process frame and prints the submitted
//! form as JSON. The session is withdrawn before exiting.

use anyhow::{Context, Result};
use picker_core::launch::ACCESS_TOKEN_FIELD;
use picker_host::EmbeddedFrame;
use serde_json::{json, Map, Value};
use tracing::info;

use super::REDACTED;
use crate::config::Config;

pub async fn run(cfg: &Config, show_token: bool) -> Result<()> {
    let launch = cfg.launch_config()?;
    let launcher = super::launcher(cfg)?;
    let frame = EmbeddedFrame::new();

    let session = launcher
        .launch(&frame, launch)
        .await
        .context("failed to launch picker")?;
    info!(channel_id = %session.channel_id(), "launch form built");

    let form = frame
        .submitted_form()
        .context("launcher did not submit a form")?;
    let mut fields = Map::new();
    for (name, value) in &form.fields {
        let value = if name == ACCESS_TOKEN_FIELD && !show_token {
            REDACTED.to_string()
        } else {
            value.clone()
        };
        fields.insert(name.clone(), Value::String(value));
    }

    let out = json!({
        "channelId": session.channel_id(),
        "action": form.action.as_str(),
        "method": form.method,
        "fields": fields,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);

    session.close().await;
    Ok(())
}
