//! CLI subcommand implementations.

pub mod launch;
pub mod simulate;

use std::sync::Arc;

use picker_host::{Launcher, SessionRegistry};

use crate::config::Config;

/// Placeholder printed instead of bearer tokens.
pub const REDACTED: &str = "<redacted>";

/// Build a launcher with a fresh registry from the resolved config.
pub fn launcher(cfg: &Config) -> anyhow::Result<Launcher> {
    Ok(Launcher::new(
        Arc::new(SessionRegistry::new()),
        cfg.token_provider()?,
        cfg.host_settings(),
    ))
}
