//! API server command: `linetrack serve`.

use anyhow::Result;
use std::path::Path;

use linetrack::config::{CliOverrides, LinetrackToml};

pub async fn cmd_serve(config_path: &Path, overrides: CliOverrides) -> Result<()> {
    let config = LinetrackToml::resolve(config_path, &overrides)?;
    linetrack::telemetry::init(&config.logging.level, config.logging.log_format())?;

    for warning in config.validate() {
        tracing::warn!(%warning, "Configuration warning");
    }

    linetrack::tracker::server::start_server(config.server_config()).await
}
