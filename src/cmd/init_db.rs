//! Database bootstrap command: `linetrack init-db`.

use anyhow::Result;
use std::path::{Path, PathBuf};

use linetrack::config::{CliOverrides, LinetrackToml};

pub fn cmd_init_db(config_path: &Path, db_path: Option<PathBuf>) -> Result<()> {
    let overrides = CliOverrides {
        db_path,
        ..Default::default()
    };
    let config = LinetrackToml::resolve(config_path, &overrides)?;
    let db_path = &config.server.db_path;

    linetrack::tracker::server::open_database(db_path)?;
    println!("Database initialized at {}", db_path.display());
    Ok(())
}
