pub mod baseline;
pub mod extract;
pub mod merge;
pub mod prune;
pub mod retract;
pub mod scan;
pub mod update;
pub mod verify;

use std::path::Path;

use anyhow::{Context, Result};
use schoolcal_core::config::Settings;
use schoolcal_core::lock::RunLock;
use schoolcal_core::publish::GitPublisher;
use schoolcal_core::roster::Roster;

pub use crate::utils::tui::create_spinner;

/// Settings plus the installed roster.
pub fn load(config: Option<&Path>) -> Result<(Settings, &'static Roster)> {
    let settings = Settings::load(config)?;
    let roster_path = settings.roster_path();
    let roster = Roster::load(&roster_path)
        .with_context(|| format!("Could not load roster from {}", roster_path.display()))?;
    Ok((settings, roster.install()))
}

/// The git publisher, unless publishing is off in config or for this run.
pub fn publisher(settings: &Settings, no_publish: bool) -> Result<Option<GitPublisher>> {
    if no_publish || !settings.publish.enabled {
        return Ok(None);
    }
    Ok(Some(GitPublisher::from_settings(settings)?))
}

pub fn lock(settings: &Settings) -> Result<RunLock> {
    Ok(RunLock::acquire(&settings.lock_path())?)
}
