use std::{fs, io::ErrorKind, path::Path};

use serde::Deserialize;
use shared::{
    domain::{Participant, DEFAULT_COUNTDOWN_MS, DEFAULT_WINNER_COUNT},
    error::RaffleError,
};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub participants: Vec<Participant>,
    pub winner_count: usize,
    pub countdown_ms: u64,
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            participants: Vec::new(),
            winner_count: DEFAULT_WINNER_COUNT,
            countdown_ms: DEFAULT_COUNTDOWN_MS,
            seed: None,
        }
    }
}

/// Defaults, then `path` if it exists, then `RAFFLE__*` environment
/// variables.
pub fn load_settings(path: &Path) -> Result<Settings, RaffleError> {
    let settings = load_file_settings(path)?;
    Ok(apply_env_overrides(settings, |key| std::env::var(key).ok()))
}

/// Defaults overlaid with `path`. A missing file is not an error.
pub fn load_file_settings(path: &Path) -> Result<Settings, RaffleError> {
    match fs::read_to_string(path) {
        Ok(raw) => parse_settings(&raw, &path.display().to_string()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Settings::default()),
        Err(source) => Err(RaffleError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn parse_settings(raw: &str, origin: &str) -> Result<Settings, RaffleError> {
    toml::from_str(raw).map_err(|err| RaffleError::invalid_settings(origin, err.message()))
}

pub fn apply_env_overrides<F>(mut settings: Settings, lookup: F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("RAFFLE__WINNER_COUNT") {
        match v.trim().parse::<usize>() {
            Ok(parsed) => settings.winner_count = parsed,
            Err(_) => warn!(value = %v, "ignoring unparsable RAFFLE__WINNER_COUNT"),
        }
    }

    if let Some(v) = lookup("RAFFLE__COUNTDOWN_MS") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => settings.countdown_ms = parsed,
            Err(_) => warn!(value = %v, "ignoring unparsable RAFFLE__COUNTDOWN_MS"),
        }
    }

    if let Some(v) = lookup("RAFFLE__SEED") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => settings.seed = Some(parsed),
            Err(_) => warn!(value = %v, "ignoring unparsable RAFFLE__SEED"),
        }
    }

    if let Some(v) = lookup("RAFFLE__PARTICIPANTS") {
        settings.participants = v.split(',').filter_map(Participant::parse_entry).collect();
    }

    settings
}

/// One participant per line. Blank lines are skipped.
pub fn read_participants_file(path: &Path) -> Result<Vec<Participant>, RaffleError> {
    let raw = fs::read_to_string(path).map_err(|source| RaffleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(raw.lines().filter_map(Participant::parse_entry).collect())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
