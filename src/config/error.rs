// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::PathBuf;

use crate::clip::InvalidVolume;

/// Typed error for config load/parse/validation failures so callers can
/// distinguish them without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Unable to serialize config: {0}")]
    Serialize(#[from] serde_yml::Error),

    #[error("Unable to save config to {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid volume for sound '{sound}': {source}")]
    InvalidVolume {
        sound: String,
        #[source]
        source: InvalidVolume,
    },

    #[error("Unknown sound '{0}'")]
    UnknownSound(String),

    #[error("Sound '{0}' is defined more than once")]
    DuplicateSound(String),

    #[error("Key '{key}' is bound to both '{first}' and '{second}'")]
    DuplicateKeybind {
        key: String,
        first: String,
        second: String,
    },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
