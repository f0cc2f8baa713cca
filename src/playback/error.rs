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

use thiserror::Error;

use crate::clip::{ClipError, ClipFormat};

/// Reasons a trigger didn't start a playback instance.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("no sound named '{0}'")]
    ClipNotFound(String),

    #[error("file for sound '{name}' is missing: {}", path.display())]
    FileMissing { name: String, path: PathBuf },

    #[error("unable to load sound '{name}': {source}")]
    Clip {
        name: String,
        #[source]
        source: ClipError,
    },

    #[error("sound '{name}' is in {actual}, expected {expected}")]
    Format {
        name: String,
        expected: ClipFormat,
        actual: ClipFormat,
    },
}
