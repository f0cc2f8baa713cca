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

use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

/// Errors raised while turning a sound file into a clip.
#[derive(Debug, Error)]
pub enum ClipError {
    #[error("{}: unsupported audio format: {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("{}: no audio frames decoded", path.display())]
    Empty { path: PathBuf },

    #[error("{}: corrupt audio: {source} (fallback decode: {fallback})", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: SymphoniaError,
        fallback: SymphoniaError,
    },

    #[error("{}: resampling from {from} Hz to {to} Hz failed: {reason}", path.display())]
    Resample {
        path: PathBuf,
        from: u32,
        to: u32,
        reason: String,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
