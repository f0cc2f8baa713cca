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
use std::{fmt, path::Path, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod decoder;
mod error;
mod transcoder;

pub use decoder::{decode, is_supported, SUPPORTED_EXTENSIONS};
pub use error::ClipError;

/// The sample rate and channel layout of PCM audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl fmt::Display for ClipFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz, {} channel(s)", self.sample_rate, self.channels)
    }
}

/// Raised when a volume outside of 0-100 is requested.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("volume {0} is outside of 0-100")]
pub struct InvalidVolume(pub u32);

/// A playback volume in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Volume(u8);

impl Volume {
    pub const MAX: Volume = Volume(100);

    pub fn percent(&self) -> u8 {
        self.0
    }

    /// The linear gain this volume applies.
    pub fn gain(&self) -> f32 {
        f32::from(self.0) / 100.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Volume(80)
    }
}

impl TryFrom<u32> for Volume {
    type Error = InvalidVolume;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value > 100 {
            return Err(InvalidVolume(value));
        }
        Ok(Volume(value as u8))
    }
}

impl From<Volume> for u32 {
    fn from(volume: Volume) -> u32 {
        u32::from(volume.0)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// A sound decoded into the session format with its volume applied. Clips are
/// immutable once built. The sample buffer is shared with the playback
/// instances created from it.
#[derive(Debug, Clone)]
pub struct DecodedClip {
    name: String,
    samples: Arc<[i16]>,
    format: ClipFormat,
    source_format: ClipFormat,
    gain: f32,
}

impl DecodedClip {
    pub fn new(
        name: &str,
        samples: Vec<i16>,
        format: ClipFormat,
        source_format: ClipFormat,
        gain: f32,
    ) -> DecodedClip {
        DecodedClip {
            name: name.to_string(),
            samples: samples.into(),
            format,
            source_format,
            gain,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interleaved samples in the clip's format.
    pub fn samples(&self) -> &Arc<[i16]> {
        &self.samples
    }

    pub fn format(&self) -> ClipFormat {
        self.format
    }

    /// The format of the file the clip was decoded from.
    pub fn source_format(&self) -> ClipFormat {
        self.source_format
    }

    /// The gain that was applied to the samples, in [0, 1].
    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.format.channels.max(1))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.format.sample_rate.max(1)))
    }

    /// The largest absolute sample value.
    pub fn peak(&self) -> u32 {
        self.samples
            .iter()
            .map(|sample| i32::from(*sample).unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

/// Returns the lowercase extension of the path, if any.
pub(crate) fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}
