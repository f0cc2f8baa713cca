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
use std::time::Duration;

use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::clip::ClipFormat;

const DEFAULT_OUTPUT_DEVICE: &str = "VB-Audio Virtual Cable";
const DEFAULT_HOST: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: u16 = 2;
const DEFAULT_BLOCK_SIZE: usize = 1024;
const DEFAULT_INPUT_GAIN: f32 = 0.6;
const DEFAULT_CLIP_GAIN: f32 = 3.0;
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_MAX_INSTANCES: usize = 32;

/// Behavior when a sound is triggered while it's already playing.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerBehavior {
    /// Stop the playing instances and start a new one.
    Cut,
    /// Let every trigger play on its own.
    #[default]
    Polyphonic,
}

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Audio {
    /// Exact name of the input device. The host default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    input_device: Option<String>,

    /// Case-insensitive substring of the preferred output device.
    #[serde(skip_serializing_if = "Option::is_none")]
    output_device: Option<String>,

    /// "default" for the system audio host or "mock" for loopback devices.
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<u16>,

    /// Frames moved through the routing loop per iteration.
    #[serde(skip_serializing_if = "Option::is_none")]
    block_size: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    input_gain: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    clip_gain: Option<f32>,

    /// How long stopping waits for the routing loop, e.g. "1s" or "500ms".
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    retrigger: Option<RetriggerBehavior>,

    /// Maximum concurrently playing sounds, 0 for no limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    max_instances: Option<usize>,
}

impl Audio {
    pub fn input_device(&self) -> Option<&str> {
        self.input_device.as_deref()
    }

    pub fn output_device(&self) -> &str {
        self.output_device.as_deref().unwrap_or(DEFAULT_OUTPUT_DEVICE)
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    pub fn block_size(&self) -> usize {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    pub fn input_gain(&self) -> f32 {
        self.input_gain.unwrap_or(DEFAULT_INPUT_GAIN)
    }

    pub fn clip_gain(&self) -> f32 {
        self.clip_gain.unwrap_or(DEFAULT_CLIP_GAIN)
    }

    pub fn stop_timeout(&self) -> Result<Duration, ConfigError> {
        match &self.stop_timeout {
            Some(stop_timeout) => Ok(DurationString::from_string(stop_timeout.clone())
                .map_err(|e| ConfigError::Invalid {
                    field: "stop_timeout",
                    reason: e.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_STOP_TIMEOUT),
        }
    }

    pub fn retrigger(&self) -> RetriggerBehavior {
        self.retrigger.unwrap_or_default()
    }

    pub fn max_instances(&self) -> usize {
        self.max_instances.unwrap_or(DEFAULT_MAX_INSTANCES)
    }

    /// The format clips are decoded into.
    pub fn clip_format(&self) -> ClipFormat {
        ClipFormat {
            sample_rate: self.sample_rate(),
            channels: self.channels(),
        }
    }

    /// Checks the values that have no sensible fallback.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        };

        if self.sample_rate() == 0 {
            return Err(invalid("sample_rate", "must be greater than zero"));
        }
        if self.channels() == 0 {
            return Err(invalid("channels", "must be greater than zero"));
        }
        if self.block_size() == 0 {
            return Err(invalid("block_size", "must be greater than zero"));
        }
        for (field, gain) in [
            ("input_gain", self.input_gain()),
            ("clip_gain", self.clip_gain()),
        ] {
            if !gain.is_finite() || gain < 0.0 {
                return Err(invalid(field, "must be a non-negative number"));
            }
        }
        self.stop_timeout()?;
        Ok(())
    }
}
