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
use std::fmt;

use serde::Serialize;

/// Identifies a device by its position in the host's enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DeviceId(s.trim().parse()?))
    }
}

/// The direction audio flows through a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Input => "input",
            Direction::Output => "output",
        })
    }
}

/// What a device is able to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Input,
    Output,
    Duplex,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Input => "input",
            Capability::Output => "output",
            Capability::Duplex => "input/output",
        })
    }
}

/// A device as reported by the host at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub name: String,
    /// Maximum capture channels, zero if the device can't capture.
    pub input_channels: u16,
    /// Maximum playback channels, zero if the device can't play.
    pub output_channels: u16,
    /// The device's native sample rate, if the host reports one.
    pub sample_rate: Option<u32>,
}

impl DeviceDescriptor {
    /// The direction capability of the device. Returns None for devices that
    /// report no channels at all.
    pub fn capability(&self) -> Option<Capability> {
        match (self.input_channels > 0, self.output_channels > 0) {
            (true, true) => Some(Capability::Duplex),
            (true, false) => Some(Capability::Input),
            (false, true) => Some(Capability::Output),
            (false, false) => None,
        }
    }

    pub fn supports(&self, direction: Direction) -> bool {
        self.channels(direction) > 0
    }

    pub fn channels(&self, direction: Direction) -> u16 {
        match direction {
            Direction::Input => self.input_channels,
            Direction::Output => self.output_channels,
        }
    }

    /// A flattened view of the device for one direction.
    pub fn info(&self, direction: Direction) -> DeviceInfo {
        DeviceInfo {
            index: self.id.0,
            name: self.name.clone(),
            channels: self.channels(direction),
            sample_rate: self.sample_rate,
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (In={}, Out={}",
            self.id, self.name, self.input_channels, self.output_channels
        )?;
        if let Some(sample_rate) = self.sample_rate {
            write!(f, ", Rate={}", sample_rate)?;
        }
        write!(f, ")")
    }
}

/// Device information as exposed to callers of the soundboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub channels: u16,
    pub sample_rate: Option<u32>,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (Channels={}", self.index, self.name, self.channels)?;
        if let Some(sample_rate) = self.sample_rate {
            write!(f, ", Rate={}", sample_rate)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(input_channels: u16, output_channels: u16) -> DeviceDescriptor {
        DeviceDescriptor {
            id: DeviceId(3),
            name: "Test".into(),
            input_channels,
            output_channels,
            sample_rate: Some(48000),
        }
    }

    #[test]
    fn test_capability() {
        assert_eq!(descriptor(2, 0).capability(), Some(Capability::Input));
        assert_eq!(descriptor(0, 2).capability(), Some(Capability::Output));
        assert_eq!(descriptor(1, 2).capability(), Some(Capability::Duplex));
        assert_eq!(descriptor(0, 0).capability(), None);
    }

    #[test]
    fn test_info() {
        let device = descriptor(1, 2);
        let info = device.info(Direction::Output);
        assert_eq!(info.index, 3);
        assert_eq!(info.channels, 2);
        assert_eq!(device.info(Direction::Input).channels, 1);
        assert_eq!(info.sample_rate, Some(48000));
    }

    #[test]
    fn test_parse_device_id() {
        assert_eq!(" 4 ".parse::<DeviceId>().unwrap(), DeviceId(4));
        assert!("four".parse::<DeviceId>().is_err());
    }
}
