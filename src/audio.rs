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
use std::{fmt, sync::Arc};

use tracing::warn;

pub mod cpal;
pub mod device;
pub mod error;
pub mod mock;
mod ring;
pub mod session;
pub mod thread_priority;

pub use device::{Capability, DeviceDescriptor, DeviceId, DeviceInfo, Direction};
pub use error::{DeviceError, StreamError};
pub use session::{Session, SessionConfig};

/// The format a stream is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Number of frames moved per read or write.
    pub block_frames: usize,
}

impl StreamFormat {
    /// Number of interleaved samples in one block.
    pub fn block_samples(&self) -> usize {
        self.block_frames * self.channels as usize
    }
}

/// The result of a successful block read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStatus {
    /// True if the device dropped frames since the previous read.
    pub overflowed: bool,
}

/// A capture stream that hands out fixed size blocks of 16-bit samples.
pub trait InputStream: Send + Sync {
    /// Blocks until `buffer` is completely filled with interleaved samples.
    fn read(&self, buffer: &mut [i16]) -> Result<ReadStatus, StreamError>;

    /// Releases the underlying device. Pending and future reads fail with
    /// [StreamError::Closed]. Calling this more than once is a no-op.
    fn close(&self);
}

/// A playback stream that accepts blocks of 16-bit samples.
pub trait OutputStream: Send + Sync {
    /// Blocks until all of `buffer` has been queued on the device.
    fn write(&self, buffer: &[i16]) -> Result<(), StreamError>;

    /// Releases the underlying device. Calling this more than once is a no-op.
    fn close(&self);
}

/// An audio subsystem that can enumerate devices and open streams on them.
pub trait Host: fmt::Display + Send + Sync {
    /// Enumerates all devices known to the host.
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceError>;

    /// Returns the host's default device for the given direction, if any.
    fn default_device(&self, direction: Direction) -> Result<Option<DeviceId>, DeviceError>;

    /// Opens a capture stream on the given device.
    fn open_input(
        &self,
        id: DeviceId,
        format: StreamFormat,
    ) -> Result<Box<dyn InputStream>, DeviceError>;

    /// Opens a playback stream on the given device.
    fn open_output(
        &self,
        id: DeviceId,
        format: StreamFormat,
    ) -> Result<Box<dyn OutputStream>, DeviceError>;
}

/// Gets the host with the given name. Names starting with "mock" produce a
/// loopback mock host, anything else uses cpal's default host.
pub fn get_host(name: &str) -> Arc<dyn Host> {
    if name.starts_with("mock") {
        return Arc::new(mock::Host::loopback());
    }
    Arc::new(cpal::Host::new())
}

/// Lists the devices that can be used in the given direction.
pub fn list_devices(
    host: &dyn Host,
    direction: Direction,
) -> Result<Vec<DeviceDescriptor>, DeviceError> {
    Ok(host
        .devices()?
        .into_iter()
        .filter(|device| device.supports(direction))
        .collect())
}

/// Finds the first output device whose name contains `name` (ignoring case).
pub fn find_preferred_output(
    host: &dyn Host,
    name: &str,
) -> Result<Option<DeviceId>, DeviceError> {
    let needle = name.to_lowercase();
    Ok(list_devices(host, Direction::Output)?
        .into_iter()
        .find(|device| device.name.to_lowercase().contains(&needle))
        .map(|device| device.id))
}

/// Looks up a device by id and checks that it can be used in the given direction.
pub fn find_device(
    host: &dyn Host,
    id: DeviceId,
    direction: Direction,
) -> Result<DeviceDescriptor, DeviceError> {
    let device = host
        .devices()?
        .into_iter()
        .find(|device| device.id == id)
        .ok_or(DeviceError::NotFound(id))?;

    if !device.supports(direction) {
        return Err(DeviceError::WrongDirection {
            id,
            name: device.name,
            direction,
        });
    }
    Ok(device)
}

/// Resolves the output device to use: the preferred device if it can be found,
/// otherwise the host default.
pub fn resolve_output(host: &dyn Host, preferred: &str) -> Result<DeviceId, DeviceError> {
    if let Some(id) = find_preferred_output(host, preferred)? {
        return Ok(id);
    }

    warn!(
        preferred,
        "Preferred output device not found, audio will play through the default device."
    );
    host.default_device(Direction::Output)?
        .ok_or(DeviceError::NoDefault(Direction::Output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices_filters_direction() {
        let host = mock::Host::loopback();

        let inputs = list_devices(&host, Direction::Input).unwrap();
        assert!(!inputs.is_empty());
        assert!(inputs.iter().all(|d| d.input_channels > 0));

        let outputs = list_devices(&host, Direction::Output).unwrap();
        assert!(!outputs.is_empty());
        assert!(outputs.iter().all(|d| d.output_channels > 0));
    }

    #[test]
    fn test_find_preferred_output_is_case_insensitive() {
        let host = mock::Host::loopback();
        let found = find_preferred_output(&host, "vb-audio virtual cable").unwrap();
        assert_eq!(found, Some(mock::CABLE_ID));

        // Input only devices never match, even when the name does.
        assert_eq!(find_preferred_output(&host, "microphone").unwrap(), None);
    }

    #[test]
    fn test_resolve_output_falls_back_to_default() {
        let host = mock::Host::loopback();
        assert_eq!(resolve_output(&host, "VB-Audio").unwrap(), mock::CABLE_ID);
        assert_eq!(
            resolve_output(&host, "does not exist").unwrap(),
            mock::SPEAKERS_ID
        );
    }

    #[test]
    fn test_find_device_checks_direction() {
        let host = mock::Host::loopback();
        assert!(find_device(&host, mock::MICROPHONE_ID, Direction::Input).is_ok());
        assert!(matches!(
            find_device(&host, mock::MICROPHONE_ID, Direction::Output),
            Err(DeviceError::WrongDirection { .. })
        ));
        assert!(matches!(
            find_device(&host, DeviceId(99), Direction::Input),
            Err(DeviceError::NotFound(DeviceId(99)))
        ));
    }

    #[test]
    fn test_enumeration_failure_is_reported() {
        let host = mock::Host::loopback();
        host.fail_enumeration(true);
        assert!(matches!(
            list_devices(&host, Direction::Input),
            Err(DeviceError::Enumeration(_))
        ));
    }
}
