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
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::{info, span, Level};

use super::{
    find_device, DeviceError, DeviceId, Direction, Host, InputStream, OutputStream, StreamFormat,
};

/// The parameters a session is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub input: DeviceId,
    pub output: DeviceId,
    pub sample_rate: u32,
    pub channels: u16,
    pub block_frames: usize,
}

impl SessionConfig {
    pub fn format(&self) -> StreamFormat {
        StreamFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            block_frames: self.block_frames,
        }
    }
}

/// A live pairing of an input stream and an output stream at an agreed format.
/// The streams are released when the session is closed or dropped.
pub struct Session {
    config: SessionConfig,
    input: Arc<dyn InputStream>,
    output: Arc<dyn OutputStream>,
    open: AtomicBool,
}

impl Session {
    /// Opens the input and the output device of the given configuration. If
    /// the output can't be opened the input is released before returning.
    pub fn open(host: &dyn Host, config: SessionConfig) -> Result<Session, DeviceError> {
        let span = span!(Level::INFO, "open session");
        let _enter = span.enter();

        let open_error = |id: DeviceId, direction: Direction, e: DeviceError| match e {
            DeviceError::Open { .. } => e,
            e => DeviceError::Open {
                id,
                direction,
                reason: e.to_string(),
            },
        };

        let input_device = find_device(host, config.input, Direction::Input)
            .map_err(|e| open_error(config.input, Direction::Input, e))?;
        let output_device = find_device(host, config.output, Direction::Output)
            .map_err(|e| open_error(config.output, Direction::Output, e))?;

        let format = config.format();
        let input: Arc<dyn InputStream> = Arc::from(host.open_input(config.input, format)?);
        let output: Arc<dyn OutputStream> = match host.open_output(config.output, format) {
            Ok(output) => Arc::from(output),
            Err(e) => {
                input.close();
                return Err(e);
            }
        };

        info!(
            input = input_device.name,
            output = output_device.name,
            sample_rate = config.sample_rate,
            channels = config.channels,
            block_frames = config.block_frames,
            "Opened session."
        );

        Ok(Session {
            config,
            input,
            output,
            open: AtomicBool::new(true),
        })
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn input(&self) -> Arc<dyn InputStream> {
        self.input.clone()
    }

    pub fn output(&self) -> Arc<dyn OutputStream> {
        self.output.clone()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Releases both streams. Closing an already closed session does nothing.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.input.close();
            self.output.close();
            info!(
                input = self.config.input.0,
                output = self.config.output.0,
                "Closed session."
            );
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
