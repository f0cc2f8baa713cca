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
use thiserror::Error;

use super::{DeviceId, Direction};

/// Errors raised while enumerating or opening devices.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("unable to enumerate audio devices: {0}")]
    Enumeration(String),

    #[error("unable to open {direction} device {id}: {reason}")]
    Open {
        id: DeviceId,
        direction: Direction,
        reason: String,
    },

    #[error("no device with id {0}")]
    NotFound(DeviceId),

    #[error("device {id} ({name}) does not support {direction}")]
    WrongDirection {
        id: DeviceId,
        name: String,
        direction: Direction,
    },

    #[error("no default {0} device")]
    NoDefault(Direction),
}

/// Errors raised by an open stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("stream is closed")]
    Closed,

    #[error("audio backend error: {0}")]
    Backend(String),
}
