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
//! The set of clip instances that are currently playing.
//!
//! Triggers arrive from any thread and the routing loop drains the set one
//! block at a time. All access goes through [PlaybackSet], which guards the
//! instances with a single lock that is never held across decoding or file I/O.

mod error;
mod instance;
mod provider;
mod set;

pub use error::TriggerError;
pub use instance::{InstanceId, PlaybackInstance};
pub use provider::{CatalogClipProvider, ClipProvider, SoundEntry, SoundLookup};
pub use set::PlaybackSet;
