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

//! Routes a live microphone through a soundboard mixer.
//!
//! Audio is read from an input device one block at a time, mixed with any
//! triggered sound clips and written to an output device, typically a virtual
//! audio cable that other applications use as their microphone.

pub mod audio;
pub mod clip;
pub mod config;
pub mod controller;
pub mod playback;
pub mod routing;
pub mod soundboard;

#[cfg(test)]
pub(crate) mod testutil;
