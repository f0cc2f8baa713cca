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
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use crate::clip::DecodedClip;

/// Global instance ID counter.
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a playback instance for as long as it lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One in-flight play of a clip.
pub struct PlaybackInstance {
    id: InstanceId,
    name: String,
    samples: Arc<[i16]>,
    channels: usize,
    /// Read position in frames.
    cursor: usize,
    started: Instant,
}

impl PlaybackInstance {
    pub fn new(clip: &DecodedClip) -> PlaybackInstance {
        PlaybackInstance {
            id: InstanceId(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)),
            name: clip.name().to_string(),
            samples: clip.samples().clone(),
            channels: usize::from(clip.format().channels.max(1)),
            cursor: 0,
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn remaining(&self) -> usize {
        self.frames() - self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.frames()
    }

    /// Adds up to `frames` frames from the cursor onwards into `mix` and
    /// advances the cursor by the number of frames added. Frames past the end
    /// of the clip are left untouched, which pads the instance with silence.
    pub(super) fn mix_into(&mut self, mix: &mut [i32], frames: usize) -> usize {
        let frames = frames
            .min(self.remaining())
            .min(mix.len() / self.channels);
        let start = self.cursor * self.channels;
        let end = start + frames * self.channels;

        for (acc, sample) in mix.iter_mut().zip(&self.samples[start..end]) {
            *acc += i32::from(*sample);
        }
        self.cursor += frames;
        frames
    }
}
