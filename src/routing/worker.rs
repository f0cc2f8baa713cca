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
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level};

use super::{cancel::FinishGuard, CancelHandle, Mixer, RoutingState};
use crate::{
    audio::{thread_priority, Session, StreamError},
    playback::PlaybackSet,
};

/// How often input overflows are reported.
const OVERFLOW_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// One run of the routing loop, bound to one session.
pub(super) struct Worker {
    pub(super) id: u64,
    pub(super) session: Arc<Session>,
    pub(super) playback: Arc<PlaybackSet>,
    pub(super) mixer: Mixer,
    pub(super) state: Arc<Mutex<RoutingState>>,
    pub(super) cancel: CancelHandle,
}

/// Counts input overflows and logs them at most once per interval.
struct OverflowLog {
    last: Option<Instant>,
    suppressed: u64,
}

impl OverflowLog {
    fn record(&mut self) {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < OVERFLOW_LOG_INTERVAL => {
                self.suppressed += 1;
            }
            _ => {
                warn!(
                    suppressed = self.suppressed,
                    "Input overflowed, dropped frames are ignored"
                );
                self.last = Some(now);
                self.suppressed = 0;
            }
        }
    }
}

impl Worker {
    pub(super) fn run(self) {
        let span = span!(Level::INFO, "routing", run = self.id);
        let _enter = span.enter();
        let _finished = FinishGuard(self.cancel.clone());

        thread_priority::raise_current_thread_priority(
            thread_priority::routing_thread_priority(),
            thread_priority::rt_audio_enabled(),
        );

        let config = self.session.config();
        let frames = config.block_frames;
        let samples = config.format().block_samples();
        let input = self.session.input();
        let output = self.session.output();

        let mut input_block = vec![0i16; samples];
        let mut output_block = vec![0i16; samples];
        let mut clips: Vec<i32> = Vec::with_capacity(samples);
        let mut overflow = OverflowLog {
            last: None,
            suppressed: 0,
        };
        let mut blocks: u64 = 0;

        info!(frames, "Routing started.");
        let result: Result<(), (&str, StreamError)> = loop {
            if self.cancel.is_cancelled() {
                break Ok(());
            }

            match input.read(&mut input_block) {
                Ok(status) => {
                    if status.overflowed {
                        overflow.record();
                    }
                }
                Err(e) => break Err(("read", e)),
            }

            let mixed = self.playback.consume_block_into(frames, &mut clips);
            self.mixer.mix(
                &input_block,
                mixed.then_some(clips.as_slice()),
                &mut output_block,
            );

            if let Err(e) = output.write(&output_block) {
                break Err(("write", e));
            }
            blocks += 1;
        };

        match result {
            Ok(()) => info!(blocks, "Routing stopped."),
            Err((operation, e)) if self.cancel.is_cancelled() => {
                debug!(operation, err = %e, blocks, "Stream closed while stopping.");
            }
            Err((operation, e)) => {
                error!(operation, err = %e, blocks, "Routing failed.");
                {
                    let mut state = self.state.lock();
                    if *state == RoutingState::Running {
                        *state = RoutingState::Failed;
                    }
                }
                self.session.close();
            }
        }
    }
}
