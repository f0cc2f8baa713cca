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
//! The real-time loop that moves audio from the input device, through the
//! mixer and out to the output device.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, span, warn, Level};

use crate::{
    audio::{self, DeviceError, DeviceId, Direction, Host, Session, SessionConfig},
    clip::ClipFormat,
    config::{self, ConfigError},
    playback::PlaybackSet,
};

mod cancel;
mod mixer;
mod worker;

pub(crate) use cancel::CancelHandle;
pub use mixer::Mixer;

use worker::Worker;

/// Global routing run counter, used to name worker threads.
static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Where the routing loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingState {
    Stopped,
    Starting,
    Running,
    Stopping,
    /// The last run ended with a stream error. Stopping moves back to Stopped.
    Failed,
}

impl fmt::Display for RoutingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RoutingState::Stopped => "stopped",
            RoutingState::Starting => "starting",
            RoutingState::Running => "running",
            RoutingState::Stopping => "stopping",
            RoutingState::Failed => "failed",
        })
    }
}

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("unable to start routing: {0}")]
    Start(#[source] DeviceError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("unable to spawn routing thread: {0}")]
    Thread(#[source] std::io::Error),
}

/// Fixed parameters of the routing pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub block_frames: usize,
    pub input_gain: f32,
    pub clip_gain: f32,
    pub stop_timeout: Duration,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        RoutingSettings {
            sample_rate: 44100,
            channels: 2,
            block_frames: 1024,
            input_gain: 0.6,
            clip_gain: 3.0,
            stop_timeout: Duration::from_secs(1),
        }
    }
}

impl RoutingSettings {
    pub fn from_config(audio: &config::Audio) -> Result<RoutingSettings, ConfigError> {
        Ok(RoutingSettings {
            sample_rate: audio.sample_rate(),
            channels: audio.channels(),
            block_frames: audio.block_size(),
            input_gain: audio.input_gain(),
            clip_gain: audio.clip_gain(),
            stop_timeout: audio.stop_timeout()?,
        })
    }

    pub fn clip_format(&self) -> ClipFormat {
        ClipFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

/// The devices routing reads from and writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSelection {
    pub input: DeviceId,
    pub output: DeviceId,
}

/// A routing run in progress, or one that failed and hasn't been cleaned up.
struct Run {
    id: u64,
    session: Arc<Session>,
    cancel: CancelHandle,
    worker: thread::JoinHandle<()>,
}

/// Owns the session and the routing loop. Starting and stopping are
/// serialized, so at most one session is open and at most one loop runs.
pub struct Router {
    host: Arc<dyn Host>,
    playback: Arc<PlaybackSet>,
    settings: RoutingSettings,
    selection: Mutex<DeviceSelection>,
    state: Arc<Mutex<RoutingState>>,
    lifecycle: Mutex<Option<Run>>,
}

impl Router {
    pub fn new(
        host: Arc<dyn Host>,
        playback: Arc<PlaybackSet>,
        settings: RoutingSettings,
        selection: DeviceSelection,
    ) -> Router {
        Router {
            host,
            playback,
            settings,
            selection: Mutex::new(selection),
            state: Arc::new(Mutex::new(RoutingState::Stopped)),
            lifecycle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RoutingState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RoutingState::Running
    }

    pub fn selection(&self) -> DeviceSelection {
        *self.selection.lock()
    }

    pub fn settings(&self) -> RoutingSettings {
        self.settings
    }

    /// The configuration of the open session, if there is one.
    pub fn session_config(&self) -> Option<SessionConfig> {
        self.lifecycle
            .lock()
            .as_ref()
            .filter(|run| run.session.is_open())
            .map(|run| run.session.config())
    }

    fn set_state(&self, state: RoutingState) {
        *self.state.lock() = state;
    }

    /// Opens a session on the selected devices and starts the routing loop.
    /// Does nothing if routing is already starting or running.
    pub fn start(&self) -> Result<(), RoutingError> {
        self.start_locked(&mut self.lifecycle.lock())
    }

    fn start_locked(&self, lifecycle: &mut Option<Run>) -> Result<(), RoutingError> {
        if matches!(
            self.state(),
            RoutingState::Starting | RoutingState::Running
        ) {
            return Ok(());
        }

        let span = span!(Level::INFO, "start routing");
        let _enter = span.enter();

        // A failed run leaves its thread and session behind.
        if let Some(run) = lifecycle.take() {
            self.teardown(run);
        }

        self.set_state(RoutingState::Starting);
        let selection = self.selection();
        let config = SessionConfig {
            input: selection.input,
            output: selection.output,
            sample_rate: self.settings.sample_rate,
            channels: self.settings.channels,
            block_frames: self.settings.block_frames,
        };

        let session = match Session::open(self.host.as_ref(), config) {
            Ok(session) => Arc::new(session),
            Err(e) => {
                warn!(err = %e, "Unable to open session");
                self.set_state(RoutingState::Failed);
                return Err(RoutingError::Start(e));
            }
        };

        let id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelHandle::new();
        let worker = Worker {
            id,
            session: session.clone(),
            playback: self.playback.clone(),
            mixer: Mixer::new(self.settings.input_gain, self.settings.clip_gain),
            state: self.state.clone(),
            cancel: cancel.clone(),
        };

        // Running has to be visible before the worker can report a failure.
        self.set_state(RoutingState::Running);
        let worker = match thread::Builder::new()
            .name(format!("micmix-routing-{}", id))
            .spawn(move || worker.run())
        {
            Ok(worker) => worker,
            Err(e) => {
                session.close();
                self.set_state(RoutingState::Failed);
                return Err(RoutingError::Thread(e));
            }
        };

        info!(
            run = id,
            input = selection.input.0,
            output = selection.output.0,
            "Routing running."
        );
        *lifecycle = Some(Run {
            id,
            session,
            cancel,
            worker,
        });
        Ok(())
    }

    /// Stops the routing loop and closes the session. The loop is given up to
    /// the stop timeout to exit, after which the session is closed anyway and
    /// the thread is left to finish on its own. Safe to call in any state.
    pub fn stop(&self) {
        self.stop_locked(&mut self.lifecycle.lock())
    }

    fn stop_locked(&self, lifecycle: &mut Option<Run>) {
        let Some(run) = lifecycle.take() else {
            self.set_state(RoutingState::Stopped);
            return;
        };

        let span = span!(Level::INFO, "stop routing");
        let _enter = span.enter();

        self.set_state(RoutingState::Stopping);
        self.teardown(run);
        self.set_state(RoutingState::Stopped);
    }

    fn teardown(&self, run: Run) {
        run.cancel.cancel();
        if run.cancel.wait_finished(self.settings.stop_timeout) {
            if run.worker.join().is_err() {
                warn!(run = run.id, "Routing thread panicked");
            }
        } else {
            warn!(
                run = run.id,
                timeout = ?self.settings.stop_timeout,
                "Routing loop didn't stop in time, detaching it"
            );
        }
        run.session.close();
        info!(run = run.id, "Routing torn down.");
    }

    /// Restarts routing if it's running, so a new device selection takes
    /// effect. There is a gap with no routing between the stop and the start.
    pub fn restart_if_running(&self) -> Result<(), RoutingError> {
        self.restart_locked(&mut self.lifecycle.lock())
    }

    fn restart_locked(&self, lifecycle: &mut Option<Run>) -> Result<(), RoutingError> {
        if !self.is_running() {
            return Ok(());
        }
        self.stop_locked(lifecycle);
        self.start_locked(lifecycle)
    }

    /// Selects the input device, restarting routing if it's running.
    pub fn select_input(&self, id: DeviceId) -> Result<(), RoutingError> {
        self.select(id, Direction::Input)
    }

    /// Selects the output device, restarting routing if it's running.
    pub fn select_output(&self, id: DeviceId) -> Result<(), RoutingError> {
        self.select(id, Direction::Output)
    }

    /// Changes the selection under the lifecycle lock, so a start in progress
    /// finishes first and is then restarted on the new device.
    fn select(&self, id: DeviceId, direction: Direction) -> Result<(), RoutingError> {
        audio::find_device(self.host.as_ref(), id, direction)?;

        let mut lifecycle = self.lifecycle.lock();
        {
            let mut selection = self.selection.lock();
            match direction {
                Direction::Input => selection.input = id,
                Direction::Output => selection.output = id,
            }
        }
        info!(id = id.0, %direction, "Selected device.");
        self.restart_locked(&mut lifecycle)
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::mock,
        clip::DecodedClip,
        config::RetriggerBehavior,
        testutil::eventually,
    };

    const BLOCK_FRAMES: usize = 64;

    fn settings() -> RoutingSettings {
        RoutingSettings {
            block_frames: BLOCK_FRAMES,
            ..Default::default()
        }
    }

    fn router(host: &mock::Host) -> (Router, Arc<PlaybackSet>) {
        router_with(host, settings())
    }

    fn router_with(host: &mock::Host, settings: RoutingSettings) -> (Router, Arc<PlaybackSet>) {
        let playback = Arc::new(PlaybackSet::new(
            settings.clip_format(),
            RetriggerBehavior::Polyphonic,
            0,
        ));
        let router = Router::new(
            Arc::new(host.clone()),
            playback.clone(),
            settings,
            DeviceSelection {
                input: mock::MICROPHONE_ID,
                output: mock::CABLE_ID,
            },
        );
        (router, playback)
    }

    fn clip(name: &str, value: i16, frames: usize) -> DecodedClip {
        let format = settings().clip_format();
        DecodedClip::new(name, vec![value; frames * 2], format, format, 1.0)
    }

    #[test]
    fn test_start_and_stop() {
        let host = mock::Host::loopback();
        host.set_input_value(1000);
        let (router, _) = router(&host);

        router.start().unwrap();
        assert_eq!(router.state(), RoutingState::Running);
        assert_eq!(host.open_streams(), 2);
        assert!(router.session_config().is_some());

        // Starting again is a no-op.
        router.start().unwrap();
        assert_eq!(host.open_streams(), 2);

        eventually(|| host.blocks_read() >= 3, "No blocks were routed");
        router.stop();
        assert_eq!(router.state(), RoutingState::Stopped);
        assert_eq!(host.open_streams(), 0);
        assert!(router.session_config().is_none());

        // Nothing is playing, so the input passes straight through.
        let output = host.take_output();
        assert!(!output.is_empty());
        assert_eq!(output.len() % (BLOCK_FRAMES * 2), 0);
        assert!(output.iter().all(|s| *s == 1000));

        router.stop();
        assert_eq!(router.state(), RoutingState::Stopped);
    }

    #[test]
    fn test_start_failure() {
        let host = mock::Host::loopback();
        host.fail_open(mock::CABLE_ID);
        let (router, _) = router(&host);

        assert!(matches!(
            router.start(),
            Err(RoutingError::Start(DeviceError::Open {
                id: mock::CABLE_ID,
                direction: Direction::Output,
                ..
            }))
        ));
        assert_eq!(router.state(), RoutingState::Failed);
        assert_eq!(host.open_streams(), 0);

        router.stop();
        assert_eq!(router.state(), RoutingState::Stopped);
    }

    #[test]
    fn test_read_failure_fails_run() {
        let host = mock::Host::loopback();
        host.fail_reads_after(5);
        let (router, _) = router(&host);

        router.start().unwrap();
        eventually(
            || router.state() == RoutingState::Failed,
            "Routing never failed",
        );
        eventually(|| host.open_streams() == 0, "Streams were not released");

        router.stop();
        assert_eq!(router.state(), RoutingState::Stopped);
    }

    #[test]
    fn test_restart_after_failure() {
        let host = mock::Host::loopback();
        host.fail_open(mock::CABLE_ID);
        let (router, _) = router(&host);

        assert!(router.start().is_err());
        router.select_output(mock::SPEAKERS_ID).unwrap();
        // Selecting doesn't restart a router that isn't running.
        assert_eq!(router.state(), RoutingState::Failed);

        router.start().unwrap();
        assert_eq!(router.state(), RoutingState::Running);
        assert_eq!(router.session_config().unwrap().output, mock::SPEAKERS_ID);
    }

    #[test]
    fn test_select_restarts_running_router() {
        let host = mock::Host::loopback();
        let (router, _) = router(&host);

        router.start().unwrap();
        router.select_output(mock::SPEAKERS_ID).unwrap();
        assert_eq!(router.state(), RoutingState::Running);
        assert_eq!(host.open_streams(), 2);
        assert_eq!(router.session_config().unwrap().output, mock::SPEAKERS_ID);

        router.select_input(mock::HEADSET_ID).unwrap();
        assert_eq!(router.session_config().unwrap().input, mock::HEADSET_ID);
        assert_eq!(host.open_streams(), 2);
    }

    #[test]
    fn test_select_validates_device() {
        let host = mock::Host::loopback();
        let (router, _) = router(&host);

        assert!(matches!(
            router.select_input(mock::SPEAKERS_ID),
            Err(RoutingError::Device(DeviceError::WrongDirection { .. }))
        ));
        assert!(matches!(
            router.select_output(DeviceId(77)),
            Err(RoutingError::Device(DeviceError::NotFound(_)))
        ));
        assert_eq!(router.selection().input, mock::MICROPHONE_ID);
        assert_eq!(router.selection().output, mock::CABLE_ID);
    }

    #[test]
    fn test_select_during_start_restarts_on_new_device() {
        let host = mock::Host::loopback();
        host.set_open_delay(Duration::from_millis(200));
        let (router, _) = router(&host);

        thread::scope(|s| {
            let starting = s.spawn(|| router.start());
            eventually(
                || router.state() == RoutingState::Starting,
                "Routing never began starting",
            );
            router.select_output(mock::SPEAKERS_ID).unwrap();
            starting.join().unwrap().unwrap();
        });

        assert_eq!(router.state(), RoutingState::Running);
        assert_eq!(router.selection().output, mock::SPEAKERS_ID);
        assert_eq!(router.session_config().unwrap().output, mock::SPEAKERS_ID);
        assert_eq!(host.open_streams(), 2);
    }

    #[test]
    fn test_overflow_keeps_routing() {
        let host = mock::Host::loopback();
        host.set_input_value(1000);
        host.overflow_every(2);
        let (router, _) = router(&host);

        router.start().unwrap();
        eventually(|| host.blocks_read() >= 8, "Not enough blocks routed");
        assert_eq!(router.state(), RoutingState::Running);
        router.stop();

        // Every block read was written, overflowed or not.
        let output = host.take_output();
        assert_eq!(output.len(), host.blocks_read() * BLOCK_FRAMES * 2);
        assert!(output.iter().all(|s| *s == 1000));
    }

    #[test]
    fn test_stop_detaches_stuck_loop() {
        let host = mock::Host::loopback();
        host.stall_reads(Duration::from_secs(2));
        let (router, _) = router_with(
            &host,
            RoutingSettings {
                stop_timeout: Duration::from_millis(50),
                ..settings()
            },
        );

        router.start().unwrap();
        let stopping = std::time::Instant::now();
        router.stop();
        assert!(stopping.elapsed() < Duration::from_secs(1));
        assert_eq!(router.state(), RoutingState::Stopped);
        assert_eq!(host.open_streams(), 0);

        // The detached loop doesn't get in the way of a new run.
        host.stall_reads(Duration::ZERO);
        router.start().unwrap();
        let read = host.blocks_read();
        eventually(|| host.blocks_read() > read, "New run never read");
        assert_eq!(router.state(), RoutingState::Running);
        router.stop();
    }

    #[test]
    fn test_clips_are_mixed_and_clipped() {
        let host = mock::Host::loopback();
        host.set_input_value(i16::MAX);
        let (router, playback) = router(&host);

        playback.insert(&clip("a", i16::MAX, BLOCK_FRAMES * 4)).unwrap();
        playback.insert(&clip("b", i16::MAX, BLOCK_FRAMES * 4)).unwrap();
        router.start().unwrap();

        eventually(|| !playback.is_any_playing(), "Clips never drained");
        router.stop();

        let output = host.take_output();
        assert!(output.len() >= BLOCK_FRAMES * 2 * 4);
        assert!(output.iter().all(|s| *s == i16::MAX));
    }

    #[test]
    fn test_clip_is_mixed_with_gain() {
        let host = mock::Host::loopback();
        host.set_input_value(1000);
        let (router, playback) = router(&host);

        playback.insert(&clip("a", 100, BLOCK_FRAMES)).unwrap();
        router.start().unwrap();
        eventually(|| !playback.is_any_playing(), "Clip never drained");
        eventually(|| host.blocks_read() >= 2, "Not enough blocks routed");
        router.stop();

        let output = host.take_output();
        let block = BLOCK_FRAMES * 2;
        assert!(output[..block].iter().all(|s| *s == 900));
        assert!(output[block..].iter().all(|s| *s == 1000));
    }
}
