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
use std::error::Error;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, warn, Level};

use crate::audio::DeviceId;
use crate::soundboard::Soundboard;

pub mod keyboard;

/// Controller events that will trigger behavior in the soundboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Plays the sound with the given name.
    Play(String),

    /// Plays the sound bound to the given key.
    PlayKey(String),

    /// Stops every playing sound. Routing keeps running.
    StopAll,

    /// Starts or stops routing the microphone.
    Routing(bool),

    /// Sets a sound's volume in percent.
    Volume(String, u32),

    SelectInput(DeviceId),

    SelectOutput(DeviceId),

    /// Logs the available devices.
    Devices,

    /// Logs the routing state and the sounds that are playing.
    Status,

    /// Stops the controller.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Controls a soundboard.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(soundboard: Arc<Soundboard>, driver: Arc<dyn Driver>) -> Controller {
        Controller {
            handle: tokio::spawn(
                async move { Controller::trigger_events(soundboard, driver).await },
            ),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers soundboard events by watching the driver and getting events from it.
    /// Routing is stopped once the driver quits or goes away.
    async fn trigger_events(soundboard: Arc<Soundboard>, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(sounds = soundboard.sound_names().len(), "Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(event = format!("{:?}", event), "Received event.");
            if event == Event::Quit {
                break;
            }

            // Playing decodes the clip and routing changes wait on the audio
            // thread, so neither belongs on the runtime.
            let soundboard = soundboard.clone();
            match tokio::task::spawn_blocking(move || handle(&soundboard, event)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Error talking to soundboard: {}", e),
                Err(e) => error!("Soundboard task failed: {}", e),
            }
        }

        info!("Controller closing.");
        drop(events_rx);
        if let Err(e) = join_handle.await {
            error!("Error waiting for event monitor to stop: {}", e);
        }

        if let Err(e) = tokio::task::spawn_blocking(move || soundboard.stop_routing()).await {
            error!("Error stopping routing: {}", e);
        }
    }
}

fn handle(soundboard: &Soundboard, event: Event) -> Result<(), Box<dyn Error + Send + Sync>> {
    match event {
        Event::Play(name) => soundboard.play(&name),
        Event::PlayKey(key) => {
            if !soundboard.play_key(&key) {
                warn!(key = key.as_str(), "No sound is bound to key.");
            }
        }
        Event::StopAll => soundboard.stop_all(),
        Event::Volume(name, percent) => {
            soundboard.set_volume(&name, percent)?;
        }
        Event::Routing(true) => soundboard.start_routing()?,
        Event::Routing(false) => soundboard.stop_routing(),
        Event::SelectInput(id) => soundboard.select_input_device(id)?,
        Event::SelectOutput(id) => soundboard.select_output_device(id)?,
        Event::Devices => {
            for device in soundboard.list_input_devices()? {
                info!(direction = "input", device = %device, "Device.");
            }
            for device in soundboard.list_output_devices()? {
                info!(direction = "output", device = %device, "Device.");
            }
        }
        Event::Status => {
            let selection = soundboard.selection();
            info!(
                routing = %soundboard.routing_state(),
                input = selection.input.0,
                output = selection.output.0,
                playing = ?soundboard.currently_playing(),
                "Status."
            );
        }
        Event::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::{error::Error, io, sync::Arc};

    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use crate::{
        audio::{mock, DeviceId},
        clip::Volume,
        config::{self, SoundCatalog},
        routing::RoutingState,
        soundboard::Soundboard,
        testutil::{eventually, square_wave, write_wav},
    };

    use super::{Driver, Event};

    /// Forwards events sent by the test until the test drops its sender.
    struct ScriptDriver {
        events: crossbeam_channel::Receiver<Event>,
    }

    impl Driver for ScriptDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let events = self.events.clone();
            tokio::task::spawn_blocking(move || {
                for event in events.iter() {
                    if events_tx.blocking_send(event).is_err() {
                        break;
                    }
                }
                Ok(())
            })
        }
    }

    fn soundboard(dir: &tempfile::TempDir, host: &mock::Host) -> Result<Soundboard, Box<dyn Error>> {
        let path = dir.path().join("a.wav");
        write_wav(&path, &square_wave(441, 44100, 44100), 1, 44100)?;

        let mut catalog = SoundCatalog::new(Volume::default());
        catalog.add("A", &path, None, Some("a"))?;
        Ok(Soundboard::new(
            Arc::new(host.clone()),
            catalog,
            &config::Audio::default(),
        )?)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let host = mock::Host::loopback();
        let soundboard = Arc::new(soundboard(&dir, &host)?);
        let (script, events) = crossbeam_channel::unbounded();
        let mut controller =
            super::Controller::new(soundboard.clone(), Arc::new(ScriptDriver { events }));

        script.send(Event::Routing(true))?;
        eventually(|| soundboard.is_routing(), "Routing never started");

        script.send(Event::PlayKey("A".to_string()))?;
        eventually(|| soundboard.is_playing(), "Sound never started playing");

        // A bad device is logged and doesn't stop the controller.
        script.send(Event::SelectInput(DeviceId(99)))?;
        script.send(Event::SelectOutput(mock::SPEAKERS_ID))?;
        eventually(
            || soundboard.selection().output == mock::SPEAKERS_ID,
            "Output was never selected",
        );
        assert!(soundboard.is_routing());

        script.send(Event::Volume("A".to_string(), 101))?;
        script.send(Event::Volume("A".to_string(), 40))?;
        eventually(|| soundboard.has_unsaved_changes(), "Volume was never set");

        script.send(Event::Status)?;
        script.send(Event::Devices)?;
        script.send(Event::StopAll)?;
        eventually(|| !soundboard.is_playing(), "Sound never stopped playing");

        script.send(Event::Quit)?;
        drop(script);
        assert!(
            controller.join().await.is_ok(),
            "Error waiting for controller",
        );
        assert_eq!(soundboard.routing_state(), RoutingState::Stopped);
        assert_eq!(host.open_streams(), 0);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller_stops_when_driver_closes() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let host = mock::Host::loopback();
        let soundboard = Arc::new(soundboard(&dir, &host)?);
        let (script, events) = crossbeam_channel::unbounded();
        let mut controller =
            super::Controller::new(soundboard.clone(), Arc::new(ScriptDriver { events }));

        script.send(Event::Routing(true))?;
        script.send(Event::Play("A".to_string()))?;
        drop(script);

        assert!(controller.join().await.is_ok());
        assert!(!soundboard.is_routing());
        assert_eq!(host.open_streams(), 0);

        Ok(())
    }
}
