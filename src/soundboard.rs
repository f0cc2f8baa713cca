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
//! The soundboard facade used by the CLI and hotkey controller.

use std::{
    collections::BTreeSet,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::{
    audio::{self, DeviceError, DeviceId, DeviceInfo, Direction, Host},
    clip::Volume,
    config::{self, ConfigError, SoundCatalog},
    playback::{CatalogClipProvider, PlaybackSet},
    routing::{DeviceSelection, Router, RoutingError, RoutingSettings, RoutingState},
};

mod error;

pub use error::SoundboardError;

/// Plays sounds from a catalog over a routed microphone.
pub struct Soundboard {
    host: Arc<dyn Host>,
    catalog: Arc<RwLock<SoundCatalog>>,
    provider: CatalogClipProvider,
    playback: Arc<PlaybackSet>,
    router: Router,
    unsaved: AtomicBool,
}

impl Soundboard {
    /// Builds a soundboard from a loaded configuration, using the host it names.
    pub fn from_config(config: &config::Soundboard) -> Result<Soundboard, SoundboardError> {
        let host = audio::get_host(config.audio().host());
        Soundboard::new(host, config.catalog()?, config.audio())
    }

    pub fn new(
        host: Arc<dyn Host>,
        catalog: SoundCatalog,
        audio: &config::Audio,
    ) -> Result<Soundboard, SoundboardError> {
        audio.validate()?;
        let settings = RoutingSettings::from_config(audio)?;
        let playback = Arc::new(PlaybackSet::new(
            settings.clip_format(),
            audio.retrigger(),
            audio.max_instances(),
        ));
        let selection = initial_selection(host.as_ref(), audio)?;
        let catalog = Arc::new(RwLock::new(catalog));

        info!(
            host = %host,
            input = selection.input.0,
            output = selection.output.0,
            sounds = catalog.read().len(),
            "Soundboard ready."
        );

        Ok(Soundboard {
            provider: CatalogClipProvider::new(catalog.clone()),
            router: Router::new(host.clone(), playback.clone(), settings, selection),
            host,
            catalog,
            playback,
            unsaved: AtomicBool::new(false),
        })
    }

    /// Plays the named sound. The sound is decoded on the calling thread.
    /// Problems are logged rather than returned. Sounds played while routing
    /// isn't running wait and are heard once it starts.
    pub fn play(&self, name: &str) {
        if self.playback.trigger(name, &self.provider).is_some() && !self.is_routing() {
            warn!(
                sound = name,
                routing = %self.routing_state(),
                "Routing isn't running, the sound will play once it starts."
            );
        }
    }

    /// Plays the sound bound to the given key. Returns false if the key isn't bound.
    pub fn play_key(&self, key: &str) -> bool {
        let name = self.sound_for_key(key);
        match name {
            Some(name) => {
                self.play(&name);
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        self.playback.stop_all();
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_any_playing()
    }

    pub fn currently_playing(&self) -> BTreeSet<String> {
        self.playback.current_names()
    }

    pub fn list_input_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        list(self.host.as_ref(), Direction::Input)
    }

    pub fn list_output_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        list(self.host.as_ref(), Direction::Output)
    }

    pub fn select_input_device(&self, id: DeviceId) -> Result<(), RoutingError> {
        self.router.select_input(id)
    }

    pub fn select_output_device(&self, id: DeviceId) -> Result<(), RoutingError> {
        self.router.select_output(id)
    }

    pub fn selection(&self) -> DeviceSelection {
        self.router.selection()
    }

    pub fn start_routing(&self) -> Result<(), RoutingError> {
        self.router.start()
    }

    pub fn stop_routing(&self) {
        self.router.stop()
    }

    pub fn is_routing(&self) -> bool {
        self.router.is_running()
    }

    pub fn routing_state(&self) -> RoutingState {
        self.router.state()
    }

    /// Sets a sound's volume. Takes effect the next time the sound is played.
    pub fn set_volume(&self, name: &str, percent: u32) -> Result<Volume, ConfigError> {
        let volume = self.catalog.write().set_volume(name, percent)?;
        self.unsaved.store(true, Ordering::Relaxed);
        info!(sound = name, volume = volume.percent(), "Set volume.");
        Ok(volume)
    }

    /// True if volumes changed since the soundboard was built or last saved.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved.load(Ordering::Relaxed)
    }

    pub fn sound_for_key(&self, key: &str) -> Option<String> {
        self.catalog.read().sound_for_key(key).map(str::to_string)
    }

    pub fn sound_names(&self) -> Vec<String> {
        self.catalog.read().names()
    }

    pub fn playback(&self) -> &Arc<PlaybackSet> {
        &self.playback
    }

    /// Writes the catalog's volumes and keybinds back to the configuration file.
    pub fn save_config(
        &self,
        config: &mut config::Soundboard,
        path: &Path,
    ) -> Result<(), ConfigError> {
        config.update_from(&self.catalog.read());
        config.save(path)?;
        self.unsaved.store(false, Ordering::Relaxed);
        info!(path = %path.display(), "Saved configuration.");
        Ok(())
    }
}

fn list(host: &dyn Host, direction: Direction) -> Result<Vec<DeviceInfo>, DeviceError> {
    Ok(audio::list_devices(host, direction)?
        .iter()
        .map(|device| device.info(direction))
        .collect())
}

/// The configured input by name, falling back to the default input, and the
/// preferred output, falling back to the default output.
fn initial_selection(
    host: &dyn Host,
    audio: &config::Audio,
) -> Result<DeviceSelection, DeviceError> {
    let default_input = || {
        host.default_device(Direction::Input)?
            .ok_or(DeviceError::NoDefault(Direction::Input))
    };

    let input = match audio.input_device() {
        Some(name) => match audio::list_devices(host, Direction::Input)?
            .into_iter()
            .find(|device| device.name.trim() == name.trim())
        {
            Some(device) => device.id,
            None => {
                warn!(
                    device = name,
                    "Input device not found, using the default input."
                );
                default_input()?
            }
        },
        None => default_input()?,
    };
    let output = audio::resolve_output(host, audio.output_device())?;

    Ok(DeviceSelection { input, output })
}
