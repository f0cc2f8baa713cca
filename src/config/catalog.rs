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
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use super::ConfigError;
use crate::{
    clip::Volume,
    playback::{SoundEntry, SoundLookup},
};

/// A sound in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSound {
    pub name: String,
    pub path: PathBuf,
    pub volume: Volume,
    pub keybind: Option<String>,
}

/// The sounds the soundboard knows about, keyed by name, along with the keys
/// that trigger them.
#[derive(Debug, Clone, Default)]
pub struct SoundCatalog {
    default_volume: Volume,
    sounds: BTreeMap<String, CatalogSound>,
    /// Normalized key to sound name.
    keybinds: BTreeMap<String, String>,
}

/// Keybinds are compared trimmed and lowercased. Blank keybinds are no keybind.
pub fn normalize_keybind(key: &str) -> Option<String> {
    let key = key.trim().to_lowercase();
    (!key.is_empty()).then_some(key)
}

impl SoundCatalog {
    pub fn new(default_volume: Volume) -> SoundCatalog {
        SoundCatalog {
            default_volume,
            ..Default::default()
        }
    }

    pub fn default_volume(&self) -> Volume {
        self.default_volume
    }

    /// Adds a sound. Volume defaults to the catalog's default volume.
    pub fn add(
        &mut self,
        name: &str,
        path: &Path,
        volume: Option<Volume>,
        keybind: Option<&str>,
    ) -> Result<(), ConfigError> {
        if self.sounds.contains_key(name) {
            return Err(ConfigError::DuplicateSound(name.to_string()));
        }

        self.sounds.insert(
            name.to_string(),
            CatalogSound {
                name: name.to_string(),
                path: path.to_path_buf(),
                volume: volume.unwrap_or(self.default_volume),
                keybind: None,
            },
        );
        if let Err(e) = self.set_keybind(name, keybind) {
            self.sounds.remove(name);
            return Err(e);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CatalogSound> {
        self.sounds.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogSound> {
        self.sounds.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.sounds.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    /// Sets the volume of a sound, rejecting anything outside 0-100.
    pub fn set_volume(&mut self, name: &str, percent: u32) -> Result<Volume, ConfigError> {
        let volume = Volume::try_from(percent).map_err(|source| ConfigError::InvalidVolume {
            sound: name.to_string(),
            source,
        })?;
        let sound = self
            .sounds
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownSound(name.to_string()))?;
        sound.volume = volume;
        Ok(volume)
    }

    /// Binds a key to a sound, replacing its previous key. A key can only be
    /// bound to one sound.
    pub fn set_keybind(&mut self, name: &str, key: Option<&str>) -> Result<(), ConfigError> {
        if !self.sounds.contains_key(name) {
            return Err(ConfigError::UnknownSound(name.to_string()));
        }
        let key = key.and_then(normalize_keybind);

        if let Some(key) = &key {
            if let Some(existing) = self.keybinds.get(key) {
                if existing != name {
                    return Err(ConfigError::DuplicateKeybind {
                        key: key.clone(),
                        first: existing.clone(),
                        second: name.to_string(),
                    });
                }
            }
        }

        let Some(sound) = self.sounds.get_mut(name) else {
            return Err(ConfigError::UnknownSound(name.to_string()));
        };
        if let Some(previous) = sound.keybind.take() {
            self.keybinds.remove(&previous);
        }
        if let Some(key) = key {
            self.keybinds.insert(key.clone(), name.to_string());
            sound.keybind = Some(key);
        }
        Ok(())
    }

    /// The sound bound to the given key, if any.
    pub fn sound_for_key(&self, key: &str) -> Option<&str> {
        normalize_keybind(key)
            .and_then(|key| self.keybinds.get(&key))
            .map(|name| name.as_str())
    }
}

impl SoundLookup for SoundCatalog {
    fn get_sound(&self, name: &str) -> Option<SoundEntry> {
        self.sounds.get(name).map(|sound| SoundEntry {
            path: sound.path.clone(),
            volume: sound.volume,
        })
    }
}
