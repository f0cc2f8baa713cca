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
    io::Write,
    path::{Path, PathBuf},
};

use config::{Config, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Audio, ConfigError, SoundCatalog};
use crate::clip::Volume;

/// A sound as written in the configuration file.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Sound {
    pub name: String,
    /// Path to the audio file, relative to the configuration file.
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keybind: Option<String>,
}

/// A YAML representation of the soundboard.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Soundboard {
    #[serde(default)]
    audio: Audio,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_volume: Option<u32>,
    #[serde(default)]
    sounds: Vec<Sound>,

    /// The directory sound files are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Soundboard {
    pub fn new(audio: Audio, default_volume: Option<u32>, sounds: Vec<Sound>) -> Soundboard {
        Soundboard {
            audio,
            default_volume,
            sounds,
            base_dir: PathBuf::new(),
        }
    }

    /// Deserializes a file from the path into a soundboard configuration.
    pub fn deserialize(path: &Path) -> Result<Soundboard, ConfigError> {
        let mut soundboard = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Soundboard>()?;
        soundboard.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        soundboard.audio.validate()?;
        debug!(path = ?path, sounds = soundboard.sounds.len(), "Loaded configuration.");
        Ok(soundboard)
    }

    /// Serializes the soundboard and saves it to the given path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let serialized = serde_yml::to_string(self)?;
        let save_error = |source| ConfigError::Save {
            path: path.to_path_buf(),
            source,
        };

        let mut file = std::fs::File::create(path).map_err(save_error)?;
        file.write_all(serialized.as_bytes()).map_err(save_error)?;
        info!(path = ?path, "Saved configuration.");
        Ok(())
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn sounds(&self) -> &[Sound] {
        &self.sounds
    }

    pub fn default_volume(&self) -> Result<Volume, ConfigError> {
        match self.default_volume {
            Some(percent) => {
                Volume::try_from(percent).map_err(|source| ConfigError::InvalidVolume {
                    sound: "default".to_string(),
                    source,
                })
            }
            None => Ok(Volume::default()),
        }
    }

    /// Resolves a sound's file against the configuration's directory.
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.base_dir.join(file)
        }
    }

    /// Builds the catalog, validating volumes and keybinds.
    pub fn catalog(&self) -> Result<SoundCatalog, ConfigError> {
        let mut catalog = SoundCatalog::new(self.default_volume()?);
        for sound in &self.sounds {
            let volume = sound
                .volume
                .map(|percent| {
                    Volume::try_from(percent).map_err(|source| ConfigError::InvalidVolume {
                        sound: sound.name.clone(),
                        source,
                    })
                })
                .transpose()?;
            catalog.add(
                &sound.name,
                &self.resolve(&sound.file),
                volume,
                sound.keybind.as_deref(),
            )?;
        }
        Ok(catalog)
    }

    /// Copies volumes and keybinds from the catalog back into the file
    /// representation so they can be saved.
    pub fn update_from(&mut self, catalog: &SoundCatalog) {
        for sound in self.sounds.iter_mut() {
            if let Some(entry) = catalog.get(&sound.name) {
                sound.volume = Some(u32::from(entry.volume));
                sound.keybind = entry.keybind.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetriggerBehavior;

    const CONFIG: &str = r#"
audio:
  host: mock
  output_device: cable
  block_size: 256
  retrigger: cut
default_volume: 70
sounds:
  - name: Airhorn
    file: sounds/airhorn.wav
    keybind: "1"
  - name: rimshot
    file: /abs/rimshot.mp3
    volume: 25
"#;

    fn write(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("micmix.yaml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_deserialize() {
        let (dir, path) = write(CONFIG);
        let soundboard = Soundboard::deserialize(&path).unwrap();

        assert_eq!(soundboard.audio().host(), "mock");
        assert_eq!(soundboard.audio().output_device(), "cable");
        assert_eq!(soundboard.audio().block_size(), 256);
        assert_eq!(soundboard.audio().retrigger(), RetriggerBehavior::Cut);
        assert_eq!(soundboard.default_volume().unwrap().percent(), 70);

        let catalog = soundboard.catalog().unwrap();
        let airhorn = catalog.get("Airhorn").unwrap();
        assert_eq!(airhorn.path, dir.path().join("sounds/airhorn.wav"));
        assert_eq!(airhorn.volume.percent(), 70);
        assert_eq!(catalog.sound_for_key("1"), Some("Airhorn"));

        let rimshot = catalog.get("rimshot").unwrap();
        assert_eq!(rimshot.path, PathBuf::from("/abs/rimshot.mp3"));
        assert_eq!(rimshot.volume.percent(), 25);
    }

    #[test]
    fn test_invalid_volume() {
        let (_dir, path) = write(
            r#"
sounds:
  - name: loud
    file: loud.wav
    volume: 150
"#,
        );
        let soundboard = Soundboard::deserialize(&path).unwrap();
        assert!(matches!(
            soundboard.catalog(),
            Err(ConfigError::InvalidVolume { sound, .. }) if sound == "loud"
        ));
    }

    #[test]
    fn test_duplicate_keybind() {
        let (_dir, path) = write(
            r#"
sounds:
  - name: a
    file: a.wav
    keybind: Q
  - name: b
    file: b.wav
    keybind: " q"
"#,
        );
        let soundboard = Soundboard::deserialize(&path).unwrap();
        assert!(matches!(
            soundboard.catalog(),
            Err(ConfigError::DuplicateKeybind { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Soundboard::deserialize(&dir.path().join("nope.yaml")),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_save_round_trip() {
        let (dir, path) = write(CONFIG);
        let mut soundboard = Soundboard::deserialize(&path).unwrap();
        let mut catalog = soundboard.catalog().unwrap();
        catalog.set_volume("rimshot", 90).unwrap();
        soundboard.update_from(&catalog);

        let saved = dir.path().join("saved.yaml");
        soundboard.save(&saved).unwrap();

        let reloaded = Soundboard::deserialize(&saved).unwrap();
        let catalog = reloaded.catalog().unwrap();
        assert_eq!(catalog.get("rimshot").unwrap().volume.percent(), 90);
        assert_eq!(catalog.get("Airhorn").unwrap().volume.percent(), 70);
        assert_eq!(reloaded.audio().block_size(), 256);
    }
}
