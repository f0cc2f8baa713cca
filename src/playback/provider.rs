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
use std::{path::PathBuf, sync::Arc};

use parking_lot::RwLock;

use super::TriggerError;
use crate::clip::{self, ClipFormat, DecodedClip, Volume};

/// A sound as known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundEntry {
    pub path: PathBuf,
    pub volume: Volume,
}

/// Looks sounds up by name.
pub trait SoundLookup: Send + Sync {
    fn get_sound(&self, name: &str) -> Option<SoundEntry>;
}

impl<T: SoundLookup> SoundLookup for RwLock<T> {
    fn get_sound(&self, name: &str) -> Option<SoundEntry> {
        self.read().get_sound(name)
    }
}

impl<T: SoundLookup + ?Sized> SoundLookup for Arc<T> {
    fn get_sound(&self, name: &str) -> Option<SoundEntry> {
        self.as_ref().get_sound(name)
    }
}

/// Produces decoded clips for sound names.
pub trait ClipProvider: Send + Sync {
    fn clip(&self, name: &str, format: ClipFormat) -> Result<DecodedClip, TriggerError>;
}

/// Resolves sounds through a catalog and decodes them from disk every time.
pub struct CatalogClipProvider {
    lookup: Arc<dyn SoundLookup>,
}

impl CatalogClipProvider {
    pub fn new(lookup: Arc<dyn SoundLookup>) -> CatalogClipProvider {
        CatalogClipProvider { lookup }
    }
}

impl ClipProvider for CatalogClipProvider {
    fn clip(&self, name: &str, format: ClipFormat) -> Result<DecodedClip, TriggerError> {
        let entry = self
            .lookup
            .get_sound(name)
            .ok_or_else(|| TriggerError::ClipNotFound(name.to_string()))?;

        if !entry.path.is_file() {
            return Err(TriggerError::FileMissing {
                name: name.to_string(),
                path: entry.path,
            });
        }

        clip::decode(name, &entry.path, format, entry.volume).map_err(|source| TriggerError::Clip {
            name: name.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::testutil::{square_wave, write_wav};

    struct Sounds(HashMap<String, SoundEntry>);

    impl SoundLookup for Sounds {
        fn get_sound(&self, name: &str) -> Option<SoundEntry> {
            self.0.get(name).cloned()
        }
    }

    const FORMAT: ClipFormat = ClipFormat {
        sample_rate: 44100,
        channels: 2,
    };

    #[test]
    fn test_catalog_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beep.wav");
        write_wav(&path, &square_wave(441, 44100, 4410), 1, 44100).unwrap();

        let mut sounds = HashMap::new();
        sounds.insert(
            "beep".to_string(),
            SoundEntry {
                path: path.clone(),
                volume: Volume::try_from(100).unwrap(),
            },
        );
        sounds.insert(
            "gone".to_string(),
            SoundEntry {
                path: dir.path().join("gone.wav"),
                volume: Volume::default(),
            },
        );
        let provider = CatalogClipProvider::new(Arc::new(RwLock::new(Sounds(sounds))));

        let clip = provider.clip("beep", FORMAT).unwrap();
        assert_eq!(clip.frames(), 4410);
        assert_eq!(clip.name(), "beep");

        assert!(matches!(
            provider.clip("nope", FORMAT),
            Err(TriggerError::ClipNotFound(name)) if name == "nope"
        ));
        assert!(matches!(
            provider.clip("gone", FORMAT),
            Err(TriggerError::FileMissing { .. })
        ));
    }
}
