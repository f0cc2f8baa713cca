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
use std::collections::BTreeSet;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::{ClipProvider, InstanceId, PlaybackInstance, TriggerError};
use crate::{
    clip::{ClipFormat, DecodedClip},
    config::RetriggerBehavior,
};

/// The clip instances that are currently playing.
pub struct PlaybackSet {
    format: ClipFormat,
    retrigger: RetriggerBehavior,
    /// Maximum number of concurrent instances, zero for no limit.
    max_instances: usize,
    instances: Mutex<Vec<PlaybackInstance>>,
}

impl PlaybackSet {
    pub fn new(
        format: ClipFormat,
        retrigger: RetriggerBehavior,
        max_instances: usize,
    ) -> PlaybackSet {
        PlaybackSet {
            format,
            retrigger,
            max_instances,
            instances: Mutex::new(Vec::new()),
        }
    }

    /// The format every clip must be in.
    pub fn format(&self) -> ClipFormat {
        self.format
    }

    /// Resolves and decodes the named clip, then starts playing it. Decoding
    /// happens on the calling thread before the set is locked. Failures are
    /// logged and leave the set untouched.
    pub fn trigger(&self, name: &str, provider: &dyn ClipProvider) -> Option<InstanceId> {
        let result = provider
            .clip(name, self.format)
            .and_then(|clip| self.insert(&clip));

        match result {
            Ok(id) => Some(id),
            Err(e) => {
                error!(sound = name, err = %e, "Unable to play sound");
                None
            }
        }
    }

    /// Starts playing an already decoded clip.
    pub fn insert(&self, clip: &DecodedClip) -> Result<InstanceId, TriggerError> {
        if clip.format() != self.format {
            return Err(TriggerError::Format {
                name: clip.name().to_string(),
                expected: self.format,
                actual: clip.format(),
            });
        }

        let instance = PlaybackInstance::new(clip);
        let id = instance.id();

        let mut instances = self.instances.lock();
        if self.retrigger == RetriggerBehavior::Cut {
            let before = instances.len();
            instances.retain(|i| i.name() != clip.name());
            if instances.len() < before {
                debug!(sound = clip.name(), "Cut previous instance");
            }
        }

        if self.max_instances > 0 && instances.len() >= self.max_instances {
            if let Some(oldest) = instances
                .iter()
                .min_by_key(|i| i.started())
                .map(|i| i.id())
            {
                instances.retain(|i| i.id() != oldest);
                warn!(
                    max_instances = self.max_instances,
                    "Instance limit reached, stealing oldest"
                );
            }
        }

        instances.push(instance);
        drop(instances);

        info!(sound = clip.name(), id = %id, frames = clip.frames(), "Playing sound.");
        Ok(id)
    }

    /// Stops everything that's playing.
    pub fn stop_all(&self) {
        let stopped = {
            let mut instances = self.instances.lock();
            let stopped = instances.len();
            instances.clear();
            stopped
        };
        if stopped > 0 {
            info!(stopped, "Stopped all sounds.");
        }
    }

    /// Stops one instance. Returns false if it already finished.
    pub fn stop_instance(&self, id: InstanceId) -> bool {
        let mut instances = self.instances.lock();
        let before = instances.len();
        instances.retain(|i| i.id() != id);
        before != instances.len()
    }

    pub fn is_any_playing(&self) -> bool {
        !self.instances.lock().is_empty()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }

    /// Names of everything playing.
    pub fn current_names(&self) -> BTreeSet<String> {
        self.instances
            .lock()
            .iter()
            .map(|i| i.name().to_string())
            .collect()
    }

    /// Ids of the playing instances of the given sound, oldest first.
    pub fn instances_of(&self, name: &str) -> Vec<InstanceId> {
        self.instances
            .lock()
            .iter()
            .filter(|i| i.name() == name)
            .map(|i| i.id())
            .collect()
    }

    /// Mixes the next block of every instance. Returns None if nothing was
    /// playing when called.
    pub fn consume_block(&self, frames: usize) -> Option<Vec<i32>> {
        let mut mix = Vec::new();
        self.consume_block_into(frames, &mut mix).then_some(mix)
    }

    /// Mixes the next block of every instance into `mix`, which is resized to
    /// exactly `frames` frames. Instances that run out are padded with silence
    /// and removed. Returns false, leaving `mix` alone, if the set was empty.
    pub fn consume_block_into(&self, frames: usize, mix: &mut Vec<i32>) -> bool {
        let mut instances = self.instances.lock();
        if instances.is_empty() {
            return false;
        }

        mix.clear();
        mix.resize(frames * usize::from(self.format.channels), 0);
        for instance in instances.iter_mut() {
            instance.mix_into(mix, frames);
        }
        instances.retain(|i| !i.is_finished());
        true
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc, thread};

    use super::*;

    const FORMAT: ClipFormat = ClipFormat {
        sample_rate: 8000,
        channels: 2,
    };

    struct Clips(HashMap<String, DecodedClip>);

    impl Clips {
        fn new(clips: &[(&str, Vec<i16>)]) -> Clips {
            Clips(
                clips
                    .iter()
                    .map(|(name, samples)| (name.to_string(), clip(name, samples.clone())))
                    .collect(),
            )
        }
    }

    impl ClipProvider for Clips {
        fn clip(&self, name: &str, _: ClipFormat) -> Result<DecodedClip, TriggerError> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| TriggerError::ClipNotFound(name.to_string()))
        }
    }

    fn clip(name: &str, samples: Vec<i16>) -> DecodedClip {
        DecodedClip::new(name, samples, FORMAT, FORMAT, 1.0)
    }

    fn ramp(frames: usize, start: i16) -> Vec<i16> {
        (0..frames * 2).map(|i| start + (i / 2) as i16).collect()
    }

    fn polyphonic() -> PlaybackSet {
        PlaybackSet::new(FORMAT, RetriggerBehavior::Polyphonic, 0)
    }

    #[test]
    fn test_consume_block_sizes() {
        let clips = Clips::new(&[("a", ramp(100, 1)), ("b", ramp(7, 1)), ("c", ramp(33, 1))]);

        for frames in [1usize, 5, 64, 256, 1024] {
            for k in 0..=3 {
                let set = polyphonic();
                for name in ["a", "b", "c"].iter().take(k) {
                    assert!(set.trigger(name, &clips).is_some());
                }

                match set.consume_block(frames) {
                    Some(mix) => {
                        assert!(k > 0);
                        assert_eq!(mix.len(), frames * 2);
                    }
                    None => assert_eq!(k, 0),
                }
            }
        }
    }

    #[test]
    fn test_cursor_advances_exactly() {
        let samples = ramp(10, 1);
        let set = polyphonic();
        set.insert(&clip("a", samples.clone())).unwrap();

        let mut played = Vec::new();
        while let Some(mix) = set.consume_block(3) {
            played.extend(mix.into_iter().map(|s| s as i16));
        }

        // Four blocks of three frames, the last one padded with two frames of silence.
        assert_eq!(played.len(), 12 * 2);
        assert_eq!(&played[..20], samples.as_slice());
        assert!(played[20..].iter().all(|s| *s == 0));
    }

    #[test]
    fn test_short_instance_padded_and_removed() {
        let set = polyphonic();
        set.insert(&clip("short", ramp(2, 100))).unwrap();
        set.insert(&clip("long", ramp(10, 1))).unwrap();

        let mix = set.consume_block(4).unwrap();
        assert_eq!(mix, vec![101, 101, 103, 103, 3, 3, 4, 4]);
        assert_eq!(
            set.current_names(),
            BTreeSet::from(["long".to_string()])
        );

        let mix = set.consume_block(4).unwrap();
        assert_eq!(mix, vec![5, 5, 6, 6, 7, 7, 8, 8]);
    }

    #[test]
    fn test_mixing_is_order_independent() {
        let clips = vec![
            clip("a", ramp(50, -20)),
            clip("b", ramp(13, 7)),
            clip("c", vec![i16::MAX; 80]),
            clip("d", vec![i16::MIN; 60]),
        ];

        let forward = polyphonic();
        clips.iter().for_each(|c| {
            forward.insert(c).unwrap();
        });
        let backward = polyphonic();
        clips.iter().rev().for_each(|c| {
            backward.insert(c).unwrap();
        });

        for _ in 0..5 {
            assert_eq!(forward.consume_block(16), backward.consume_block(16));
        }
    }

    #[test]
    fn test_sums_do_not_overflow() {
        let set = polyphonic();
        for _ in 0..4 {
            set.insert(&clip("loud", vec![i16::MAX; 8])).unwrap();
        }
        let mix = set.consume_block(4).unwrap();
        assert!(mix.iter().all(|s| *s == 4 * i32::from(i16::MAX)));
    }

    #[test]
    fn test_stop_all() {
        let set = polyphonic();
        set.insert(&clip("a", ramp(100, 1))).unwrap();
        set.insert(&clip("b", ramp(100, 1))).unwrap();
        assert!(set.is_any_playing());

        set.stop_all();
        assert!(!set.is_any_playing());
        assert!(set.current_names().is_empty());
        assert_eq!(set.consume_block(8), None);
    }

    #[test]
    fn test_unknown_name_leaves_set_unchanged() {
        let clips = Clips::new(&[("a", ramp(100, 1))]);
        let set = polyphonic();

        assert_eq!(set.trigger("missing", &clips), None);
        assert!(!set.is_any_playing());

        set.trigger("a", &clips).unwrap();
        assert_eq!(set.trigger("missing", &clips), None);
        assert_eq!(set.instance_count(), 1);
    }

    #[test]
    fn test_polyphonic_retrigger_overlaps() {
        let clips = Clips::new(&[("a", ramp(100, 1))]);
        let set = polyphonic();

        let first = set.trigger("a", &clips).unwrap();
        set.consume_block(10).unwrap();
        let second = set.trigger("a", &clips).unwrap();
        assert_eq!(set.instances_of("a"), vec![first, second]);

        // The first instance is ten frames ahead of the second.
        let mix = set.consume_block(1).unwrap();
        assert_eq!(mix, vec![11 + 1, 11 + 1]);
    }

    #[test]
    fn test_cut_retrigger_replaces() {
        let clips = Clips::new(&[("a", ramp(100, 1)), ("b", ramp(100, 1))]);
        let set = PlaybackSet::new(FORMAT, RetriggerBehavior::Cut, 0);

        set.trigger("a", &clips).unwrap();
        set.trigger("b", &clips).unwrap();
        set.consume_block(10).unwrap();
        let second = set.trigger("a", &clips).unwrap();

        assert_eq!(set.instances_of("a"), vec![second]);
        assert_eq!(set.instance_count(), 2);
    }

    #[test]
    fn test_instance_limit_steals_oldest() {
        let set = PlaybackSet::new(FORMAT, RetriggerBehavior::Polyphonic, 2);
        let first = set.insert(&clip("a", ramp(100, 1))).unwrap();
        thread::sleep(std::time::Duration::from_millis(2));
        let second = set.insert(&clip("b", ramp(100, 1))).unwrap();
        thread::sleep(std::time::Duration::from_millis(2));
        let third = set.insert(&clip("c", ramp(100, 1))).unwrap();

        assert_eq!(set.instance_count(), 2);
        assert!(!set.stop_instance(first));
        assert!(set.stop_instance(second));
        assert_eq!(set.instances_of("c"), vec![third]);
    }

    #[test]
    fn test_format_mismatch_rejected() {
        let set = polyphonic();
        let mono = ClipFormat {
            sample_rate: 8000,
            channels: 1,
        };
        let clip = DecodedClip::new("mono", vec![1, 2, 3], mono, mono, 1.0);
        assert!(matches!(
            set.insert(&clip),
            Err(TriggerError::Format { .. })
        ));
        assert!(!set.is_any_playing());
    }

    #[test]
    fn test_concurrent_trigger_and_consume() {
        let set = Arc::new(polyphonic());
        let clips = Arc::new(Clips::new(&[("a", ramp(20, 1))]));

        let trigger = {
            let set = set.clone();
            let clips = clips.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    set.trigger("a", clips.as_ref()).unwrap();
                }
            })
        };

        let mut blocks = 0;
        while !trigger.is_finished() || set.is_any_playing() {
            if let Some(mix) = set.consume_block(4) {
                assert_eq!(mix.len(), 8);
                blocks += 1;
            }
        }
        trigger.join().unwrap();

        assert!(blocks > 0);
        assert_eq!(set.instance_count(), 0);
    }
}
