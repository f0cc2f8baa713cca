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
/// Sums live input with the clip contribution for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mixer {
    input_gain: f32,
    clip_gain: f32,
}

impl Mixer {
    pub fn new(input_gain: f32, clip_gain: f32) -> Mixer {
        Mixer {
            input_gain,
            clip_gain,
        }
    }

    /// Writes one output block. Without a clip contribution the input passes
    /// through untouched. Otherwise each sample is
    /// `input_gain * input + clip_gain * clips`, rounded and saturated to 16 bits.
    pub fn mix(&self, input: &[i16], clips: Option<&[i32]>, output: &mut [i16]) {
        let Some(clips) = clips else {
            output.copy_from_slice(input);
            return;
        };

        for ((out, input), clip) in output.iter_mut().zip(input).zip(clips) {
            let sample = self.input_gain * f32::from(*input) + self.clip_gain * (*clip as f32);
            *out = sample
                .round()
                .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
        }
    }
}
