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
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Number of input frames handed to the resampler per call.
const CHUNK_FRAMES: usize = 1024;

/// Resamples interleaved samples from one rate to another. The output holds
/// exactly ceil(frames * to / from) frames with the resampler delay removed.
pub(super) fn resample(
    samples: &[f32],
    channels: usize,
    from: u32,
    to: u32,
) -> Result<Vec<f32>, String> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let channels = channels.max(1);
    let frames = samples.len() / channels;
    let ratio = f64::from(to) / f64::from(from);
    let expected = (frames as f64 * ratio).ceil() as usize;

    let sinc_params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, CHUNK_FRAMES, channels)
        .map_err(|e| e.to_string())?;

    let input = deinterleave(samples, channels);
    let delay = resampler.output_delay();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

    let mut position = 0;
    while frames - position >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let chunk: Vec<&[f32]> = input
            .iter()
            .map(|channel| &channel[position..position + needed])
            .collect();
        let processed = resampler.process(&chunk, None).map_err(|e| e.to_string())?;
        append(&mut output, processed);
        position += needed;
    }

    if position < frames {
        let rest: Vec<&[f32]> = input.iter().map(|channel| &channel[position..]).collect();
        let processed = resampler
            .process_partial(Some(rest.as_slice()), None)
            .map_err(|e| e.to_string())?;
        append(&mut output, processed);
    }

    // Flush the resampler until the delayed tail has come out.
    while output[0].len() < expected + delay {
        let processed = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| e.to_string())?;
        if processed[0].is_empty() {
            break;
        }
        append(&mut output, processed);
    }

    for channel in output.iter_mut() {
        channel.drain(..delay.min(channel.len()));
        channel.resize(expected, 0.0);
    }
    Ok(interleave(&output))
}

/// Converts interleaved samples from one channel count to another. Mono is
/// copied to every channel, anything going to mono is averaged and other
/// layouts wrap the source channels around the target channels.
pub(super) fn remix(samples: Vec<f32>, from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples;
    }

    let frames = samples.len() / from;
    let mut result = Vec::with_capacity(frames * to);
    for frame in samples.chunks_exact(from) {
        if from == 1 {
            result.extend(std::iter::repeat(frame[0]).take(to));
        } else if to == 1 {
            result.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            result.extend((0..to).map(|channel| frame[channel % from]));
        }
    }
    result
}

/// Applies the gain and converts to 16-bit with rounding and saturation.
pub(super) fn quantize(samples: &[f32], gain: f32) -> Vec<i16> {
    samples
        .iter()
        .map(|sample| {
            (sample * gain * 32768.0)
                .round()
                .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
        })
        .collect()
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (channel, sample) in planar.iter_mut().zip(frame) {
            channel.push(*sample);
        }
    }
    planar
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.first().map(|channel| channel.len()).unwrap_or(0);
    let mut samples = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        for channel in planar {
            samples.push(channel[frame]);
        }
    }
    samples
}

fn append(output: &mut [Vec<f32>], processed: Vec<Vec<f32>>) {
    for (channel, processed) in output.iter_mut().zip(processed) {
        channel.extend_from_slice(&processed);
    }
}
