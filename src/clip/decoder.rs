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
use std::{fs::File, path::Path};

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use symphonia::default::formats::{
    AdtsReader, FlacReader, IsoMp4Reader, MpaReader, OggReader, WavReader,
};
use tracing::{debug, info, span, warn, Level};

use super::{extension, transcoder, ClipError, ClipFormat, DecodedClip, Volume};

/// File extensions that can be decoded into clips.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["wav", "mp3", "ogg", "flac", "aac", "m4a"];

/// Returns true if the file has one of the supported extensions.
pub fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// How the container reader is chosen.
#[derive(Clone, Copy)]
enum Strategy<'a> {
    /// Probe the file contents, hinting with the extension.
    Probe(&'a str),
    /// Use the reader implied by the extension without probing.
    Forced(&'a str),
}

/// Interleaved f32 PCM straight out of the decoder.
struct Pcm {
    samples: Vec<f32>,
    format: ClipFormat,
}

/// Decodes the file into a clip in the given format with the volume applied.
///
/// Decoding first probes the file. If that fails, it's retried once with the
/// container reader the extension implies. When both attempts fail the clip is
/// reported as corrupt with both errors attached, unless neither attempt found
/// a supported format.
pub fn decode(
    name: &str,
    path: &Path,
    format: ClipFormat,
    volume: Volume,
) -> Result<DecodedClip, ClipError> {
    let span = span!(Level::DEBUG, "decode clip");
    let _enter = span.enter();

    let ext = match extension(path) {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => ext,
        _ => {
            return Err(ClipError::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: format!(
                    "extension must be one of {}",
                    SUPPORTED_EXTENSIONS.join(", ")
                ),
            })
        }
    };

    let pcm = match read_pcm(path, Strategy::Probe(&ext))? {
        Ok(pcm) => pcm,
        Err(primary) => {
            warn!(
                path = ?path,
                err = %primary,
                "Decode failed, retrying with the {} reader",
                ext
            );
            match read_pcm(path, Strategy::Forced(&ext))? {
                Ok(pcm) => pcm,
                Err(fallback) => return Err(classify(path, primary, fallback)),
            }
        }
    };

    if pcm.samples.is_empty() {
        return Err(ClipError::Empty {
            path: path.to_path_buf(),
        });
    }

    let resampled = transcoder::resample(
        &pcm.samples,
        usize::from(pcm.format.channels),
        pcm.format.sample_rate,
        format.sample_rate,
    )
    .map_err(|reason| ClipError::Resample {
        path: path.to_path_buf(),
        from: pcm.format.sample_rate,
        to: format.sample_rate,
        reason,
    })?;
    let remixed = transcoder::remix(
        resampled,
        usize::from(pcm.format.channels),
        usize::from(format.channels),
    );
    let samples = transcoder::quantize(&remixed, volume.gain());

    let clip = DecodedClip::new(name, samples, format, pcm.format, volume.gain());
    info!(
        name,
        path = ?path,
        source = %pcm.format,
        frames = clip.frames(),
        volume = volume.percent(),
        "Decoded clip."
    );
    Ok(clip)
}

fn classify(path: &Path, primary: SymphoniaError, fallback: SymphoniaError) -> ClipError {
    match (&primary, &fallback) {
        (SymphoniaError::Unsupported(reason), SymphoniaError::Unsupported(_)) => {
            ClipError::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: reason.to_string(),
            }
        }
        _ => ClipError::Corrupt {
            path: path.to_path_buf(),
            source: primary,
            fallback,
        },
    }
}

/// Opens the file and decodes all of it. The outer error is for failures to
/// read the file at all, the inner one for decode failures.
fn read_pcm(path: &Path, strategy: Strategy) -> Result<Result<Pcm, SymphoniaError>, ClipError> {
    let file = File::open(path).map_err(|source| ClipError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    Ok(open_reader(mss, strategy).and_then(decode_all))
}

fn open_reader(
    mss: MediaSourceStream,
    strategy: Strategy,
) -> Result<Box<dyn FormatReader>, SymphoniaError> {
    let fmt_opts = FormatOptions::default();
    match strategy {
        Strategy::Probe(ext) => {
            let mut hint = Hint::new();
            hint.with_extension(ext);
            let probed = symphonia::default::get_probe().format(
                &hint,
                mss,
                &fmt_opts,
                &MetadataOptions::default(),
            )?;
            Ok(probed.format)
        }
        Strategy::Forced(ext) => {
            let reader: Box<dyn FormatReader> = match ext {
                "wav" => Box::new(WavReader::try_new(mss, &fmt_opts)?),
                "flac" => Box::new(FlacReader::try_new(mss, &fmt_opts)?),
                "ogg" => Box::new(OggReader::try_new(mss, &fmt_opts)?),
                "mp3" => Box::new(MpaReader::try_new(mss, &fmt_opts)?),
                "m4a" => Box::new(IsoMp4Reader::try_new(mss, &fmt_opts)?),
                "aac" => Box::new(AdtsReader::try_new(mss, &fmt_opts)?),
                _ => return Err(SymphoniaError::Unsupported("no reader for extension")),
            };
            Ok(reader)
        }
    }
}

fn decode_all(mut reader: Box<dyn FormatReader>) -> Result<Pcm, SymphoniaError> {
    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(SymphoniaError::Unsupported("no audio track found"))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs().make(&params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut format = ClipFormat {
        sample_rate: params.sample_rate.unwrap_or(0),
        channels: params.channels.map(|c| c.count() as u16).unwrap_or(0),
    };

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(err = e, "Skipping undecodable packet");
                continue;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e),
        };

        let spec = *decoded.spec();
        if format.channels == 0 {
            format.channels = spec.channels.count() as u16;
        }
        if format.sample_rate == 0 {
            format.sample_rate = spec.rate;
        }

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    if format.channels == 0 || format.sample_rate == 0 {
        return Err(SymphoniaError::Unsupported("stream format is unknown"));
    }
    Ok(Pcm { samples, format })
}
