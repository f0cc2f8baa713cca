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
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::{
    ring::SampleRing, DeviceDescriptor, DeviceError, DeviceId, Direction, InputStream,
    OutputStream, ReadStatus, StreamError, StreamFormat,
};

/// How long a blocked read or write sleeps before polling the ring again.
const POLL_INTERVAL: Duration = Duration::from_micros(500);

/// Number of blocks the rings between cpal and the routing thread can hold.
const RING_BLOCKS: usize = 8;

/// A host backed by cpal's default audio host.
pub struct Host {
    host_id: cpal::HostId,
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl Host {
    pub fn new() -> Host {
        Host {
            host_id: cpal::default_host().id(),
        }
    }

    fn host(&self) -> Result<cpal::Host, DeviceError> {
        cpal::host_from_id(self.host_id).map_err(|e| DeviceError::Enumeration(e.to_string()))
    }

    /// Enumerates cpal devices along with their descriptors.
    fn cpal_devices(&self) -> Result<Vec<(DeviceDescriptor, cpal::Device)>, DeviceError> {
        // Suppress noisy backend output here.
        let _shh_stdout = shh::stdout().ok();
        let _shh_stderr = shh::stderr().ok();

        let host = self.host()?;
        let devices = host
            .devices()
            .map_err(|e| DeviceError::Enumeration(e.to_string()))?;

        let mut result = Vec::new();
        for (index, device) in devices.enumerate() {
            let name = match device_name(&device) {
                Ok(name) => name,
                Err(e) => {
                    debug!(index, err = e.to_string(), "Skipping device without a name");
                    continue;
                }
            };

            let input_channels = device
                .supported_input_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0);
            let output_channels = device
                .supported_output_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0);

            let sample_rate = device
                .default_input_config()
                .or_else(|_| device.default_output_config())
                .map(|config| config.sample_rate())
                .ok();

            result.push((
                DeviceDescriptor {
                    id: DeviceId(index),
                    name,
                    input_channels,
                    output_channels,
                    sample_rate,
                },
                device,
            ));
        }
        Ok(result)
    }

    /// Finds the cpal device for the given id, checking it still supports the direction.
    fn cpal_device(
        &self,
        id: DeviceId,
        direction: Direction,
    ) -> Result<(DeviceDescriptor, cpal::Device), DeviceError> {
        let open_error = |reason: &str| DeviceError::Open {
            id,
            direction,
            reason: reason.to_string(),
        };

        let (descriptor, device) = self
            .cpal_devices()
            .map_err(|e| open_error(&e.to_string()))?
            .into_iter()
            .find(|(descriptor, _)| descriptor.id == id)
            .ok_or_else(|| open_error("device is not available"))?;

        if !descriptor.supports(direction) {
            return Err(open_error("device has no channels in this direction"));
        }
        Ok((descriptor, device))
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpal ({})", self.host_id.name())
    }
}

impl super::Host for Host {
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        Ok(self
            .cpal_devices()?
            .into_iter()
            .map(|(descriptor, _)| descriptor)
            .collect())
    }

    fn default_device(&self, direction: Direction) -> Result<Option<DeviceId>, DeviceError> {
        let host = self.host()?;
        let default = match direction {
            Direction::Input => host.default_input_device(),
            Direction::Output => host.default_output_device(),
        };
        let Some(default_name) = default.and_then(|device| device_name(&device).ok()) else {
            return Ok(None);
        };

        // cpal devices can't be compared directly, so match on name.
        Ok(self
            .cpal_devices()?
            .into_iter()
            .map(|(descriptor, _)| descriptor)
            .find(|descriptor| descriptor.name == default_name && descriptor.supports(direction))
            .map(|descriptor| descriptor.id))
    }

    fn open_input(
        &self,
        id: DeviceId,
        format: StreamFormat,
    ) -> Result<Box<dyn InputStream>, DeviceError> {
        let (descriptor, device) = self.cpal_device(id, Direction::Input)?;
        let shared = Arc::new(Shared::new(format));
        let keeper = StreamKeeper::spawn(id, Direction::Input, device, format, shared.clone())?;
        info!(device = descriptor.name, id = id.0, "Opened input stream.");
        Ok(Box::new(Input {
            shared,
            keeper: Mutex::new(Some(keeper)),
        }))
    }

    fn open_output(
        &self,
        id: DeviceId,
        format: StreamFormat,
    ) -> Result<Box<dyn OutputStream>, DeviceError> {
        let (descriptor, device) = self.cpal_device(id, Direction::Output)?;
        let shared = Arc::new(Shared::new(format));
        let keeper = StreamKeeper::spawn(id, Direction::Output, device, format, shared.clone())?;
        info!(device = descriptor.name, id = id.0, "Opened output stream.");
        Ok(Box::new(Output {
            shared,
            keeper: Mutex::new(Some(keeper)),
        }))
    }
}

/// State shared between a cpal callback and the routing thread.
struct Shared {
    ring: SampleRing,
    /// Set by the input callback when the ring couldn't take a whole callback.
    overflowed: AtomicBool,
    closed: AtomicBool,
    /// The last error reported by the backend.
    failure: Mutex<Option<String>>,
}

impl Shared {
    fn new(format: StreamFormat) -> Shared {
        Shared {
            ring: SampleRing::new(format.block_samples() * RING_BLOCKS),
            overflowed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            failure: Mutex::new(None),
        }
    }

    fn check(&self) -> Result<(), StreamError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StreamError::Closed);
        }
        if let Some(failure) = self.failure.lock().as_ref() {
            return Err(StreamError::Backend(failure.clone()));
        }
        Ok(())
    }
}

/// Owns the thread that keeps a cpal stream alive. cpal streams aren't Send on
/// every platform, so the stream is built and dropped on this thread.
struct StreamKeeper {
    shutdown: crossbeam_channel::Sender<()>,
    thread: thread::JoinHandle<()>,
}

impl StreamKeeper {
    fn spawn(
        id: DeviceId,
        direction: Direction,
        device: cpal::Device,
        format: StreamFormat,
        shared: Arc<Shared>,
    ) -> Result<StreamKeeper, DeviceError> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

        let thread = thread::Builder::new()
            .name(format!("micmix-{}-{}", direction, id))
            .spawn(move || {
                let config = cpal::StreamConfig {
                    channels: format.channels,
                    sample_rate: format.sample_rate,
                    buffer_size: cpal::BufferSize::Default,
                };

                let stream = match build_stream(&device, direction, &config, shared) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive until asked to stop.
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| DeviceError::Open {
                id,
                direction,
                reason: e.to_string(),
            })?;

        let keeper = StreamKeeper {
            shutdown: shutdown_tx,
            thread,
        };
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(keeper),
            Ok(Err(reason)) => {
                keeper.stop();
                Err(DeviceError::Open {
                    id,
                    direction,
                    reason,
                })
            }
            Err(_) => {
                keeper.stop();
                Err(DeviceError::Open {
                    id,
                    direction,
                    reason: "stream thread exited unexpectedly".to_string(),
                })
            }
        }
    }

    fn stop(self) {
        let _ = self.shutdown.send(());
        if self.thread.join().is_err() {
            error!("Audio stream thread panicked");
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    direction: Direction,
    config: &cpal::StreamConfig,
    shared: Arc<Shared>,
) -> Result<cpal::Stream, String> {
    let sample_format = match direction {
        Direction::Input => device.default_input_config(),
        Direction::Output => device.default_output_config(),
    }
    .map_err(|e| e.to_string())?
    .sample_format();

    let result = match (direction, sample_format) {
        (Direction::Input, cpal::SampleFormat::I16) => build_input::<i16>(device, config, shared),
        (Direction::Input, cpal::SampleFormat::U16) => build_input::<u16>(device, config, shared),
        (Direction::Input, cpal::SampleFormat::I32) => build_input::<i32>(device, config, shared),
        (Direction::Input, cpal::SampleFormat::F32) => build_input::<f32>(device, config, shared),
        (Direction::Output, cpal::SampleFormat::I16) => {
            build_output::<i16>(device, config, shared)
        }
        (Direction::Output, cpal::SampleFormat::U16) => {
            build_output::<u16>(device, config, shared)
        }
        (Direction::Output, cpal::SampleFormat::I32) => {
            build_output::<i32>(device, config, shared)
        }
        (Direction::Output, cpal::SampleFormat::F32) => {
            build_output::<f32>(device, config, shared)
        }
        (_, other) => return Err(format!("unsupported sample format {:?}", other)),
    };
    result.map_err(|e| e.to_string())
}

/// The device's name as reported by the backend. Devices are matched by this
/// name, so it has to stay stable between enumerations.
#[allow(deprecated)]
fn device_name(device: &cpal::Device) -> Result<String, cpal::DeviceNameError> {
    device.name()
}

fn error_callback(shared: Arc<Shared>) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        error!(err = err.to_string(), "CPAL stream error");
        if let cpal::StreamError::DeviceNotAvailable = err {
            *shared.failure.lock() = Some(err.to_string());
        }
    }
}

/// Builds a capture stream that converts the device's samples to i16 and pushes
/// them into the ring.
fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: Arc<Shared>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample,
    i16: cpal::FromSample<T>,
{
    let mut scratch: Vec<i16> = Vec::new();
    let callback_shared = shared.clone();
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            scratch.clear();
            scratch.extend(data.iter().map(|sample| i16::from_sample(*sample)));
            if callback_shared.ring.push(&scratch) < scratch.len() {
                callback_shared.overflowed.store(true, Ordering::Relaxed);
            }
        },
        error_callback(shared),
        None,
    )
}

/// Builds a playback stream that pulls i16 samples out of the ring. Any
/// shortfall is filled with silence.
fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: Arc<Shared>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<i16>,
{
    let mut scratch: Vec<i16> = Vec::new();
    let callback_shared = shared.clone();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0);
            let read = callback_shared.ring.pop(&mut scratch);
            scratch[read..].fill(0);
            for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(*src);
            }
        },
        error_callback(shared),
        None,
    )
}

fn close(shared: &Shared, keeper: &Mutex<Option<StreamKeeper>>) {
    shared.closed.store(true, Ordering::Release);
    if let Some(keeper) = keeper.lock().take() {
        keeper.stop();
    }
}

struct Input {
    shared: Arc<Shared>,
    keeper: Mutex<Option<StreamKeeper>>,
}

impl InputStream for Input {
    fn read(&self, buffer: &mut [i16]) -> Result<ReadStatus, StreamError> {
        let mut filled = 0;
        while filled < buffer.len() {
            self.shared.check()?;
            filled += self.shared.ring.pop(&mut buffer[filled..]);
            if filled < buffer.len() {
                spin_sleep::sleep(POLL_INTERVAL);
            }
        }
        Ok(ReadStatus {
            overflowed: self.shared.overflowed.swap(false, Ordering::Relaxed),
        })
    }

    fn close(&self) {
        close(&self.shared, &self.keeper);
    }
}

impl Drop for Input {
    fn drop(&mut self) {
        self.close();
    }
}

struct Output {
    shared: Arc<Shared>,
    keeper: Mutex<Option<StreamKeeper>>,
}

impl OutputStream for Output {
    fn write(&self, buffer: &[i16]) -> Result<(), StreamError> {
        let mut written = 0;
        while written < buffer.len() {
            self.shared.check()?;
            written += self.shared.ring.push(&buffer[written..]);
            if written < buffer.len() {
                spin_sleep::sleep(POLL_INTERVAL);
            }
        }
        Ok(())
    }

    fn close(&self) {
        close(&self.shared, &self.keeper);
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        self.close();
    }
}
