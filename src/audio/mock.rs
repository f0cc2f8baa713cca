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
    collections::HashSet,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicI16, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::info;

use super::{
    DeviceDescriptor, DeviceError, DeviceId, Direction, InputStream, OutputStream, ReadStatus,
    StreamError, StreamFormat,
};

pub const MICROPHONE_ID: DeviceId = DeviceId(0);
pub const SPEAKERS_ID: DeviceId = DeviceId(1);
pub const CABLE_ID: DeviceId = DeviceId(2);
pub const HEADSET_ID: DeviceId = DeviceId(3);

/// Maximum number of output samples kept for inspection.
const CAPTURE_LIMIT: usize = 1 << 22;

/// State shared between the mock host and the streams it opened.
struct State {
    devices: Vec<DeviceDescriptor>,
    input_value: AtomicI16,
    paced: AtomicBool,
    fail_enumeration: AtomicBool,
    fail_open: Mutex<HashSet<DeviceId>>,
    fail_reads_after: Mutex<Option<usize>>,
    overflow_every: AtomicUsize,
    read_stall: Mutex<Duration>,
    open_delay: Mutex<Duration>,
    blocks_read: AtomicUsize,
    open_streams: AtomicUsize,
    captured: Mutex<Vec<i16>>,
}

/// A host with loopback devices that don't touch any hardware. Input streams
/// produce a constant sample value, optionally paced in real time, and output
/// streams capture whatever is written to them.
#[derive(Clone)]
pub struct Host {
    state: Arc<State>,
}

impl Host {
    /// A host with a microphone, speakers, a virtual cable and a headset.
    pub fn loopback() -> Host {
        let device = |id: DeviceId, name: &str, input_channels, output_channels| DeviceDescriptor {
            id,
            name: name.to_string(),
            input_channels,
            output_channels,
            sample_rate: Some(44100),
        };

        Host {
            state: Arc::new(State {
                devices: vec![
                    device(MICROPHONE_ID, "Mock Microphone", 2, 0),
                    device(SPEAKERS_ID, "Mock Speakers", 0, 2),
                    device(CABLE_ID, "CABLE Input (VB-Audio Virtual Cable)", 0, 2),
                    device(HEADSET_ID, "Mock Headset", 2, 2),
                ],
                input_value: AtomicI16::new(0),
                paced: AtomicBool::new(true),
                fail_enumeration: AtomicBool::new(false),
                fail_open: Mutex::new(HashSet::new()),
                fail_reads_after: Mutex::new(None),
                overflow_every: AtomicUsize::new(0),
                read_stall: Mutex::new(Duration::ZERO),
                open_delay: Mutex::new(Duration::ZERO),
                blocks_read: AtomicUsize::new(0),
                open_streams: AtomicUsize::new(0),
                captured: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Sets the value every input sample will have.
    pub fn set_input_value(&self, value: i16) {
        self.state.input_value.store(value, Ordering::Relaxed);
    }

    /// When paced, reads take as long as the block would take in real time.
    pub fn set_paced(&self, paced: bool) {
        self.state.paced.store(paced, Ordering::Relaxed);
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.state.fail_enumeration.store(fail, Ordering::Relaxed);
    }

    /// Makes opening the given device fail.
    pub fn fail_open(&self, id: DeviceId) {
        self.state.fail_open.lock().insert(id);
    }

    /// Makes every read fail once the given number of blocks have been read.
    pub fn fail_reads_after(&self, blocks: usize) {
        *self.state.fail_reads_after.lock() = Some(blocks);
    }

    /// Makes every nth read report an overflow. Zero turns overflows off.
    pub fn overflow_every(&self, blocks: usize) {
        self.state.overflow_every.store(blocks, Ordering::Relaxed);
    }

    /// Makes every read block for the given time before checking whether the
    /// stream was closed, like a driver that has stopped responding.
    pub fn stall_reads(&self, stall: Duration) {
        *self.state.read_stall.lock() = stall;
    }

    /// Makes opening an output stream take the given time.
    pub fn set_open_delay(&self, delay: Duration) {
        *self.state.open_delay.lock() = delay;
    }

    /// Number of streams currently open.
    pub fn open_streams(&self) -> usize {
        self.state.open_streams.load(Ordering::Relaxed)
    }

    /// Number of blocks read from any input stream.
    pub fn blocks_read(&self) -> usize {
        self.state.blocks_read.load(Ordering::Relaxed)
    }

    /// Takes everything written to output streams so far.
    pub fn take_output(&self) -> Vec<i16> {
        std::mem::take(&mut *self.state.captured.lock())
    }

    fn check_open(&self, id: DeviceId, direction: Direction) -> Result<(), DeviceError> {
        let open_error = |reason: &str| DeviceError::Open {
            id,
            direction,
            reason: reason.to_string(),
        };

        let device = self
            .state
            .devices
            .iter()
            .find(|device| device.id == id)
            .ok_or_else(|| open_error("device is not available"))?;
        if !device.supports(direction) {
            return Err(open_error("device has no channels in this direction"));
        }
        if self.state.fail_open.lock().contains(&id) {
            return Err(open_error("device rejected the stream format"));
        }
        Ok(())
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mock")
    }
}

impl super::Host for Host {
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        if self.state.fail_enumeration.load(Ordering::Relaxed) {
            return Err(DeviceError::Enumeration("mock driver fault".to_string()));
        }
        Ok(self.state.devices.clone())
    }

    fn default_device(&self, direction: Direction) -> Result<Option<DeviceId>, DeviceError> {
        Ok(Some(match direction {
            Direction::Input => MICROPHONE_ID,
            Direction::Output => SPEAKERS_ID,
        }))
    }

    fn open_input(
        &self,
        id: DeviceId,
        format: StreamFormat,
    ) -> Result<Box<dyn InputStream>, DeviceError> {
        self.check_open(id, Direction::Input)?;
        self.state.open_streams.fetch_add(1, Ordering::Relaxed);
        info!(id = id.0, "Opened mock input stream.");
        Ok(Box::new(Input {
            state: self.state.clone(),
            block_duration: block_duration(format),
            closed: AtomicBool::new(false),
        }))
    }

    fn open_output(
        &self,
        id: DeviceId,
        _: StreamFormat,
    ) -> Result<Box<dyn OutputStream>, DeviceError> {
        let delay = *self.state.open_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.check_open(id, Direction::Output)?;
        self.state.open_streams.fetch_add(1, Ordering::Relaxed);
        info!(id = id.0, "Opened mock output stream.");
        Ok(Box::new(Output {
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

fn block_duration(format: StreamFormat) -> Duration {
    Duration::from_secs_f64(format.block_frames as f64 / f64::from(format.sample_rate.max(1)))
}

struct Input {
    state: Arc<State>,
    block_duration: Duration,
    closed: AtomicBool,
}

impl InputStream for Input {
    fn read(&self, buffer: &mut [i16]) -> Result<ReadStatus, StreamError> {
        let stall = *self.state.read_stall.lock();
        if !stall.is_zero() {
            thread::sleep(stall);
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(StreamError::Closed);
        }
        if self.state.paced.load(Ordering::Relaxed) {
            spin_sleep::sleep(self.block_duration);
        }

        let blocks_read = self.state.blocks_read.load(Ordering::Relaxed);
        if let Some(limit) = *self.state.fail_reads_after.lock() {
            if blocks_read >= limit {
                return Err(StreamError::Backend("mock device unplugged".to_string()));
            }
        }

        buffer.fill(self.state.input_value.load(Ordering::Relaxed));
        let blocks_read = self.state.blocks_read.fetch_add(1, Ordering::Relaxed) + 1;
        let overflow_every = self.state.overflow_every.load(Ordering::Relaxed);
        Ok(ReadStatus {
            overflowed: overflow_every > 0 && blocks_read % overflow_every == 0,
        })
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.state.open_streams.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl Drop for Input {
    fn drop(&mut self) {
        self.close();
    }
}

struct Output {
    state: Arc<State>,
    closed: AtomicBool,
}

impl OutputStream for Output {
    fn write(&self, buffer: &[i16]) -> Result<(), StreamError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StreamError::Closed);
        }
        let mut captured = self.state.captured.lock();
        if captured.len() + buffer.len() > CAPTURE_LIMIT {
            let excess = (captured.len() + buffer.len()).saturating_sub(CAPTURE_LIMIT);
            let excess = excess.min(captured.len());
            captured.drain(..excess);
        }
        captured.extend_from_slice(buffer);
        Ok(())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.state.open_streams.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Host as _;

    fn format() -> StreamFormat {
        StreamFormat {
            sample_rate: 44100,
            channels: 2,
            block_frames: 64,
        }
    }

    #[test]
    fn test_loopback_streams() {
        let host = Host::loopback();
        host.set_paced(false);
        host.set_input_value(1234);

        let input = host.open_input(MICROPHONE_ID, format()).unwrap();
        let output = host.open_output(CABLE_ID, format()).unwrap();
        assert_eq!(host.open_streams(), 2);

        let mut block = vec![0i16; format().block_samples()];
        input.read(&mut block).unwrap();
        assert!(block.iter().all(|s| *s == 1234));
        output.write(&block).unwrap();
        assert_eq!(host.take_output().len(), 128);
        assert_eq!(host.blocks_read(), 1);

        input.close();
        input.close();
        assert_eq!(host.open_streams(), 1);
        assert_eq!(input.read(&mut block), Err(StreamError::Closed));

        drop(output);
        assert_eq!(host.open_streams(), 0);
    }

    #[test]
    fn test_overflow_every() {
        let host = Host::loopback();
        host.set_paced(false);
        host.overflow_every(3);

        let input = host.open_input(MICROPHONE_ID, format()).unwrap();
        let mut block = vec![0i16; format().block_samples()];
        let overflowed: Vec<bool> = (0..6)
            .map(|_| input.read(&mut block).unwrap().overflowed)
            .collect();
        assert_eq!(overflowed, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_capture_is_bounded() {
        let host = Host::loopback();
        let output = host.open_output(CABLE_ID, format()).unwrap();

        let block = vec![1i16; CAPTURE_LIMIT / 2 + 1];
        output.write(&block).unwrap();
        output.write(&block).unwrap();
        output.write(&[7, 8]).unwrap();

        let captured = host.take_output();
        assert_eq!(captured.len(), CAPTURE_LIMIT);
        assert_eq!(&captured[CAPTURE_LIMIT - 2..], &[7, 8]);
    }

    #[test]
    fn test_open_failures() {
        let host = Host::loopback();
        assert!(matches!(
            host.open_input(SPEAKERS_ID, format()),
            Err(DeviceError::Open {
                direction: Direction::Input,
                ..
            })
        ));

        host.fail_open(CABLE_ID);
        assert!(matches!(
            host.open_output(CABLE_ID, format()),
            Err(DeviceError::Open { id: CABLE_ID, .. })
        ));
        assert_eq!(host.open_streams(), 0);
    }

    #[test]
    fn test_reads_fail_after_limit() {
        let host = Host::loopback();
        host.set_paced(false);
        host.fail_reads_after(2);

        let input = host.open_input(HEADSET_ID, format()).unwrap();
        let mut block = vec![0i16; format().block_samples()];
        assert!(input.read(&mut block).is_ok());
        assert!(input.read(&mut block).is_ok());
        assert!(matches!(
            input.read(&mut block),
            Err(StreamError::Backend(_))
        ));
    }
}
