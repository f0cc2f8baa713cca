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
    cell::UnsafeCell,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Lock-free single producer, single consumer ring of samples. Used to move
/// audio between a cpal callback and the routing thread.
pub(crate) struct SampleRing {
    buffer: UnsafeCell<Box<[i16]>>,
    /// Capacity (power of 2)
    capacity: usize,
    read_pos: AtomicUsize,
    write_pos: AtomicUsize,
}

// Safety: the producer only touches the free region and the consumer only
// touches the filled region. The regions are handed over through the
// positions with release/acquire ordering.
unsafe impl Sync for SampleRing {}
unsafe impl Send for SampleRing {}

impl SampleRing {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        Self {
            buffer: UnsafeCell::new(vec![0; capacity].into_boxed_slice()),
            capacity,
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
        }
    }

    /// Number of samples available to read.
    #[inline]
    pub(crate) fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        if write >= read {
            write - read
        } else {
            self.capacity - read + write
        }
    }

    /// Space available to write. One slot is kept empty to tell full from empty.
    #[inline]
    pub(crate) fn space(&self) -> usize {
        self.capacity - self.available() - 1
    }

    /// Writes as many samples as fit. Returns the number written.
    pub(crate) fn push(&self, samples: &[i16]) -> usize {
        let to_write = self.space().min(samples.len());
        if to_write == 0 {
            return 0;
        }
        let write = self.write_pos.load(Ordering::Acquire);
        let mask = self.capacity - 1;

        let first_chunk = (self.capacity - write).min(to_write);
        unsafe {
            let base = (*self.buffer.get()).as_mut_ptr();
            std::ptr::copy_nonoverlapping(samples.as_ptr(), base.add(write), first_chunk);
            if to_write > first_chunk {
                std::ptr::copy_nonoverlapping(
                    samples.as_ptr().add(first_chunk),
                    base,
                    to_write - first_chunk,
                );
            }
        }

        self.write_pos
            .store((write + to_write) & mask, Ordering::Release);
        to_write
    }

    /// Reads up to `output.len()` samples. Returns the number read.
    pub(crate) fn pop(&self, output: &mut [i16]) -> usize {
        let to_read = self.available().min(output.len());
        if to_read == 0 {
            return 0;
        }
        let read = self.read_pos.load(Ordering::Acquire);
        let mask = self.capacity - 1;

        let first_chunk = (self.capacity - read).min(to_read);
        unsafe {
            let base = (*self.buffer.get()).as_ptr();
            std::ptr::copy_nonoverlapping(base.add(read), output.as_mut_ptr(), first_chunk);
            if to_read > first_chunk {
                std::ptr::copy_nonoverlapping(
                    base,
                    output.as_mut_ptr().add(first_chunk),
                    to_read - first_chunk,
                );
            }
        }

        self.read_pos
            .store((read + to_read) & mask, Ordering::Release);
        to_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_rounds_up() {
        let ring = SampleRing::new(1000);
        assert_eq!(ring.space(), 1023);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn test_push_pop_wraps() {
        let ring = SampleRing::new(8);
        let mut out = [0i16; 8];

        assert_eq!(ring.push(&[1, 2, 3, 4, 5, 6]), 6);
        assert_eq!(ring.pop(&mut out[..4]), 4);
        assert_eq!(&out[..4], &[1, 2, 3, 4]);

        // This write wraps around the end of the buffer.
        assert_eq!(ring.push(&[7, 8, 9, 10, 11]), 5);
        assert_eq!(ring.available(), 7);
        assert_eq!(ring.pop(&mut out), 7);
        assert_eq!(&out[..7], &[5, 6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_push_when_full() {
        let ring = SampleRing::new(4);
        assert_eq!(ring.push(&[1, 2, 3, 4, 5]), 3);
        assert_eq!(ring.push(&[6]), 0);

        let mut out = [0i16; 4];
        assert_eq!(ring.pop(&mut out), 3);
        assert_eq!(&out[..3], &[1, 2, 3]);
        assert_eq!(ring.pop(&mut out), 0);
    }

    #[test]
    fn test_threaded_transfer() {
        let ring = std::sync::Arc::new(SampleRing::new(64));
        let producer = {
            let ring = ring.clone();
            std::thread::spawn(move || {
                let samples: Vec<i16> = (0..10_000).map(|i| (i % 1000) as i16).collect();
                let mut offset = 0;
                while offset < samples.len() {
                    offset += ring.push(&samples[offset..]);
                    std::thread::yield_now();
                }
            })
        };

        let mut received = Vec::with_capacity(10_000);
        let mut chunk = [0i16; 17];
        while received.len() < 10_000 {
            let read = ring.pop(&mut chunk);
            received.extend_from_slice(&chunk[..read]);
            std::thread::yield_now();
        }
        producer.join().unwrap();

        for (i, sample) in received.iter().enumerate() {
            assert_eq!(*sample, (i % 1000) as i16);
        }
    }
}
