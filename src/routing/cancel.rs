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
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::{Condvar, Mutex};

struct Inner {
    cancelled: AtomicBool,
    finished: Mutex<bool>,
    condvar: Condvar,
}

/// Shared between the router and one run of the routing loop. The router
/// cancels, the loop checks for cancellation once per block and reports when
/// it has exited.
#[derive(Clone)]
pub(crate) struct CancelHandle {
    inner: Arc<Inner>,
}

impl CancelHandle {
    pub(crate) fn new() -> CancelHandle {
        CancelHandle {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                finished: Mutex::new(false),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Returns true if the loop has been asked to stop.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Asks the loop to stop at the next block boundary.
    pub(crate) fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Marks the loop as exited and wakes up anyone waiting on it.
    pub(crate) fn finish(&self) {
        *self.inner.finished.lock() = true;
        self.inner.condvar.notify_all();
    }

    pub(crate) fn is_finished(&self) -> bool {
        *self.inner.finished.lock()
    }

    /// Waits up to `timeout` for the loop to exit. Returns true if it did.
    pub(crate) fn wait_finished(&self, timeout: Duration) -> bool {
        let mut finished = self.inner.finished.lock();
        if !*finished {
            self.inner
                .condvar
                .wait_while_for(&mut finished, |finished| !*finished, timeout);
        }
        *finished
    }
}

/// Calls [CancelHandle::finish] when dropped, so the loop is reported as
/// exited even if it panics.
pub(crate) struct FinishGuard(pub(crate) CancelHandle);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}
