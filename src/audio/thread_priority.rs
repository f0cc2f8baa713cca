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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Default priority for the routing thread when MICMIX_THREAD_PRIORITY is unset.
const DEFAULT_ROUTING_THREAD_PRIORITY: u8 = 70;

/// Reads MICMIX_THREAD_PRIORITY (0-99). Out of range or unparseable values use the default.
pub fn routing_thread_priority() -> ThreadPriority {
    let value = parse_priority(std::env::var("MICMIX_THREAD_PRIORITY").ok().as_deref());
    ThreadPriorityValue::try_from(value)
        .map(ThreadPriority::Crossplatform)
        .unwrap_or(ThreadPriority::Max)
}

fn parse_priority(value: Option<&str>) -> u8 {
    value
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_ROUTING_THREAD_PRIORITY)
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Whether to attempt RT (SCHED_FIFO) scheduling for the routing thread.
/// Enabled unless MICMIX_DISABLE_RT_AUDIO is set.
pub fn rt_audio_enabled() -> bool {
    !env_flag("MICMIX_DISABLE_RT_AUDIO")
}

/// Raises the priority of the calling thread. Failures are logged and otherwise
/// ignored, routing still works at normal priority.
pub fn raise_current_thread_priority(tp: ThreadPriority, rt_audio: bool) {
    if let Err(e) = set_current_thread_priority(tp) {
        warn!(error = ?e, "Failed to raise routing thread priority");
    }

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        let tid = thread_native_id();
        match set_thread_priority_and_policy(
            tid,
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for routing thread"),
            Err(e) => warn!(
                error = %e,
                "Failed to set RT SCHED_FIFO for routing thread"
            ),
        }
    }

    #[cfg(not(unix))]
    let _ = rt_audio;
}
