//! Background worker helpers

use log::warn;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Grace period for reader and demo threads to notice their stop flag
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

const JOIN_POLL: Duration = Duration::from_millis(10);

/// Join `handle` if it finishes within `timeout`.
///
/// Returns false when the thread is still running at the deadline; the
/// handle is then dropped and the thread finishes on its own. Joining from
/// the worker itself is a no-op.
pub fn join_bounded(handle: JoinHandle<()>, timeout: Duration, what: &str) -> bool {
    if handle.thread().id() == thread::current().id() {
        return true;
    }

    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("{} did not stop within {:?}, detaching", what, timeout);
            return false;
        }
        thread::sleep(JOIN_POLL);
    }

    if handle.join().is_err() {
        warn!("{} panicked", what);
    }
    true
}
