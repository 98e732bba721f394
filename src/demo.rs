//! Timed demo playback
//!
//! The scheduler walks the deck one slide at a time. Every time the current
//! slide changes, the slide signal (`page_<n>`) is fanned out to the hardware
//! and navigation observers are told. Slides are numbered by position,
//! `1..=total`, where `total` is re-read from the content store on every step
//! so the deck can change underneath a running demo.
//!
//! At most one loop thread is alive per scheduler. Stopping wakes it through a
//! condition variable, and each loop carries the generation it was started
//! with, so a loop that outlives its stop can never step the slides again.

use crate::config::DemoConfig;
use crate::content::{ContentStore, SlideId};
use crate::events::{Observers, SlideEvent, SubscriptionId};
use crate::hardware::protocol::{slide_signal_id, SIGNAL_ON};
use crate::hardware::DeviceRegistry;
use crate::worker::{join_bounded, JOIN_TIMEOUT};
use log::{debug, error, info, warn};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Snapshot of the scheduler for status displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoStatus {
    pub running: bool,
    pub current_slide: SlideId,
    pub total_slides: usize,
    /// Seconds per slide
    pub slide_duration: u64,
    pub loop_enabled: bool,
}

#[derive(Debug)]
struct DemoState {
    running: bool,
    current: SlideId,
    total: usize,
    duration: u64,
    loop_enabled: bool,
    /// Bumped on every start; a loop exits once it no longer matches
    generation: u64,
    /// Bumped on every slide change; restarts the loop's timer
    step: u64,
}

struct Inner {
    store: Arc<ContentStore>,
    registry: Arc<DeviceRegistry>,
    relay_target: Option<String>,
    state: Mutex<DemoState>,
    wake: Condvar,
    worker: Mutex<Option<JoinHandle<()>>>,
    observers: Observers<SlideEvent>,
}

pub struct DemoScheduler {
    inner: Arc<Inner>,
}

impl DemoScheduler {
    pub fn new(store: Arc<ContentStore>, registry: Arc<DeviceRegistry>, config: &DemoConfig) -> Self {
        let relay_target = Some(config.relay_target.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Self {
            inner: Arc::new(Inner {
                store,
                registry,
                relay_target,
                state: Mutex::new(DemoState {
                    running: false,
                    current: 1,
                    total: 0,
                    duration: config.slide_duration.max(1),
                    loop_enabled: config.loop_enabled,
                    generation: 0,
                    step: 0,
                }),
                wake: Condvar::new(),
                worker: Mutex::new(None),
                observers: Observers::new(),
            }),
        }
    }

    /// Start playback at `from_slide`, optionally with a new duration.
    ///
    /// Returns false if already running or if there are no slides.
    pub fn start(&self, from_slide: SlideId, duration: Option<u64>) -> bool {
        self.inner.start(from_slide, duration)
    }

    /// Stop playback. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        self.inner.stop()
    }

    pub fn pause(&self) -> bool {
        self.inner.stop()
    }

    /// Move to the next slide; see [`DemoScheduler`] for end-of-deck rules
    pub fn advance(&self) -> bool {
        self.inner.advance(None)
    }

    pub fn retreat(&self) -> bool {
        self.inner.retreat()
    }

    /// Jump to `slide`. Out-of-range numbers are rejected without any change.
    pub fn goto(&self, slide: SlideId) -> bool {
        self.inner.goto(slide)
    }

    /// Back to the first slide
    pub fn reset(&self) -> bool {
        self.inner.goto(1)
    }

    /// Seconds per slide, at least one
    pub fn set_duration(&self, seconds: u64) {
        let seconds = seconds.max(1);
        self.inner.lock().duration = seconds;
        info!("Slide duration set to {}s", seconds);
    }

    pub fn set_loop(&self, enabled: bool) {
        self.inner.lock().loop_enabled = enabled;
        info!("Demo loop {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    pub fn current_slide(&self) -> SlideId {
        self.inner.lock().current
    }

    pub fn status(&self) -> DemoStatus {
        let total = self.inner.store.count();
        let mut state = self.inner.lock();
        state.total = total;
        DemoStatus {
            running: state.running,
            current_slide: state.current,
            total_slides: state.total,
            slide_duration: state.duration,
            loop_enabled: state.loop_enabled,
        }
    }

    /// Observe slide changes (`SlideEvent::NavigatedTo`)
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SlideEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }
}

impl Drop for DemoScheduler {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl Inner {
    fn start(self: &Arc<Self>, from_slide: SlideId, duration: Option<u64>) -> bool {
        let total = self.store.count();
        let generation = {
            let mut state = self.lock();
            if state.running {
                warn!("Demo already running");
                return false;
            }
            state.total = total;
            if total == 0 {
                warn!("No slides available, demo not started");
                return false;
            }
            if let Some(seconds) = duration {
                state.duration = seconds.max(1);
            }
            state.current = from_slide.clamp(1, total as SlideId);
            state.running = true;
            state.generation += 1;
            state.generation
        };

        // A loop detached by an earlier stop exits on the generation check.
        let previous = lock(&self.worker).take();
        if let Some(handle) = previous {
            join_bounded(handle, JOIN_TIMEOUT, "previous demo loop");
        }

        let inner = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("demo-loop".to_string())
            .spawn(move || inner.run(generation));

        match spawned {
            Ok(handle) => {
                *lock(&self.worker) = Some(handle);
                let state = self.lock();
                info!(
                    "Demo started at slide {} of {} ({}s per slide)",
                    state.current, state.total, state.duration
                );
                true
            }
            Err(e) => {
                error!("Failed to spawn demo loop: {}", e);
                self.lock().running = false;
                false
            }
        }
    }

    fn stop(&self) -> bool {
        {
            let mut state = self.lock();
            if !state.running {
                return false;
            }
            state.running = false;
        }
        self.wake.notify_all();

        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            join_bounded(handle, JOIN_TIMEOUT, "demo loop");
        }
        info!("Demo stopped");
        true
    }

    /// Step forward. With `only_generation` set, the step is skipped unless
    /// that loop generation is still the running one.
    fn advance(&self, only_generation: Option<u64>) -> bool {
        let total = self.store.count();
        let next = {
            let mut state = self.lock();
            if let Some(generation) = only_generation {
                if !state.running || state.generation != generation {
                    return false;
                }
            }
            state.total = total;
            if total == 0 {
                warn!("No slides available");
                if only_generation.is_some() {
                    // The loop exits here, so the demo is no longer running.
                    state.running = false;
                    info!("Demo stopped, deck is empty");
                }
                return false;
            }

            let next = state.current.saturating_add(1);
            if next as usize <= total {
                Some(next)
            } else if state.loop_enabled {
                Some(1)
            } else {
                None
            }
        };

        match next {
            Some(slide) => {
                self.show(slide);
                true
            }
            None => {
                info!("Demo finished, no more slides");
                self.stop();
                false
            }
        }
    }

    fn retreat(&self) -> bool {
        let total = self.store.count();
        let prev = {
            let mut state = self.lock();
            state.total = total;
            if total == 0 {
                warn!("No slides available");
                return false;
            }

            let current = state.current.min(total as SlideId);
            if current > 1 {
                current - 1
            } else if state.loop_enabled {
                total as SlideId
            } else {
                1
            }
        };

        self.show(prev);
        true
    }

    fn goto(&self, slide: SlideId) -> bool {
        let total = self.store.count();
        {
            let mut state = self.lock();
            state.total = total;
            if slide < 1 || slide as usize > total {
                warn!("Slide {} out of range (1-{})", slide, total);
                return false;
            }
        }

        self.show(slide);
        true
    }

    /// Make `slide` current, signal the hardware and notify observers
    fn show(&self, slide: SlideId) {
        {
            let mut state = self.lock();
            state.current = slide;
            state.step += 1;
        }
        self.wake.notify_all();
        self.emit(slide);
    }

    fn emit(&self, slide: SlideId) {
        let signal_id = slide_signal_id(slide);
        let report = self
            .registry
            .dispatch_signal(&signal_id, SIGNAL_ON, self.relay_target.as_deref());
        debug!(
            "Slide {}: signal {} delivered to {:?}",
            slide, signal_id, report.delivered
        );
        self.observers.notify(&SlideEvent::NavigatedTo { id: slide });
    }

    fn run(self: Arc<Self>, generation: u64) {
        let first = {
            let state = self.lock();
            if !state.running || state.generation != generation {
                return;
            }
            state.current
        };
        self.emit(first);

        loop {
            let mut state = self.lock();
            let step = state.step;
            let deadline = Instant::now() + Duration::from_secs(state.duration);

            let expired = loop {
                if !state.running || state.generation != generation {
                    debug!("Demo loop {} exiting", generation);
                    return;
                }
                if state.step != step {
                    // Manual navigation: give the new slide its full time.
                    break false;
                }
                let now = Instant::now();
                if now >= deadline {
                    break true;
                }
                state = match self.wake.wait_timeout(state, deadline - now) {
                    Ok((guard, _)) => guard,
                    Err(poisoned) => poisoned.into_inner().0,
                };
            };
            drop(state);

            if expired && !self.advance(Some(generation)) {
                return;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, DemoState> {
        lock(&self.state)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
