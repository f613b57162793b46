//! Frame scheduling
//!
//! A single-threaded, callback based scheduler: callers request one frame
//! at a time and must re-request from inside the callback to keep an
//! animation running. Time comes from a [`Clock`] so tests can drive frames
//! deterministically with [`ManualClock`].

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;
#[cfg(any(windows, test))]
use std::time::Instant;

/// Source of monotonic frame timestamps
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock measured from construction
#[cfg(any(windows, test))]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

#[cfg(any(windows, test))]
impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

#[cfg(any(windows, test))]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(windows, test))]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Handle returned by [`FrameScheduler::request_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequestId(u64);

type FrameCallback = Box<dyn FnOnce(Duration)>;

#[derive(Default)]
struct SchedulerState {
    next_id: u64,
    pending: BTreeMap<FrameRequestId, FrameCallback>,
}

/// Shared frame scheduler; clones refer to the same queue
#[derive(Clone)]
pub struct FrameScheduler {
    clock: Rc<dyn Clock>,
    state: Rc<RefCell<SchedulerState>>,
}

impl FrameScheduler {
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Rc::new(clock),
            state: Rc::new(RefCell::new(SchedulerState::default())),
        }
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Queues `callback` for the next frame
    pub fn request_frame(&self, callback: impl FnOnce(Duration) + 'static) -> FrameRequestId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = FrameRequestId(state.next_id);
        state.pending.insert(id, Box::new(callback));
        id
    }

    /// Withdraws a pending request; false if it already ran or was cancelled
    pub fn cancel_frame(&self, id: FrameRequestId) -> bool {
        self.state.borrow_mut().pending.remove(&id).is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Runs every callback that was pending when the frame started
    ///
    /// Callbacks requested during the frame wait for the next one. A
    /// callback cancelled by an earlier callback of the same frame does
    /// not run.
    ///
    /// # Returns
    /// Number of callbacks invoked
    pub fn run_frame(&self) -> usize {
        let timestamp = self.clock.now();
        let batch: Vec<FrameRequestId> = self.state.borrow().pending.keys().copied().collect();

        let mut invoked = 0;
        for id in batch {
            let callback = self.state.borrow_mut().pending.remove(&id);
            if let Some(callback) = callback {
                callback(timestamp);
                invoked += 1;
            }
        }
        invoked
    }
}

/// Drives a scheduler in real time at a fixed frame interval
#[cfg(any(windows, test))]
pub struct FrameDriver {
    scheduler: FrameScheduler,
    interval: Duration,
}

#[cfg(any(windows, test))]
impl FrameDriver {
    pub fn new(scheduler: FrameScheduler, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
        }
    }

    /// Runs frames until `duration` elapses or nothing is scheduled
    ///
    /// `between_frames` runs after each frame, e.g. to pump platform
    /// messages.
    ///
    /// # Returns
    /// Number of frames run
    pub fn run_for(&self, duration: Duration, mut between_frames: impl FnMut()) -> u64 {
        let started = Instant::now();
        let mut frames = 0;
        while started.elapsed() < duration && self.scheduler.pending_count() > 0 {
            let frame_start = Instant::now();
            self.scheduler.run_frame();
            frames += 1;
            between_frames();

            if let Some(rest) = self.interval.checked_sub(frame_start.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        log::debug!("Frame driver stopped after {} frames", frames);
        frames
    }
}
