#![forbid(unsafe_code)]

//! Frame pacing: the recurring boundary that triggers cycle execution.
//!
//! The scheduler itself has no clock. A [`FramePump`] couples a scheduler
//! handle to a [`FrameClock`] and runs one cycle per boundary — but only
//! while the scheduler is armed, so an idle pump costs nothing beyond the
//! wait itself. The contract preserved here is "re-arm if and only if work
//! remains", not any particular timing primitive.
//!
//! Two clocks ship:
//!
//! - [`IntervalClock`] — real time, sleeping to the next multiple of a
//!   fixed period (defaulting to the config's `batch_timeout` cadence
//!   hint). Overruns skip ahead to the next future boundary rather than
//!   bursting catch-up frames.
//! - [`ManualClock`] — deterministic synthetic time for tests and
//!   harnesses: each boundary advances a virtual instant by one period,
//!   with no sleeping.

use std::time::Duration;

use web_time::Instant;

use crate::scheduler::{CycleOutcome, Scheduler};

/// Source of frame boundaries.
pub trait FrameClock {
    /// Block (or advance virtual time) until the next boundary and return
    /// its timestamp.
    fn wait_boundary(&mut self) -> Instant;

    /// The nominal period between boundaries.
    fn interval(&self) -> Duration;
}

/// Real-time clock ticking at a fixed period.
#[derive(Debug)]
pub struct IntervalClock {
    interval: Duration,
    next: Instant,
}

impl IntervalClock {
    /// A clock ticking every `interval`, starting one interval from now.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }

    /// A clock using a config's `batch_timeout` as its period.
    #[must_use]
    pub fn from_config(config: &cadre_core::config::SchedulerConfig) -> Self {
        Self::new(config.batch_timeout)
    }
}

impl FrameClock for IntervalClock {
    fn wait_boundary(&mut self) -> Instant {
        let now = Instant::now();
        if let Some(wait) = self.next.checked_duration_since(now) {
            std::thread::sleep(wait);
        }
        let boundary = Instant::now();
        // Next boundary stays on the original grid; skip past any overrun.
        let mut next = self.next + self.interval;
        while next <= boundary {
            next += self.interval;
        }
        self.next = next;
        boundary
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Deterministic clock for tests: virtual time, no sleeping.
#[derive(Debug)]
pub struct ManualClock {
    interval: Duration,
    now: Instant,
}

impl ManualClock {
    /// A clock whose virtual time starts now and advances `interval` per
    /// boundary.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            now: Instant::now(),
        }
    }

    /// The current virtual time.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.now
    }
}

impl FrameClock for ManualClock {
    fn wait_boundary(&mut self) -> Instant {
        self.now += self.interval;
        self.now
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Drives a scheduler's cycles from a frame clock.
#[derive(Debug)]
pub struct FramePump<C> {
    scheduler: Scheduler,
    clock: C,
}

impl<C: FrameClock> FramePump<C> {
    /// Couple `scheduler` to `clock`.
    #[must_use]
    pub fn new(scheduler: Scheduler, clock: C) -> Self {
        Self { scheduler, clock }
    }

    /// The driven scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The underlying clock.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Advance to the next frame boundary and run one cycle if armed.
    ///
    /// An unarmed scheduler skips the cycle entirely: no sort, no counter
    /// updates (returns [`CycleOutcome::Idle`]).
    pub fn pump_once(&mut self) -> CycleOutcome {
        let now = self.clock.wait_boundary();
        if !self.scheduler.is_armed() {
            return CycleOutcome::Idle;
        }
        self.scheduler.run_cycle(now)
    }

    /// Pump frames until the scheduler disarms or `max_frames` elapse.
    /// Returns the number of frames consumed.
    pub fn run_until_idle(&mut self, max_frames: usize) -> usize {
        let mut frames = 0;
        while frames < max_frames && self.scheduler.is_armed() {
            self.pump_once();
            frames += 1;
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use cadre_core::config::SchedulerConfig;
    use cadre_core::op::SubmitOp;

    use super::*;

    fn frame_ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn manual_clock_advances_by_interval() {
        let mut clock = ManualClock::new(frame_ms(16));
        let start = clock.now();
        let first = clock.wait_boundary();
        let second = clock.wait_boundary();
        assert_eq!(first - start, frame_ms(16));
        assert_eq!(second - first, frame_ms(16));
    }

    #[test]
    fn unarmed_pump_is_idle_and_free() {
        let scheduler = Scheduler::new(SchedulerConfig::default());
        let mut pump = FramePump::new(scheduler.clone(), ManualClock::new(frame_ms(16)));
        assert_eq!(pump.pump_once(), CycleOutcome::Idle);
        assert_eq!(scheduler.metrics().cycles_run, 0);
    }

    #[test]
    fn run_until_idle_drains_a_capped_backlog() {
        let scheduler = Scheduler::new(SchedulerConfig::default().with_max_batch_size(2));
        let hits = Rc::new(Cell::new(0u32));
        for i in 0..5 {
            let hits = Rc::clone(&hits);
            scheduler.schedule(SubmitOp::new(format!("op-{i}"), move || {
                hits.set(hits.get() + 1);
                Ok(())
            }));
        }

        let mut pump = FramePump::new(scheduler.clone(), ManualClock::new(frame_ms(16)));
        let frames = pump.run_until_idle(100);
        assert_eq!(frames, 3, "5 ops at cap 2 need 3 cycles");
        assert_eq!(hits.get(), 5);
        assert!(!scheduler.is_armed());
    }

    #[test]
    fn run_until_idle_respects_frame_budget() {
        let scheduler = Scheduler::new(SchedulerConfig::default().with_max_batch_size(1));
        for i in 0..10 {
            scheduler.schedule(SubmitOp::new(format!("op-{i}"), || Ok(())));
        }

        let mut pump = FramePump::new(scheduler.clone(), ManualClock::new(frame_ms(16)));
        assert_eq!(pump.run_until_idle(4), 4);
        assert!(scheduler.is_armed(), "budget exhausted with work remaining");
        assert_eq!(scheduler.pending_len(), 6);
    }

    #[test]
    fn deferred_work_promotes_on_virtual_time() {
        let scheduler = Scheduler::new(SchedulerConfig::default());
        let hits = Rc::new(Cell::new(0u32));
        let mut pump = FramePump::new(scheduler.clone(), ManualClock::new(frame_ms(16)));

        {
            let hits = Rc::clone(&hits);
            scheduler.schedule_after(
                frame_ms(40),
                SubmitOp::new("late", move || {
                    hits.set(hits.get() + 1);
                    Ok(())
                }),
            );
        }

        // Boundaries at +16 and +32ms: before the 40ms deadline.
        assert_eq!(pump.pump_once(), CycleOutcome::Idle);
        assert_eq!(pump.pump_once(), CycleOutcome::Idle);
        assert_eq!(hits.get(), 0);
        assert!(scheduler.is_armed());

        // +48ms: past the deadline.
        assert!(matches!(pump.pump_once(), CycleOutcome::Ran { executed: 1, .. }));
        assert_eq!(hits.get(), 1);
        assert!(!scheduler.is_armed());
    }

    #[test]
    fn interval_clock_reports_real_boundaries() {
        let mut clock = IntervalClock::new(frame_ms(1));
        let start = Instant::now();
        let first = clock.wait_boundary();
        let second = clock.wait_boundary();
        assert!(first >= start);
        assert!(second > first);
    }
}
