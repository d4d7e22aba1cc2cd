#![forbid(unsafe_code)]

//! End-to-end scheduler behavior through the frame pump: coalescing,
//! ordering, batch capping, fault isolation, metrics accounting, and
//! clear semantics.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use cadre_core::config::SchedulerConfig;
use cadre_core::geometry::Rect;
use cadre_core::op::{Priority, SubmitOp};
use cadre_runtime::pump::{FramePump, ManualClock};
use cadre_runtime::scheduler::Scheduler;
use cadre_runtime::visibility::VisibilityTracker;

type ExecLog = Rc<RefCell<Vec<String>>>;

fn logged_op(id: &str, priority: Priority, log: &ExecLog) -> SubmitOp {
    let log = Rc::clone(log);
    let name = id.to_owned();
    SubmitOp::new(id, move || {
        log.borrow_mut().push(name);
        Ok(())
    })
    .priority(priority)
}

fn pump_for(scheduler: &Scheduler) -> FramePump<ManualClock> {
    FramePump::new(scheduler.clone(), ManualClock::new(Duration::from_millis(16)))
}

// ============================================================================
// Coalescing
// ============================================================================

#[test]
fn n_submissions_one_execution_last_run_wins() {
    let scheduler = Scheduler::new(SchedulerConfig::default());
    let mut pump = pump_for(&scheduler);
    let log: ExecLog = Rc::default();

    for i in 0..4 {
        let log = Rc::clone(&log);
        scheduler.schedule(SubmitOp::new("refresh", move || {
            log.borrow_mut().push(format!("run-{i}"));
            Ok(())
        }));
    }

    pump.run_until_idle(4);
    assert_eq!(*log.borrow(), ["run-3"], "only the last-submitted action runs");
    assert_eq!(scheduler.metrics().ops_coalesced, 3);
    assert_eq!(scheduler.metrics().ops_executed, 1);
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn priority_order_high_medium_low() {
    let scheduler = Scheduler::new(SchedulerConfig::default());
    let mut pump = pump_for(&scheduler);
    let log: ExecLog = Rc::default();

    scheduler.schedule(logged_op("a", Priority::Low, &log));
    scheduler.schedule(logged_op("b", Priority::High, &log));
    scheduler.schedule(logged_op("c", Priority::Medium, &log));

    pump.run_until_idle(4);
    assert_eq!(*log.borrow(), ["b", "c", "a"]);
}

#[test]
fn visible_target_wins_the_priority_tie() {
    let scheduler = Scheduler::new(SchedulerConfig::default());
    let tracker = VisibilityTracker::new(scheduler.visibility_sink(), Rect::new(0, 0, 100, 100));
    let mut pump = pump_for(&scheduler);
    let log: ExecLog = Rc::default();

    scheduler.schedule(logged_op("offscreen", Priority::High, &log));
    scheduler.schedule(logged_op("onscreen", Priority::High, &log));
    tracker.observe("offscreen", Rect::new(900, 900, 10, 10));
    tracker.observe("onscreen", Rect::new(10, 10, 10, 10));

    pump.run_until_idle(4);
    assert_eq!(*log.borrow(), ["onscreen", "offscreen"]);
}

#[test]
fn visibility_ignored_when_disabled_falls_back_to_fifo() {
    let scheduler =
        Scheduler::new(SchedulerConfig::default().with_prioritize_visible(false));
    let tracker = VisibilityTracker::new(scheduler.visibility_sink(), Rect::new(0, 0, 100, 100));
    let mut pump = pump_for(&scheduler);
    let log: ExecLog = Rc::default();

    scheduler.schedule(logged_op("first", Priority::High, &log));
    scheduler.schedule(logged_op("second", Priority::High, &log));
    tracker.observe("second", Rect::new(10, 10, 10, 10));

    pump.run_until_idle(4);
    assert_eq!(*log.borrow(), ["first", "second"], "deterministic via submission order");
}

// ============================================================================
// Batch cap
// ============================================================================

#[test]
fn cap_two_spreads_five_ops_over_three_cycles_in_order() {
    let scheduler = Scheduler::new(SchedulerConfig::default().with_max_batch_size(2));
    let mut pump = pump_for(&scheduler);
    let log: ExecLog = Rc::default();

    for id in ["v", "w", "x", "y", "z"] {
        scheduler.schedule(logged_op(id, Priority::High, &log));
    }

    let frames = pump.run_until_idle(10);
    assert_eq!(frames, 3);
    assert_eq!(*log.borrow(), ["v", "w", "x", "y", "z"]);

    let metrics = scheduler.metrics();
    assert_eq!(metrics.cycles_run, 3);
    assert_eq!(metrics.ops_executed, 5);
}

#[test]
fn late_high_priority_overtakes_older_low_priority_backlog() {
    let scheduler = Scheduler::new(SchedulerConfig::default().with_max_batch_size(1));
    let mut pump = pump_for(&scheduler);
    let log: ExecLog = Rc::default();

    scheduler.schedule(logged_op("low-1", Priority::Low, &log));
    scheduler.schedule(logged_op("low-2", Priority::Low, &log));
    pump.pump_once();
    scheduler.schedule(logged_op("new-high", Priority::High, &log));
    pump.run_until_idle(10);

    assert_eq!(*log.borrow(), ["low-1", "new-high", "low-2"]);
}

// ============================================================================
// Fault isolation
// ============================================================================

#[test]
fn failing_op_is_skipped_not_retried_and_batch_continues() {
    let scheduler = Scheduler::new(SchedulerConfig::default());
    let mut pump = pump_for(&scheduler);
    let log: ExecLog = Rc::default();

    scheduler.schedule(logged_op("before", Priority::High, &log));
    scheduler.schedule(SubmitOp::new("bad", || Err("no surface".into())).priority(Priority::High));
    scheduler.schedule(logged_op("after", Priority::High, &log));

    let frames = pump.run_until_idle(10);
    assert_eq!(frames, 1, "one cycle: the failure does not re-arm anything");
    assert_eq!(*log.borrow(), ["before", "after"]);
    assert_eq!(scheduler.pending_len(), 0, "failed op removed, not retried");
}

// ============================================================================
// Metrics
// ============================================================================

#[test]
fn counters_sum_batches_across_cycles() {
    let scheduler = Scheduler::new(SchedulerConfig::default().with_max_batch_size(4));
    let mut pump = pump_for(&scheduler);

    // Cycle 1: 4 ops; cycle 2: 3 ops (the remainder).
    for i in 0..7 {
        scheduler.schedule(SubmitOp::new(format!("op-{i}"), || Ok(())));
    }
    pump.run_until_idle(10);

    // Cycle 3: 2 more ops.
    for i in 7..9 {
        scheduler.schedule(SubmitOp::new(format!("op-{i}"), || Ok(())));
    }
    pump.run_until_idle(10);

    let metrics = scheduler.metrics();
    assert_eq!(metrics.cycles_run, 3);
    assert_eq!(metrics.ops_executed, 9);
    assert!((metrics.average_batch_size - 3.0).abs() < 1e-9);
}

// ============================================================================
// Clear
// ============================================================================

#[test]
fn clear_empties_pending_keeps_counters_and_stops_cycles() {
    let scheduler = Scheduler::new(SchedulerConfig::default());
    let mut pump = pump_for(&scheduler);
    let log: ExecLog = Rc::default();

    scheduler.schedule(logged_op("ran", Priority::High, &log));
    pump.run_until_idle(4);
    let before = scheduler.metrics();

    scheduler.schedule(logged_op("dropped-1", Priority::High, &log));
    scheduler.schedule(logged_op("dropped-2", Priority::Low, &log));
    scheduler.clear();

    assert_eq!(pump.run_until_idle(8), 0, "no cycle fires until a new schedule");
    assert_eq!(*log.borrow(), ["ran"]);
    assert_eq!(scheduler.metrics(), before, "clear leaves counters untouched");

    scheduler.schedule(logged_op("revived", Priority::Medium, &log));
    pump.run_until_idle(4);
    assert_eq!(*log.borrow(), ["ran", "revived"]);
}

// ============================================================================
// Deduplication off
// ============================================================================

#[test]
fn dedup_off_still_replaces_but_counts_nothing() {
    let scheduler = Scheduler::new(SchedulerConfig::default().with_deduplication(false));
    let mut pump = pump_for(&scheduler);
    let log: ExecLog = Rc::default();

    for i in 0..3 {
        let log = Rc::clone(&log);
        scheduler.schedule(SubmitOp::new("same", move || {
            log.borrow_mut().push(format!("run-{i}"));
            Ok(())
        }));
    }

    pump.run_until_idle(4);
    assert_eq!(*log.borrow(), ["run-2"], "last write wins either way");
    assert_eq!(scheduler.metrics().ops_coalesced, 0);
}

// ============================================================================
// Identity hygiene
// ============================================================================

#[test]
fn distinct_ids_never_coalesce() {
    let scheduler = Scheduler::new(SchedulerConfig::default());
    let mut pump = pump_for(&scheduler);
    let log: ExecLog = Rc::default();

    scheduler.schedule(logged_op("list/row-1", Priority::Medium, &log));
    scheduler.schedule(logged_op("list/row-2", Priority::Medium, &log));
    assert_eq!(scheduler.pending_len(), 2);

    pump.run_until_idle(4);
    assert_eq!(log.borrow().len(), 2);
    assert_eq!(scheduler.metrics().ops_coalesced, 0);
}
