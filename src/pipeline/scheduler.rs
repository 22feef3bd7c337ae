//! Scheduler - Cooperative task queue with two lanes.
//!
//! All engine work runs as tasks:
//! - `Immediate` - render cycles started by root renders and state updates
//! - `Deferred` - passive effects and transitions, drained after immediate work
//!
//! A flush runs tasks until its [`Deadline`] says to yield. Work loop tasks
//! check the same deadline between units of work and re-queue themselves
//! when they run out of time, so a long render spreads over several flushes.
//!
//! There is no event loop here. The embedder calls [`Scheduler::flush`] from
//! its idle callback (see [`Scheduler::set_wake`]) or drains everything with
//! [`Scheduler::run_until_idle`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::Result;

// =============================================================================
// Lanes
// =============================================================================

/// Priority lane of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Immediate,
    Deferred,
}

impl Lane {
    pub(crate) fn bit(self) -> u8 {
        match self {
            Lane::Immediate => 1,
            Lane::Deferred => 2,
        }
    }
}

// =============================================================================
// Deadlines
// =============================================================================

/// Time budget of one flush.
pub trait Deadline {
    fn time_remaining(&self) -> Duration;

    /// Checked after every unit of work. May consume budget.
    fn should_yield(&mut self) -> bool {
        self.time_remaining().is_zero()
    }
}

/// Wall-clock budget, like an idle callback's deadline.
#[derive(Debug, Clone, Copy)]
pub struct FrameDeadline {
    end: Instant,
}

impl FrameDeadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            end: Instant::now() + budget,
        }
    }
}

impl Deadline for FrameDeadline {
    fn time_remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }
}

/// Never yields.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl Deadline for Unbounded {
    fn time_remaining(&self) -> Duration {
        Duration::MAX
    }

    fn should_yield(&mut self) -> bool {
        false
    }
}

/// Yields after a fixed number of units of work. Deterministic, for tests.
#[derive(Debug, Clone, Copy)]
pub struct UnitBudget {
    remaining: usize,
}

impl UnitBudget {
    pub fn new(units: usize) -> Self {
        Self { remaining: units }
    }
}

impl Deadline for UnitBudget {
    fn time_remaining(&self) -> Duration {
        if self.remaining == 0 {
            Duration::ZERO
        } else {
            Duration::MAX
        }
    }

    fn should_yield(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Scheduler options.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Budget of [`Scheduler::flush_frame`].
    pub frame_budget: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_budget: Duration::from_millis(5),
        }
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Unit of scheduled work.
pub type Task = Box<dyn FnOnce(&mut dyn Deadline) -> Result<()>>;

struct Queued {
    task: Task,
    /// Run with updates routed to the deferred lane.
    transition: bool,
}

struct SchedulerInner {
    config: SchedulerConfig,
    immediate: RefCell<VecDeque<Queued>>,
    deferred: RefCell<VecDeque<Queued>>,
    flushing: Cell<bool>,
    transition_depth: Cell<u32>,
    wake: RefCell<Option<Rc<dyn Fn()>>>,
}

/// Shared handle to a task queue. Clones refer to the same queue.
#[derive(Clone)]
pub struct Scheduler(Rc<SchedulerInner>);

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self(Rc::new(SchedulerInner {
            config,
            immediate: RefCell::new(VecDeque::new()),
            deferred: RefCell::new(VecDeque::new()),
            flushing: Cell::new(false),
            transition_depth: Cell::new(0),
            wake: RefCell::new(None),
        }))
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.0.config
    }

    /// Callback invoked when work is queued on an idle scheduler, or a flush
    /// ends with work left. Typically requests an idle callback that flushes.
    pub fn set_wake(&self, wake: impl Fn() + 'static) {
        *self.0.wake.borrow_mut() = Some(Rc::new(wake));
    }

    /// Queue a task at the back of `lane`.
    pub fn schedule(&self, lane: Lane, task: Task) {
        self.push(lane, Queued { task, transition: false });
    }

    /// Run `work` later on the deferred lane. State updates it dispatches
    /// render on the deferred lane too.
    pub fn start_transition(&self, work: impl FnOnce() + 'static) {
        let task: Task = Box::new(move |_: &mut dyn Deadline| {
            work();
            Ok(())
        });
        self.push(Lane::Deferred, Queued { task, transition: true });
    }

    /// Lane for updates dispatched right now.
    pub fn update_lane(&self) -> Lane {
        if self.0.transition_depth.get() > 0 {
            Lane::Deferred
        } else {
            Lane::Immediate
        }
    }

    pub fn is_idle(&self) -> bool {
        self.pending_tasks() == 0
    }

    pub fn pending_tasks(&self) -> usize {
        self.0.immediate.borrow().len() + self.0.deferred.borrow().len()
    }

    fn push(&self, lane: Lane, queued: Queued) {
        let was_idle = self.is_idle();
        match lane {
            Lane::Immediate => self.0.immediate.borrow_mut().push_back(queued),
            Lane::Deferred => self.0.deferred.borrow_mut().push_back(queued),
        }
        if was_idle && !self.0.flushing.get() {
            self.wake();
        }
    }

    fn wake(&self) {
        let wake = self.0.wake.borrow().clone();
        if let Some(wake) = wake {
            wake();
        }
    }

    fn pop(&self) -> Option<Queued> {
        let next = self.0.immediate.borrow_mut().pop_front();
        next.or_else(|| self.0.deferred.borrow_mut().pop_front())
    }

    /// Run queued tasks, immediate lane first, until `deadline` expires or
    /// both lanes are empty.
    ///
    /// Re-entrant calls (from inside a task) return immediately. The first
    /// failing task's error is returned; tasks behind it stay queued.
    pub fn flush(&self, deadline: &mut dyn Deadline) -> Result<()> {
        if self.0.flushing.replace(true) {
            return Ok(());
        }
        let result = self.flush_inner(deadline);
        self.0.flushing.set(false);

        if !self.is_idle() {
            trace!(pending = self.pending_tasks(), "flush yielded with work left");
            self.wake();
        }
        result
    }

    fn flush_inner(&self, deadline: &mut dyn Deadline) -> Result<()> {
        while !deadline.time_remaining().is_zero() {
            let Some(Queued { task, transition }) = self.pop() else {
                break;
            };
            if transition {
                let depth = &self.0.transition_depth;
                depth.set(depth.get() + 1);
                let result = task(deadline);
                depth.set(depth.get() - 1);
                result?;
            } else {
                task(deadline)?;
            }
        }
        Ok(())
    }

    /// Flush with a [`FrameDeadline`] of the configured frame budget.
    pub fn flush_frame(&self) -> Result<()> {
        self.flush(&mut FrameDeadline::new(self.0.config.frame_budget))
    }

    /// Flush until both lanes are empty.
    pub fn run_until_idle(&self) -> Result<()> {
        self.flush(&mut Unbounded)
    }

    /// Run `f`, then drain every task it caused, deferred work included.
    ///
    /// Intended for tests: assertions after `act` see the fully committed
    /// tree with passive effects flushed.
    pub fn act<T>(&self, f: impl FnOnce() -> T) -> Result<T> {
        let value = f();
        self.run_until_idle()?;
        Ok(value)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("immediate", &self.0.immediate.borrow().len())
            .field("deferred", &self.0.deferred.borrow().len())
            .field("flushing", &self.0.flushing.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HostError, ReconcileError};

    fn log_task(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> Task {
        let log = log.clone();
        Box::new(move |_: &mut dyn Deadline| {
            log.borrow_mut().push(name);
            Ok(())
        })
    }

    #[test]
    fn test_immediate_before_deferred() {
        let scheduler = Scheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        scheduler.schedule(Lane::Deferred, log_task(&log, "deferred"));
        scheduler.schedule(Lane::Immediate, log_task(&log, "a"));
        scheduler.schedule(Lane::Immediate, log_task(&log, "b"));
        scheduler.run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec!["a", "b", "deferred"]);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_tasks_queued_while_flushing_run_in_same_flush() {
        let scheduler = Scheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = scheduler.clone();
        let inner_log = log.clone();
        scheduler.schedule(
            Lane::Immediate,
            Box::new(move |_: &mut dyn Deadline| {
                inner.schedule(Lane::Deferred, log_task(&inner_log, "later"));
                Ok(())
            }),
        );
        scheduler.run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec!["later"]);
    }

    #[test]
    fn test_reentrant_flush_is_noop() {
        let scheduler = Scheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = scheduler.clone();
        scheduler.schedule(
            Lane::Immediate,
            Box::new(move |_: &mut dyn Deadline| {
                inner.run_until_idle()?;
                Ok(())
            }),
        );
        scheduler.schedule(Lane::Immediate, log_task(&log, "second"));
        scheduler.run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec!["second"]);
    }

    #[test]
    fn test_error_leaves_rest_queued() {
        let scheduler = Scheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        scheduler.schedule(
            Lane::Immediate,
            Box::new(|_: &mut dyn Deadline| Err(ReconcileError::from(HostError::new("append_child", "boom")))),
        );
        scheduler.schedule(Lane::Immediate, log_task(&log, "after"));
        assert!(scheduler.run_until_idle().is_err());
        assert_eq!(scheduler.pending_tasks(), 1);
        scheduler.run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec!["after"]);
    }

    #[test]
    fn test_unit_budget_stops_flush() {
        let scheduler = Scheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["a", "b", "c"] {
            let log = log.clone();
            scheduler.schedule(
                Lane::Immediate,
                Box::new(move |deadline: &mut dyn Deadline| {
                    log.borrow_mut().push(name);
                    deadline.should_yield();
                    Ok(())
                }),
            );
        }
        scheduler.flush(&mut UnitBudget::new(2)).unwrap();
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(scheduler.pending_tasks(), 1);
    }

    #[test]
    fn test_wake_on_first_task_only() {
        let scheduler = Scheduler::default();
        let wakes = Rc::new(Cell::new(0));
        let counter = wakes.clone();
        scheduler.set_wake(move || counter.set(counter.get() + 1));
        scheduler.schedule(Lane::Immediate, Box::new(|_: &mut dyn Deadline| Ok(())));
        scheduler.schedule(Lane::Immediate, Box::new(|_: &mut dyn Deadline| Ok(())));
        assert_eq!(wakes.get(), 1);
        scheduler.run_until_idle().unwrap();
        assert_eq!(wakes.get(), 1);
    }

    #[test]
    fn test_transition_routes_updates_to_deferred_lane() {
        let scheduler = Scheduler::default();
        let seen = Rc::new(Cell::new(None));
        let (inner, seen_inner) = (scheduler.clone(), seen.clone());
        assert_eq!(scheduler.update_lane(), Lane::Immediate);
        scheduler.start_transition(move || seen_inner.set(Some(inner.update_lane())));
        scheduler.run_until_idle().unwrap();
        assert_eq!(seen.get(), Some(Lane::Deferred));
        assert_eq!(scheduler.update_lane(), Lane::Immediate);
    }

    #[test]
    fn test_act_drains_everything() {
        let scheduler = Scheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let value = scheduler
            .act(|| {
                scheduler.schedule(Lane::Deferred, log_task(&log, "effect"));
                7
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(*log.borrow(), vec!["effect"]);
    }
}
