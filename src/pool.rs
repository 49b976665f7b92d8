//! Worker pool that time-slices reader and writer tasks into phases.
//!
//! Mutating work is queued separately from read-only work. A timer thread
//! alternates the active phase so that writers get a guaranteed share of
//! the workers while reader bursts still run wide. In the default
//! (non-interlap) mode the two kinds never execute concurrently: the timer
//! waits for the outgoing phase's in-flight tasks to drain before waking
//! workers for the next one. A phase never flips away from the only
//! non-empty queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{FindexError, Result};

/// The shortest phase duration the scheduler accepts, in seconds.
pub const MIN_PHASE_SECS: f32 = 0.5;

// Tolerance for values that round-trip through IEEE-754 on the wire.
// Tight enough that 0.499 still counts as below the floor.
const PHASE_EPSILON: f32 = 1.0e-4;

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Reader,
    Writer,
}

impl Phase {
    fn other(self) -> Phase {
        match self {
            Phase::Reader => Phase::Writer,
            Phase::Writer => Phase::Reader,
        }
    }
}

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads (the timer thread is extra).
    pub workers: usize,
    /// Writer phase duration in seconds.
    pub writer_phase: f32,
    /// Reader phase duration in seconds.
    pub reader_phase: f32,
    /// Allow reader and writer tasks to execute concurrently.
    pub can_interlap: bool,
    /// Begin with the writer phase active.
    pub start_with_writers: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            workers: num_cpus::get(),
            writer_phase: 0.5,
            reader_phase: 5.0,
            can_interlap: false,
            start_with_writers: false,
        }
    }
}

struct PoolState {
    reader_tasks: VecDeque<Task>,
    writer_tasks: VecDeque<Task>,
    phase: Phase,
    readers_active: usize,
    writers_active: usize,
    paused: bool,
    terminated: bool,
    reader_phase: f32,
    writer_phase: f32,
    can_interlap: bool,
}

impl PoolState {
    fn queue_mut(&mut self, phase: Phase) -> &mut VecDeque<Task> {
        match phase {
            Phase::Reader => &mut self.reader_tasks,
            Phase::Writer => &mut self.writer_tasks,
        }
    }

    fn queue_len(&self, phase: Phase) -> usize {
        match phase {
            Phase::Reader => self.reader_tasks.len(),
            Phase::Writer => self.writer_tasks.len(),
        }
    }

    fn active_count(&self, phase: Phase) -> usize {
        match phase {
            Phase::Reader => self.readers_active,
            Phase::Writer => self.writers_active,
        }
    }

    fn bump(&mut self, phase: Phase, delta: isize) {
        let counter = match phase {
            Phase::Reader => &mut self.readers_active,
            Phase::Writer => &mut self.writers_active,
        };
        *counter = counter.checked_add_signed(delta).unwrap_or(0);
    }

    fn phase_duration(&self, phase: Phase) -> f32 {
        match phase {
            Phase::Reader => self.reader_phase,
            Phase::Writer => self.writer_phase,
        }
    }

    fn queues_empty(&self) -> bool {
        self.reader_tasks.is_empty() && self.writer_tasks.is_empty()
    }

    /// Pop a task respecting the current phase and interlap policy.
    /// Returns the task together with the phase it was queued under.
    fn try_pop(&mut self) -> Option<(Task, Phase)> {
        let active = self.phase;
        if self.can_interlap || self.active_count(active.other()) == 0 {
            if let Some(task) = self.queue_mut(active).pop_front() {
                return Some((task, active));
            }
        }
        // On shutdown with interlap the inactive queue is drained too.
        if self.terminated && self.can_interlap {
            let other = active.other();
            if let Some(task) = self.queue_mut(other).pop_front() {
                return Some((task, other));
            }
        }
        None
    }
}

struct PoolShared {
    state: Mutex<PoolState>,
    /// Workers wait here for runnable tasks.
    task_ready: Condvar,
    /// The timer waits here for an outgoing phase to drain.
    phase_idle: Condvar,
}

/// Worker pool with time-sliced reader/writer phases.
pub struct RwScheduledPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
}

impl RwScheduledPool {
    /// Spawn the worker and timer threads.
    pub fn new(config: PoolConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(FindexError::other("worker count must be non-zero"));
        }
        check_duration(config.writer_phase)?;
        check_duration(config.reader_phase)?;

        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                reader_tasks: VecDeque::new(),
                writer_tasks: VecDeque::new(),
                phase: if config.start_with_writers {
                    Phase::Writer
                } else {
                    Phase::Reader
                },
                readers_active: 0,
                writers_active: 0,
                paused: false,
                terminated: false,
                reader_phase: config.reader_phase,
                writer_phase: config.writer_phase,
                can_interlap: config.can_interlap,
            }),
            task_ready: Condvar::new(),
            phase_idle: Condvar::new(),
        });

        let workers = match (0..config.workers)
            .map(|ordinal| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("findex-worker-{ordinal}"))
                    .spawn(move || worker_loop(&shared))
                    .map_err(FindexError::Io)
            })
            .collect::<Result<Vec<_>>>()
        {
            Ok(workers) => workers,
            Err(err) => {
                // Release any worker that did start.
                shared.state.lock().terminated = true;
                shared.task_ready.notify_all();
                return Err(err);
            }
        };

        let timer = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("findex-phase-timer".to_string())
                .spawn(move || timer_loop(&shared))
                .map_err(FindexError::Io)?
        };

        Ok(RwScheduledPool {
            shared,
            workers,
            timer: Some(timer),
        })
    }

    /// Queue a read-only task. Silently dropped once terminated.
    pub fn spawn_reader<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(Phase::Reader, Box::new(task));
    }

    /// Queue a mutating task. Silently dropped once terminated.
    pub fn spawn_writer<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(Phase::Writer, Box::new(task));
    }

    fn spawn(&self, phase: Phase, task: Task) {
        let mut state = self.shared.state.lock();
        if state.terminated {
            debug!("pool terminated, dropping {phase:?} task");
            return;
        }
        state.queue_mut(phase).push_back(task);
        drop(state);
        self.shared.task_ready.notify_one();
    }

    /// Pause or resume task dispatch. In-flight tasks are unaffected.
    pub fn set_paused(&self, paused: bool) {
        let mut state = self.shared.state.lock();
        if state.terminated {
            return;
        }
        state.paused = paused;
        drop(state);
        if !paused {
            self.shared.task_ready.notify_all();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state.lock().paused
    }

    /// Update the reader phase duration; takes effect on the next sleep.
    pub fn set_reader_duration(&self, seconds: f32) -> Result<()> {
        check_duration(seconds)?;
        self.shared.state.lock().reader_phase = seconds;
        Ok(())
    }

    /// Update the writer phase duration; takes effect on the next sleep.
    pub fn set_writer_duration(&self, seconds: f32) -> Result<()> {
        check_duration(seconds)?;
        self.shared.state.lock().writer_phase = seconds;
        Ok(())
    }

    pub fn reader_duration(&self) -> f32 {
        self.shared.state.lock().reader_phase
    }

    pub fn writer_duration(&self) -> f32 {
        self.shared.state.lock().writer_phase
    }

    /// Shut the pool down and join every thread.
    ///
    /// With `immediately == false` both queues are drained first; with
    /// `immediately == true` pending tasks are discarded. In-flight tasks
    /// always run to completion.
    pub fn terminate(&mut self, immediately: bool) {
        {
            let mut state = self.shared.state.lock();
            if state.terminated {
                return;
            }
            state.terminated = true;
            state.paused = false;
            if immediately {
                state.reader_tasks.clear();
                state.writer_tasks.clear();
            }
        }

        self.shared.task_ready.notify_all();
        self.shared.phase_idle.notify_all();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }
    }
}

impl Drop for RwScheduledPool {
    fn drop(&mut self) {
        self.terminate(false);
    }
}

fn check_duration(seconds: f32) -> Result<()> {
    if !seconds.is_finite() || seconds < MIN_PHASE_SECS - PHASE_EPSILON {
        return Err(FindexError::DurationTooSmall);
    }
    Ok(())
}

fn worker_loop(shared: &PoolShared) {
    loop {
        let (task, phase) = {
            let mut state = shared.state.lock();
            let popped = loop {
                if !state.paused {
                    if let Some(found) = state.try_pop() {
                        break Some(found);
                    }
                    if state.terminated && state.queues_empty() {
                        break None;
                    }
                }
                shared.task_ready.wait(&mut state);
            };

            match popped {
                Some((task, phase)) => {
                    state.bump(phase, 1);
                    (task, phase)
                }
                None => return,
            }
        };

        task();

        let terminated = {
            let mut state = shared.state.lock();
            state.bump(phase, -1);
            state.terminated
        };

        shared.phase_idle.notify_one();
        if terminated {
            // Make sure idle peers re-check the exit condition.
            shared.task_ready.notify_all();
        }
    }
}

fn timer_loop(shared: &PoolShared) {
    loop {
        let (sleep_secs, interlap) = {
            let state = shared.state.lock();
            (state.phase_duration(state.phase), state.can_interlap)
        };
        thread::sleep(Duration::from_secs_f32(sleep_secs));

        if interlap {
            {
                let mut state = shared.state.lock();
                if state.terminated && state.queues_empty() {
                    return;
                }
                if state.queue_len(state.phase.other()) > 0 {
                    state.phase = state.phase.other();
                }
            }
            shared.task_ready.notify_all();

            // The outgoing phase keeps at least its full duration to
            // itself; only start the next countdown once it has drained.
            let mut state = shared.state.lock();
            wait_until_idle(shared, &mut state);
        } else {
            {
                let mut state = shared.state.lock();
                if state.queue_len(state.phase.other()) > 0 {
                    state.phase = state.phase.other();
                } else if state.terminated {
                    return;
                }
                wait_until_idle(shared, &mut state);
            }
            shared.task_ready.notify_all();
        }
    }
}

/// Block until the phase being left has no in-flight tasks.
fn wait_until_idle(shared: &PoolShared, state: &mut MutexGuard<'_, PoolState>) {
    loop {
        let leaving = state.phase.other();
        if state.active_count(leaving) == 0 {
            return;
        }
        shared.phase_idle.wait(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quick_config(workers: usize) -> PoolConfig {
        PoolConfig {
            workers,
            writer_phase: 0.5,
            reader_phase: 0.5,
            can_interlap: false,
            start_with_writers: false,
        }
    }

    #[test]
    fn test_duration_floor() {
        assert!(check_duration(0.5).is_ok());
        assert!(check_duration(0.4999).is_ok()); // inside tolerance
        assert!(matches!(check_duration(0.499), Err(FindexError::DurationTooSmall)));
        assert!(matches!(check_duration(0.4), Err(FindexError::DurationTooSmall)));
        assert!(matches!(check_duration(f32::NAN), Err(FindexError::DurationTooSmall)));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = PoolConfig {
            workers: 0,
            ..PoolConfig::default()
        };
        assert!(RwScheduledPool::new(config).is_err());
    }

    #[test]
    fn test_runs_reader_tasks() {
        let pool = RwScheduledPool::new(quick_config(4)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..32 {
            let counter = Arc::clone(&counter);
            pool.spawn_reader(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        drop(pool); // terminate(false) drains the queues
        assert_eq!(counter.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn test_drains_both_queues_on_terminate() {
        let mut pool = RwScheduledPool::new(quick_config(2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let c = Arc::clone(&counter);
            pool.spawn_reader(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
            let c = Arc::clone(&counter);
            pool.spawn_writer(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.terminate(false);
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn test_immediate_terminate_discards_pending() {
        let mut pool = RwScheduledPool::new(PoolConfig {
            workers: 1,
            start_with_writers: true,
            ..quick_config(1)
        }).unwrap();

        // A long writer task keeps the lone worker busy while more tasks pile up.
        let ran = Arc::new(AtomicUsize::new(0));
        {
            let ran = Arc::clone(&ran);
            pool.spawn_writer(move || {
                ran.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(300));
            });
        }
        thread::sleep(Duration::from_millis(100));
        for _ in 0..16 {
            let ran = Arc::clone(&ran);
            pool.spawn_writer(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.terminate(true);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_spawn_after_terminate_is_dropped() {
        let mut pool = RwScheduledPool::new(quick_config(1)).unwrap();
        pool.terminate(false);

        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        pool.spawn_reader(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duration_updates_visible() {
        let pool = RwScheduledPool::new(quick_config(1)).unwrap();
        pool.set_writer_duration(1.0).unwrap();
        pool.set_reader_duration(2.5).unwrap();
        assert_eq!(pool.writer_duration(), 1.0);
        assert_eq!(pool.reader_duration(), 2.5);
        assert!(matches!(
            pool.set_writer_duration(0.4),
            Err(FindexError::DurationTooSmall)
        ));
        // The rejected value leaves the setting untouched.
        assert_eq!(pool.writer_duration(), 1.0);
    }
}
