//! Single-threaded run queue.

use std::collections::VecDeque;
use std::time::Duration;

use super::task::{Poll, Scheduler, Task, TaskId};

/// Round-robin cooperative scheduler. Each tick polls every task that was
/// queued when the tick started; tasks spawned during a tick wait for the next.
pub struct LocalScheduler {
    queue: VecDeque<Box<dyn Task>>,
    incoming: Vec<Box<dyn Task>>,
    next_id: u64,
    tick_interval: Option<Duration>,
    ticks: u64,
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            incoming: Vec::new(),
            next_id: 1,
            tick_interval: None,
            ticks: 0,
        }
    }

    /// Sleep this long between ticks (network-bound loops; tests leave it unset).
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = Some(interval);
        self
    }

    /// Number of queued tasks, including ones spawned during the current tick.
    pub fn len(&self) -> usize {
        self.queue.len() + self.incoming.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Poll every task queued at the start of the tick once.
    /// Returns the number of tasks that finished.
    pub fn tick(&mut self) -> usize {
        self.queue.extend(self.incoming.drain(..));
        let batch = self.queue.len();
        let mut finished = 0;
        for _ in 0..batch {
            let Some(mut task) = self.queue.pop_front() else {
                break;
            };
            match task.poll(self) {
                Poll::Pending => self.queue.push_back(task),
                Poll::Done => {
                    tracing::trace!(task = task.name(), "task finished");
                    finished += 1;
                }
            }
        }
        self.ticks += 1;
        finished
    }

    /// Tick until no tasks remain or `max_ticks` ticks have run.
    /// Returns true if the queue drained.
    pub fn run_until_idle(&mut self, max_ticks: u64) -> bool {
        for _ in 0..max_ticks {
            if self.is_empty() {
                return true;
            }
            self.tick();
            if let Some(interval) = self.tick_interval {
                std::thread::sleep(interval);
            }
        }
        self.is_empty()
    }

    /// Tick until `done` returns true, the queue drains, or `max_ticks` elapse.
    pub fn run_until<F>(&mut self, max_ticks: u64, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        for _ in 0..max_ticks {
            if done() {
                return true;
            }
            if self.is_empty() {
                return false;
            }
            self.tick();
            if let Some(interval) = self.tick_interval {
                std::thread::sleep(interval);
            }
        }
        done()
    }
}

impl Scheduler for LocalScheduler {
    fn new_task_id(&mut self) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        id
    }

    fn schedule(&mut self, task: Box<dyn Task>) {
        self.incoming.push(task);
    }
}
