use std::time::Instant;

/// Monotonic milliseconds.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since the clock was created.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Scan,
    Display,
}

#[derive(Debug, Clone, Copy)]
pub struct PeriodicTask {
    pub task: Task,
    pub interval_ms: u64,
    last_run_ms: Option<u64>,
}

impl PeriodicTask {
    pub fn new(task: Task, interval_ms: u64) -> Self {
        Self {
            task,
            interval_ms,
            last_run_ms: None,
        }
    }

    /// Never run tasks are due right away.
    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_run_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        }
    }
}

/// Cooperative timers, polled once per loop iteration.
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<PeriodicTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: Task, interval_ms: u64) {
        self.tasks.push(PeriodicTask::new(task, interval_ms));
    }

    /// Changes the interval without resetting the last run.
    pub fn set_interval(&mut self, task: Task, interval_ms: u64) {
        for periodic in self.tasks.iter_mut().filter(|p| p.task == task) {
            periodic.interval_ms = interval_ms;
        }
    }

    pub fn interval(&self, task: Task) -> Option<u64> {
        self.tasks
            .iter()
            .find(|p| p.task == task)
            .map(|p| p.interval_ms)
    }

    /// Returns the due tasks in registration order and marks them as run.
    pub fn poll(&mut self, now_ms: u64) -> Vec<Task> {
        let mut due = Vec::new();

        for periodic in self.tasks.iter_mut() {
            if periodic.is_due(now_ms) {
                periodic.last_run_ms = Some(now_ms);
                due.push(periodic.task);
            }
        }

        due
    }
}
