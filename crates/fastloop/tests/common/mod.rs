use fastloop::{Computation, ProgressSink};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Echoes the payload back unchanged, for any payload type.
pub struct Echo;

impl<T: Send + 'static> Computation<T, T> for Echo {
    fn run(&self, _index: usize, payload: T) -> T {
        payload
    }
}

/// Echoes the payload back after a short sleep, so results from
/// different workers interleave.
#[derive(Clone)]
pub struct SlowEcho {
    pub delay: Duration,
}

impl Computation<f64, f64> for SlowEcho {
    fn run(&self, _index: usize, payload: f64) -> f64 {
        thread::sleep(self.delay);
        payload
    }
}

/// Counts every invocation, for lifecycle assertions.
#[derive(Clone)]
pub struct CountingComputation {
    pub counter: Arc<AtomicUsize>,
}

impl Computation<usize, usize> for CountingComputation {
    fn run(&self, _index: usize, payload: usize) -> usize {
        self.counter.fetch_add(1, Ordering::SeqCst);
        payload
    }
}

/// Tracks how many computations run at the same instant across all
/// workers, and the highest count ever observed.
#[derive(Clone)]
pub struct ConcurrencyProbe {
    pub active: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Computation<usize, usize> for ConcurrencyProbe {
    fn run(&self, _index: usize, payload: usize) -> usize {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
        self.active.fetch_sub(1, Ordering::SeqCst);
        payload
    }
}

/// Panics on one specific index; every other job echoes. Used to
/// simulate a worker dying mid-run.
pub struct PanicOn {
    pub index: usize,
}

impl Computation<usize, usize> for PanicOn {
    fn run(&self, index: usize, payload: usize) -> usize {
        if index == self.index {
            panic!("injected failure for job {index}");
        }
        payload
    }
}

/// Classifies optional payloads: present values pass through with an
/// "ok" tag, missing ones become NaN tagged "invalid_input".
pub struct ClassifyPayload;

impl Computation<Option<f64>, (f64, &'static str)> for ClassifyPayload {
    fn run(&self, _index: usize, payload: Option<f64>) -> (f64, &'static str) {
        match payload {
            Some(value) => (value, "ok"),
            None => (f64::NAN, "invalid_input"),
        }
    }
}

/// Collects every reported fraction and message for assertions.
#[derive(Default)]
pub struct RecordingProgress {
    pub fractions: Vec<f64>,
    pub messages: Vec<String>,
}

impl ProgressSink for RecordingProgress {
    fn report(&mut self, fraction: f64, message: &str, _started: Instant) {
        self.fractions.push(fraction);
        self.messages.push(message.to_owned());
    }
}
