//! Classifier doubles for pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::{ClassificationError, Classifier};
use crate::models::Classification;

/// Returns a settable classification and counts calls.
pub struct FixedClassifier {
    result: Mutex<Result<Classification, String>>,
    calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(classification: Classification) -> Self {
        Self {
            result: Mutex::new(Ok(classification)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Mutex::new(Err(message.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, classification: Classification) {
        *self.result.lock().unwrap() = Ok(classification);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for FixedClassifier {
    fn classify(&self, _bytes: &[u8]) -> Result<Classification, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .lock()
            .unwrap()
            .clone()
            .map_err(ClassificationError::Unavailable)
    }
}

#[derive(Default)]
struct GateState {
    entered: usize,
    open: bool,
}

/// Blocks inside `classify` until [`GatedClassifier::open`] is called.
pub struct GatedClassifier {
    classification: Classification,
    state: Mutex<GateState>,
    changed: Condvar,
}

impl GatedClassifier {
    pub fn new(classification: Classification) -> Self {
        Self {
            classification,
            state: Mutex::new(GateState::default()),
            changed: Condvar::new(),
        }
    }

    /// Wait until `n` calls are parked at the gate.
    pub fn wait_entered(&self, n: usize) {
        let state = self.state.lock().unwrap();
        let (_state, timeout) = self
            .changed
            .wait_timeout_while(state, Duration::from_secs(10), |s| s.entered < n)
            .unwrap();
        assert!(!timeout.timed_out(), "classifier was never entered");
    }

    pub fn open(&self) {
        self.state.lock().unwrap().open = true;
        self.changed.notify_all();
    }
}

impl Classifier for GatedClassifier {
    fn classify(&self, _bytes: &[u8]) -> Result<Classification, ClassificationError> {
        let mut state = self.state.lock().unwrap();
        state.entered += 1;
        self.changed.notify_all();
        while !state.open {
            state = self.changed.wait(state).unwrap();
        }
        Ok(self.classification.clone())
    }
}
