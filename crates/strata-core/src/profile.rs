//! Per-job profiling context.
//!
//! An explicit context object threaded through the entry points: metadata
//! describing the job's size and one timing per named step. The worker layer
//! decides what to do with the report (ship it, log it, drop it); the engine
//! only fills it in.

use std::collections::BTreeMap;
use std::time::Instant;

use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct ProfileStep {
    pub label: String,
    pub micros: u128,
}

#[derive(Debug)]
pub struct JobProfile {
    job: String,
    metadata: BTreeMap<String, Value>,
    steps: Vec<ProfileStep>,
    last: Instant,
}

impl JobProfile {
    pub fn new(job: impl Into<String>) -> Self {
        Self { job: job.into(), metadata: BTreeMap::new(), steps: Vec::new(), last: Instant::now() }
    }

    /// Attach one metadata entry; chainable.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Close the step that ran since the previous checkpoint.
    pub fn step(&mut self, label: impl Into<String>) {
        let now = Instant::now();
        self.steps.push(ProfileStep {
            label: label.into(),
            micros: now.duration_since(self.last).as_micros(),
        });
        self.last = now;
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn steps(&self) -> &[ProfileStep] {
        &self.steps
    }

    /// JSON report for the worker layer's profile sink.
    pub fn report(&self) -> Value {
        json!({
            "job": self.job,
            "metadata": self.metadata,
            "steps": self.steps.iter().map(|s| json!({
                "label": s.label,
                "micros": s.micros as u64,
            })).collect::<Vec<_>>(),
        })
    }
}
