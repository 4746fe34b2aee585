//! Provenance tracking for derived datasets and metrics.

use serde::{Deserialize, Serialize};

/// One stage applied on the way to a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceStep {
    /// Stage name (load, filter, join, ...).
    pub stage: String,
    /// Human-readable parameters of the stage.
    pub detail: String,
}

/// Ordered record of the stages that produced a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub steps: Vec<ProvenanceStep>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step, returning the extended provenance.
    pub fn with_step(mut self, stage: impl Into<String>, detail: impl Into<String>) -> Self {
        self.steps.push(ProvenanceStep {
            stage: stage.into(),
            detail: detail.into(),
        });
        self
    }

    /// Combine the histories of two inputs (left first).
    pub fn merge(left: &Provenance, right: &Provenance) -> Self {
        let mut steps = left.steps.clone();
        steps.extend(right.steps.iter().cloned());
        Self { steps }
    }

    /// One line per step, for logs and reports.
    pub fn describe(&self) -> String {
        self.steps
            .iter()
            .map(|s| format!("{}: {}", s.stage, s.detail))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// A scalar derived from one or more datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetric {
    pub name: String,
    pub value: f64,
    /// Stages that produced the input this metric was computed from.
    pub provenance: Provenance,
}
