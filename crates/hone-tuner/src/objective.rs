//! Objective normalization.

use hone_types::{HoneResult, ParameterSet};

/// Wraps the caller's objective so the engine always minimizes a
/// non-negative scalar, and counts evaluations for reporting.
///
/// Side effects inside the objective (I/O, logging, external state) are
/// opaque to the engine and tolerated; the objective is called once per
/// logical trial, strictly sequentially.
pub struct ObjectiveAdapter<F> {
    objective: F,
    evaluations: usize,
}

impl<F> ObjectiveAdapter<F>
where
    F: FnMut(&ParameterSet) -> HoneResult<f64>,
{
    pub fn new(objective: F) -> Self {
        Self {
            objective,
            evaluations: 0,
        }
    }

    /// One trial. The raw objective may return any sign; the engine works on
    /// its absolute value. Errors propagate to the caller unmodified.
    pub fn evaluate(&mut self, params: &ParameterSet) -> HoneResult<f64> {
        self.evaluations += 1;
        Ok((self.objective)(params)?.abs())
    }

    /// Number of trials performed so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}
