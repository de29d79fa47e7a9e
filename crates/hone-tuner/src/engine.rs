//! The search engine: warm start from remembered bounds, a per-dimension
//! sensitivity pass, then greedy coordinate bisection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use hone_types::{HoneResult, ParameterSet, RoundDirection};

use crate::objective::ObjectiveAdapter;
use crate::reminder::ReminderStore;

/// Tunables for one search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Hard cap on bisection iterations.
    pub max_iterations: usize,
    /// How many top-ranked reminders to try during warm start.
    pub remind_budget: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            remind_budget: 5,
        }
    }
}

impl SearchConfig {
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_remind_budget(mut self, n: usize) -> Self {
        self.remind_budget = n;
        self
    }
}

/// Mutable engine state, threaded explicitly through each phase of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchState {
    /// 1-based bisection iteration counter.
    pub iteration: usize,
    /// Dimension currently being probed or narrowed.
    pub active_index: usize,
    /// Best (smallest) objective value seen so far.
    pub best_value: f64,
}

impl SearchState {
    fn new() -> Self {
        Self {
            iteration: 1,
            active_index: 0,
            best_value: f64::INFINITY,
        }
    }
}

/// When to declare the search finished.
pub enum StopCondition {
    /// Stop as soon as the objective drops below this value.
    Threshold(f64),
    /// Arbitrary predicate over the engine state and the latest value.
    Predicate(Box<dyn FnMut(&SearchState, f64) -> bool>),
    /// Never stop early; run until stall or the iteration cap.
    Never,
}

impl StopCondition {
    fn satisfied(&mut self, state: &SearchState, value: f64) -> bool {
        match self {
            Self::Threshold(limit) => value < *limit,
            Self::Predicate(predicate) => predicate(state, value),
            Self::Never => false,
        }
    }
}

impl Default for StopCondition {
    fn default() -> Self {
        Self::Never
    }
}

impl From<f64> for StopCondition {
    fn from(limit: f64) -> Self {
        Self::Threshold(limit)
    }
}

/// Terminal result of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SearchOutcome {
    /// The stop condition fired at this objective value.
    Found { result: f64 },
    /// The search gave up without satisfying the stop condition.
    Abort { reason: AbortReason },
}

impl SearchOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Why a search gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// No dimension's narrowing improved the objective, twice in a row.
    Stalled,
    /// The iteration cap was reached.
    MaxIterations,
}

/// Summary of one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub id: Uuid,
    pub identity: Option<String>,
    pub outcome: SearchOutcome,
    pub iterations: usize,
    pub evaluations: usize,
    pub best_value: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Per-dimension impact score from the sensitivity pass, kept current as the
/// bisection loop commits narrowings.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DimensionFactor {
    factor: f64,
    value: f64,
}

/// Result of the sensitivity pass: either one impact score per dimension, or
/// an early hit on the stop condition.
enum Sensitivity {
    Factors(Vec<DimensionFactor>),
    Found(f64),
}

/// Drives the iterative bisection loop over a [`ParameterSet`], warm-started
/// from and recorded to an optional [`ReminderStore`].
pub struct SearchEngine {
    params: ParameterSet,
    config: SearchConfig,
    identity: Option<String>,
    store: Option<Box<dyn ReminderStore>>,
}

impl SearchEngine {
    pub fn new(params: ParameterSet) -> Self {
        Self {
            params,
            config: SearchConfig::default(),
            identity: None,
            store: None,
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a reminder store under the given search identity. Without one
    /// the engine neither warm-starts nor records successes.
    pub fn with_store(mut self, identity: impl Into<String>, store: Box<dyn ReminderStore>) -> Self {
        self.identity = Some(identity.into());
        self.store = Some(store);
        self
    }

    /// Current search bounds, resolved values included.
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Hand the (narrowed) parameter set back to the caller.
    pub fn into_params(self) -> ParameterSet {
        self.params
    }

    /// Run one search to completion. Every `Found` outcome is folded into
    /// the attached reminder store before this returns.
    pub fn run<F>(
        &mut self,
        objective: F,
        stop: impl Into<StopCondition>,
    ) -> HoneResult<SearchReport>
    where
        F: FnMut(&ParameterSet) -> HoneResult<f64>,
    {
        let started_at = Utc::now();
        let id = Uuid::new_v4();
        let mut stop = stop.into();
        let mut adapter = ObjectiveAdapter::new(objective);
        let mut state = SearchState::new();

        let (outcome, credited) = self.search(&mut adapter, &mut stop, &mut state)?;

        if outcome.is_found() {
            if let (Some(identity), Some(store)) = (&self.identity, &self.store) {
                store.record_success(identity, &self.params.snapshot(), state.iteration, credited)?;
            }
        }

        info!(
            "search finished after {} iterations ({} evaluations): {:?}",
            state.iteration,
            adapter.evaluations(),
            outcome
        );

        Ok(SearchReport {
            id,
            identity: self.identity.clone(),
            outcome,
            iterations: state.iteration,
            evaluations: adapter.evaluations(),
            best_value: state.best_value,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Phase 0: baseline and warm start. Returns the outcome plus the index
    /// of the reminder whose bounds were adopted without solving outright,
    /// if any; that one earns a soft credit should the search succeed.
    fn search<F>(
        &mut self,
        adapter: &mut ObjectiveAdapter<F>,
        stop: &mut StopCondition,
        state: &mut SearchState,
    ) -> HoneResult<(SearchOutcome, Option<usize>)>
    where
        F: FnMut(&ParameterSet) -> HoneResult<f64>,
    {
        let baseline = adapter.evaluate(&self.params)?;
        state.best_value = baseline;
        debug!("baseline over full bounds: {baseline}");
        if stop.satisfied(state, baseline) {
            return Ok((SearchOutcome::Found { result: baseline }, None));
        }

        let mut best_remind: Option<usize> = None;
        if let (Some(identity), Some(store)) = (&self.identity, &self.store) {
            let reminders = store.load(identity);
            for (index, reminder) in reminders
                .iter()
                .enumerate()
                .take(self.config.remind_budget)
            {
                self.params.apply_snapshot(&reminder.values)?;
                let value = adapter.evaluate(&self.params)?;
                debug!("reminder {index} scored {value}");
                if stop.satisfied(state, value) {
                    state.best_value = value;
                    return Ok((SearchOutcome::Found { result: value }, best_remind));
                }
                if value < state.best_value {
                    state.best_value = value;
                    best_remind = Some(index);
                }
            }

            match best_remind {
                Some(index) => {
                    info!(
                        "warm start: adopting remembered bounds {}",
                        serde_json::to_string(&reminders[index].values).unwrap_or_default()
                    );
                    self.params.apply_snapshot(&reminders[index].values)?;
                }
                None => self.params.reset_all(),
            }
        }

        let outcome = self.bisect(adapter, stop, state)?;
        Ok((outcome, best_remind))
    }

    /// Phase 1: probe each dimension's upper half once, committing nothing,
    /// to rank dimensions by how much they move the objective.
    fn sensitivity_pass<F>(
        &mut self,
        adapter: &mut ObjectiveAdapter<F>,
        stop: &mut StopCondition,
        state: &mut SearchState,
    ) -> HoneResult<Sensitivity>
    where
        F: FnMut(&ParameterSet) -> HoneResult<f64>,
    {
        let mut factors = Vec::with_capacity(self.params.len());
        for index in 0..self.params.len() {
            state.active_index = index;
            let saved_min = self.params.param(index).c_min;
            let probe = self.params.param(index).midpoint(RoundDirection::Ceil);
            self.params.param_mut(index).c_min = probe;

            let value = adapter.evaluate(&self.params)?;
            if stop.satisfied(state, value) {
                state.best_value = value;
                return Ok(Sensitivity::Found(value));
            }

            factors.push(DimensionFactor {
                factor: (state.best_value - value).abs(),
                value,
            });
            self.params.param_mut(index).c_min = saved_min;
            debug!(
                "sensitivity of {}: factor {} (value {})",
                self.params.param(index).name,
                factors[index].factor,
                factors[index].value
            );
        }
        Ok(Sensitivity::Factors(factors))
    }

    /// Phases 1 and 2: sensitivity pass, then greedy coordinate bisection
    /// until the stop condition fires, the search stalls, or the iteration
    /// cap is reached.
    fn bisect<F>(
        &mut self,
        adapter: &mut ObjectiveAdapter<F>,
        stop: &mut StopCondition,
        state: &mut SearchState,
    ) -> HoneResult<SearchOutcome>
    where
        F: FnMut(&ParameterSet) -> HoneResult<f64>,
    {
        let mut factors = match self.sensitivity_pass(adapter, stop, state)? {
            Sensitivity::Found(value) => return Ok(SearchOutcome::Found { result: value }),
            Sensitivity::Factors(factors) => factors,
        };
        if factors.is_empty() {
            // Nothing to narrow.
            return Ok(SearchOutcome::Abort {
                reason: AbortReason::Stalled,
            });
        }

        let mut selected = 0usize;
        let mut skip = false;
        let mut abort_pending = false;

        while state.iteration < self.config.max_iterations {
            if skip {
                skip = false;
            } else {
                selected = max_factor_index(&factors);
            }
            state.active_index = selected;

            let saved_min = self.params.param(selected).c_min;
            let saved_max = self.params.param(selected).c_max;

            // Try committing to the upper half, then restore.
            let up_mid = self.params.param(selected).midpoint(RoundDirection::Ceil);
            self.params.param_mut(selected).c_min = up_mid;
            let test_up = adapter.evaluate(&self.params)?;
            if stop.satisfied(state, test_up) {
                state.best_value = test_up;
                return Ok(SearchOutcome::Found { result: test_up });
            }
            self.params.param_mut(selected).c_min = saved_min;

            // Same for the lower half; the two trials never compound.
            let down_mid = self.params.param(selected).midpoint(RoundDirection::Floor);
            self.params.param_mut(selected).c_max = down_mid;
            let test_down = adapter.evaluate(&self.params)?;
            if stop.satisfied(state, test_down) {
                state.best_value = test_down;
                return Ok(SearchOutcome::Found { result: test_down });
            }
            self.params.param_mut(selected).c_max = saved_max;

            debug!(
                "iteration {}: {} up {} / down {} (best {})",
                state.iteration,
                self.params.param(selected).name,
                test_up,
                test_down,
                state.best_value
            );

            if test_up < state.best_value && test_up < test_down {
                abort_pending = false;
                factors[selected].factor = (state.best_value - test_up).abs();
                factors[selected].value = test_up;
                state.best_value = test_up;
                let mid = self.params.param(selected).midpoint(RoundDirection::Ceil);
                self.params.param_mut(selected).c_min = mid;
            } else if test_down < state.best_value && test_down < test_up {
                abort_pending = false;
                factors[selected].factor = (state.best_value - test_down).abs();
                factors[selected].value = test_down;
                state.best_value = test_down;
                let mid = self.params.param(selected).midpoint(RoundDirection::Floor);
                self.params.param_mut(selected).c_max = mid;
            } else {
                // Neither half improved: this dimension is exhausted for now.
                if abort_pending {
                    return Ok(SearchOutcome::Abort {
                        reason: AbortReason::Stalled,
                    });
                }
                abort_pending = true;
                factors[selected].factor = 0.0;
                if factors.iter().all(|f| f.factor == 0.0) {
                    skip = true;
                    selected = (selected + 1) % factors.len();
                }
            }

            state.iteration += 1;
        }

        Ok(SearchOutcome::Abort {
            reason: AbortReason::MaxIterations,
        })
    }
}

/// Index of the largest factor; the first-registered dimension wins ties.
fn max_factor_index(factors: &[DimensionFactor]) -> usize {
    let mut best = 0;
    for (index, candidate) in factors.iter().enumerate().skip(1) {
        if candidate.factor > factors[best].factor {
            best = index;
        }
    }
    best
}
