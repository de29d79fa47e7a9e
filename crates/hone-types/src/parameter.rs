//! Search dimensions: named parameters with immutable original bounds and a
//! current, shrinking search interval.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{HoneError, HoneResult};

/// Value transform applied to a raw midpoint before it reaches the objective
/// (e.g. forcing an odd blur-kernel size). Must be pure, idempotent, and
/// total over the parameter's legal range.
pub type Transform = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Rounding direction used when resolving an interval midpoint.
///
/// Narrowing from the lower edge uses `Ceil`, from the upper edge `Floor`;
/// the asymmetry guarantees the interval strictly shrinks even at width 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoundDirection {
    #[default]
    Floor,
    Ceil,
}

impl RoundDirection {
    fn apply(self, v: f64) -> f64 {
        match self {
            Self::Floor => v.floor(),
            Self::Ceil => v.ceil(),
        }
    }
}

/// Captured bounds of one dimension, used both for persistence and for
/// applying a remembered configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundsSnapshot {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

/// A single named search dimension.
///
/// `min`/`max` are the immutable original bounds; `c_min`/`c_max` the current
/// search interval. The invariant `min <= c_min <= c_max <= max` holds for
/// every operation the engine performs.
#[derive(Clone)]
pub struct Parameter {
    pub name: String,
    pub min: f64,
    pub max: f64,
    /// Lower edge of the current search interval.
    pub c_min: f64,
    /// Upper edge of the current search interval.
    pub c_max: f64,
    preprocess: Option<Transform>,
}

impl Parameter {
    fn new(name: String, min: f64, max: f64, preprocess: Option<Transform>) -> Self {
        Self {
            name,
            min,
            max,
            c_min: min,
            c_max: max,
            preprocess,
        }
    }

    /// Raw midpoint of the current interval, rounded in the given direction.
    pub fn midpoint(&self, direction: RoundDirection) -> f64 {
        direction.apply((self.c_max - self.c_min) / 2.0) + self.c_min
    }

    /// Midpoint of the current interval, optionally run through the
    /// parameter's preprocess transform.
    pub fn resolved(&self, direction: RoundDirection, apply_preprocess: bool) -> f64 {
        let raw = self.midpoint(direction);
        if apply_preprocess {
            if let Some(preprocess) = &self.preprocess {
                return preprocess(raw);
            }
        }
        raw
    }

    /// Restore the current interval to the original bounds.
    pub fn reset(&mut self) {
        self.c_min = self.min;
        self.c_max = self.max;
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("c_min", &self.c_min)
            .field("c_max", &self.c_max)
            .field("preprocess", &self.preprocess.is_some())
            .finish()
    }
}

/// Ordered set of search dimensions. Insertion order is significant: it is
/// the sensitivity-pass scan order and the round-robin fallback order.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    parameters: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    /// Register a dimension searched over `[min, max]`.
    pub fn add(&mut self, name: impl Into<String>, min: f64, max: f64) -> HoneResult<()> {
        self.insert(name.into(), min, max, None)
    }

    /// Register a dimension whose resolved values pass through `transform`
    /// before reaching the objective.
    pub fn add_with<F>(
        &mut self,
        name: impl Into<String>,
        min: f64,
        max: f64,
        transform: F,
    ) -> HoneResult<()>
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        let transform: Transform = Arc::new(transform);
        self.insert(name.into(), min, max, Some(transform))
    }

    fn insert(
        &mut self,
        name: String,
        min: f64,
        max: f64,
        preprocess: Option<Transform>,
    ) -> HoneResult<()> {
        if min > max {
            return Err(HoneError::InvalidBounds { name, min, max });
        }
        if self.index_of(&name).is_some() {
            return Err(HoneError::DuplicateParameter { name });
        }
        self.parameters.push(Parameter::new(name, min, max, preprocess));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Dimension names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }

    /// Dimension at `index`, in registration order.
    pub fn param(&self, index: usize) -> &Parameter {
        &self.parameters[index]
    }

    pub fn param_mut(&mut self, index: usize) -> &mut Parameter {
        &mut self.parameters[index]
    }

    fn find(&self, name: &str) -> HoneResult<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| HoneError::UnknownParameter {
                name: name.to_string(),
            })
    }

    /// Midpoint of the named dimension's current interval.
    pub fn resolved(
        &self,
        name: &str,
        direction: RoundDirection,
        apply_preprocess: bool,
    ) -> HoneResult<f64> {
        Ok(self.find(name)?.resolved(direction, apply_preprocess))
    }

    /// The value an objective reads for the named dimension: preprocessed
    /// floor-midpoint of the current interval.
    pub fn value(&self, name: &str) -> HoneResult<f64> {
        self.resolved(name, RoundDirection::Floor, true)
    }

    /// Resolved value per dimension, keyed by name.
    pub fn values(&self) -> BTreeMap<String, f64> {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.resolved(RoundDirection::Floor, true)))
            .collect()
    }

    /// Restore one dimension to its original bounds.
    pub fn reset(&mut self, name: &str) -> HoneResult<()> {
        let index = self
            .index_of(name)
            .ok_or_else(|| HoneError::UnknownParameter {
                name: name.to_string(),
            })?;
        self.parameters[index].reset();
        Ok(())
    }

    /// Restore every dimension to its original bounds.
    pub fn reset_all(&mut self) {
        for parameter in &mut self.parameters {
            parameter.reset();
        }
    }

    /// Serializable capture of the current search bounds, in registration
    /// order.
    pub fn snapshot(&self) -> Vec<BoundsSnapshot> {
        self.parameters
            .iter()
            .map(|p| BoundsSnapshot {
                name: p.name.clone(),
                min: p.c_min,
                max: p.c_max,
            })
            .collect()
    }

    /// Overwrite the current bounds of every dimension the snapshot names.
    /// Dimensions the snapshot does not mention keep their current bounds.
    /// No dimension is touched if any snapshot entry names an unregistered
    /// parameter.
    pub fn apply_snapshot(&mut self, bounds: &[BoundsSnapshot]) -> HoneResult<()> {
        let mut indices = Vec::with_capacity(bounds.len());
        for bound in bounds {
            let index = self
                .index_of(&bound.name)
                .ok_or_else(|| HoneError::UnknownParameter {
                    name: bound.name.clone(),
                })?;
            indices.push(index);
        }
        for (bound, index) in bounds.iter().zip(indices) {
            self.parameters[index].c_min = bound.min;
            self.parameters[index].c_max = bound.max;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> ParameterSet {
        let mut set = ParameterSet::new();
        set.add("threshold", 50.0, 150.0).unwrap();
        set.add("canny1", 50.0, 200.0).unwrap();
        set
    }

    #[test]
    fn add_initializes_current_bounds() {
        let set = sample_set();
        let p = set.param(0);
        assert_eq!(p.c_min, p.min);
        assert_eq!(p.c_max, p.max);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut set = sample_set();
        match set.add("threshold", 0.0, 1.0) {
            Err(HoneError::DuplicateParameter { name }) => assert_eq!(name, "threshold"),
            other => panic!("expected DuplicateParameter, got {other:?}"),
        }
    }

    #[test]
    fn inverted_bounds_rejected() {
        let mut set = ParameterSet::new();
        assert!(matches!(
            set.add("x", 10.0, 5.0),
            Err(HoneError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn midpoint_rounding_directions() {
        let mut set = ParameterSet::new();
        set.add("x", 0.0, 11.0).unwrap();
        // (11 - 0) / 2 = 5.5
        assert_eq!(
            set.resolved("x", RoundDirection::Floor, false).unwrap(),
            5.0
        );
        assert_eq!(set.resolved("x", RoundDirection::Ceil, false).unwrap(), 6.0);
    }

    #[test]
    fn resolved_stays_inside_current_interval() {
        let mut set = ParameterSet::new();
        set.add("x", 0.0, 100.0).unwrap();
        set.param_mut(0).c_min = 37.0;
        set.param_mut(0).c_max = 38.0;
        for direction in [RoundDirection::Floor, RoundDirection::Ceil] {
            let v = set.resolved("x", direction, false).unwrap();
            assert!(v >= 37.0 && v <= 38.0, "midpoint {v} escaped interval");
        }
    }

    #[test]
    fn preprocess_forces_parity() {
        let mut set = ParameterSet::new();
        // Blur kernels must be odd, as in the dice-detection pipeline.
        set.add_with("blur", 3.0, 31.0, |v| if v % 2.0 == 0.0 { v + 1.0 } else { v })
            .unwrap();
        let v = set.value("blur").unwrap();
        assert_eq!(v % 2.0, 1.0);
        // Raw midpoint of [3, 31] is 14; preprocess bumps it to 15.
        assert_eq!(v, 15.0);
        assert_eq!(
            set.resolved("blur", RoundDirection::Floor, false).unwrap(),
            14.0
        );
    }

    #[test]
    fn reset_restores_original_bounds() {
        let mut set = sample_set();
        set.param_mut(0).c_min = 90.0;
        set.param_mut(0).c_max = 110.0;
        set.reset("threshold").unwrap();
        assert_eq!(set.param(0).c_min, 50.0);
        assert_eq!(set.param(0).c_max, 150.0);

        set.param_mut(1).c_max = 60.0;
        set.reset_all();
        assert_eq!(set.param(1).c_max, 200.0);
    }

    #[test]
    fn snapshot_captures_current_bounds() {
        let mut set = sample_set();
        set.param_mut(0).c_min = 70.0;
        let snapshot = set.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].name, "threshold");
        assert_eq!(snapshot[0].min, 70.0);
        assert_eq!(snapshot[0].max, 150.0);
    }

    #[test]
    fn apply_snapshot_is_idempotent() {
        let mut set = sample_set();
        let bounds = vec![BoundsSnapshot {
            name: "canny1".to_string(),
            min: 60.0,
            max: 120.0,
        }];
        set.apply_snapshot(&bounds).unwrap();
        let first = set.snapshot();
        set.apply_snapshot(&bounds).unwrap();
        assert_eq!(set.snapshot(), first);
    }

    #[test]
    fn apply_snapshot_unknown_name_leaves_set_untouched() {
        let mut set = sample_set();
        let before = set.snapshot();
        let bounds = vec![
            BoundsSnapshot {
                name: "threshold".to_string(),
                min: 90.0,
                max: 110.0,
            },
            BoundsSnapshot {
                name: "missing".to_string(),
                min: 0.0,
                max: 1.0,
            },
        ];
        match set.apply_snapshot(&bounds) {
            Err(HoneError::UnknownParameter { name }) => assert_eq!(name, "missing"),
            other => panic!("expected UnknownParameter, got {other:?}"),
        }
        assert_eq!(set.snapshot(), before);
    }

    #[test]
    fn values_resolves_every_dimension() {
        let set = sample_set();
        let values = set.values();
        assert_eq!(values.len(), 2);
        assert_eq!(values["threshold"], 100.0);
        assert_eq!(values["canny1"], 125.0);
    }
}
