use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::domain::{EnrollmentId, ItemId, ValidationError};
use super::pointer::PointerId;

const FULL_WEIGHT: f64 = 100.0;
const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Percentage weights for the selected activities of one weighted-activity pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "weights", rename_all = "snake_case")]
pub enum WeightSet {
    Unassigned,
    Assigned(BTreeMap<ItemId, f64>),
}

/// Currently selected activities for an enrollment and pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySelection {
    pub enrollment_id: EnrollmentId,
    pub pointer: PointerId,
    pub activities: BTreeSet<ItemId>,
    pub weights: WeightSet,
}

impl ActivitySelection {
    pub fn new(enrollment_id: EnrollmentId, pointer: PointerId) -> Self {
        Self {
            enrollment_id,
            pointer,
            activities: BTreeSet::new(),
            weights: WeightSet::Unassigned,
        }
    }

    /// Adds an activity. The first selection takes the full weight; any further selection
    /// sends the set back to `Unassigned` until weights are assigned for every activity.
    pub fn select(&mut self, item: ItemId) -> bool {
        if !self.activities.insert(item) {
            return false;
        }

        self.weights = if self.activities.len() == 1 {
            WeightSet::Assigned(self.sole_activity_weights())
        } else {
            WeightSet::Unassigned
        };
        true
    }

    /// Removes an activity and rescales the surviving weights back to 100.
    pub fn deselect(&mut self, item: &ItemId) -> bool {
        if !self.activities.remove(item) {
            return false;
        }

        self.weights = match (&self.weights, self.activities.len()) {
            (_, 0) => WeightSet::Unassigned,
            (_, 1) => WeightSet::Assigned(self.sole_activity_weights()),
            (WeightSet::Unassigned, _) => WeightSet::Unassigned,
            (WeightSet::Assigned(weights), _) => {
                let survivors: BTreeMap<ItemId, f64> = weights
                    .iter()
                    .filter(|(id, _)| self.activities.contains(*id))
                    .map(|(id, weight)| (id.clone(), *weight))
                    .collect();
                let total: f64 = survivors.values().sum();
                if survivors.len() != self.activities.len() || total <= WEIGHT_TOLERANCE {
                    WeightSet::Unassigned
                } else {
                    WeightSet::Assigned(
                        survivors
                            .into_iter()
                            .map(|(id, weight)| (id, weight * FULL_WEIGHT / total))
                            .collect(),
                    )
                }
            }
        };
        true
    }

    /// Replaces the weight set after checking it covers exactly the selection and totals 100.
    pub fn assign(&mut self, weights: BTreeMap<ItemId, f64>) -> Result<(), ValidationError> {
        validate_weights(&self.activities, &weights)?;
        self.weights = WeightSet::Assigned(weights);
        Ok(())
    }

    /// Weights usable for a weighted combination, or `None` when the set is unassigned or no
    /// longer matches the selection.
    pub fn complete_weights(&self) -> Option<&BTreeMap<ItemId, f64>> {
        match &self.weights {
            WeightSet::Assigned(weights) if validate_weights(&self.activities, weights).is_ok() => {
                Some(weights)
            }
            _ => None,
        }
    }

    fn sole_activity_weights(&self) -> BTreeMap<ItemId, f64> {
        self.activities
            .iter()
            .map(|id| (id.clone(), FULL_WEIGHT))
            .collect()
    }
}

pub(crate) fn validate_weights(
    activities: &BTreeSet<ItemId>,
    weights: &BTreeMap<ItemId, f64>,
) -> Result<(), ValidationError> {
    if activities.is_empty()
        || weights.len() != activities.len()
        || !weights.keys().all(|id| activities.contains(id))
    {
        return Err(ValidationError::WeightCoverage);
    }

    for (id, weight) in weights {
        if !weight.is_finite() || !(0.0..=FULL_WEIGHT).contains(weight) {
            return Err(ValidationError::WeightOutOfRange {
                item: id.0.clone(),
                weight: *weight,
            });
        }
    }

    let total: f64 = weights.values().sum();
    if (total - FULL_WEIGHT).abs() > WEIGHT_TOLERANCE {
        return Err(ValidationError::WeightTotal { total });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> ItemId {
        ItemId(value.to_string())
    }

    fn selection() -> ActivitySelection {
        ActivitySelection::new(
            EnrollmentId("enr-weights".to_string()),
            PointerId::SpikeInOneArea,
        )
    }

    #[test]
    fn first_selection_takes_full_weight() {
        let mut selection = selection();
        assert!(selection.select(id("olympiad")));
        assert_eq!(
            selection.weights,
            WeightSet::Assigned(BTreeMap::from([(id("olympiad"), 100.0)]))
        );
        assert!(selection.complete_weights().is_some());
    }

    #[test]
    fn second_selection_requires_explicit_weights() {
        let mut selection = selection();
        selection.select(id("olympiad"));
        selection.select(id("research"));
        assert_eq!(selection.weights, WeightSet::Unassigned);
        assert!(selection.complete_weights().is_none());

        selection
            .assign(BTreeMap::from([
                (id("olympiad"), 70.0),
                (id("research"), 30.0),
            ]))
            .expect("weights total 100");
        assert!(selection.complete_weights().is_some());
    }

    #[test]
    fn reselecting_is_a_no_op() {
        let mut selection = selection();
        selection.select(id("olympiad"));
        assert!(!selection.select(id("olympiad")));
        assert!(selection.complete_weights().is_some());
    }

    #[test]
    fn assign_rejects_totals_other_than_one_hundred() {
        let mut selection = selection();
        selection.select(id("olympiad"));
        selection.select(id("research"));

        let err = selection
            .assign(BTreeMap::from([
                (id("olympiad"), 60.0),
                (id("research"), 30.0),
            ]))
            .expect_err("90 is rejected");
        assert!(matches!(err, ValidationError::WeightTotal { .. }));
        assert_eq!(selection.weights, WeightSet::Unassigned);
    }

    #[test]
    fn assign_rejects_partial_or_foreign_coverage() {
        let mut selection = selection();
        selection.select(id("olympiad"));
        selection.select(id("research"));

        let missing = selection.assign(BTreeMap::from([(id("olympiad"), 100.0)]));
        assert_eq!(missing, Err(ValidationError::WeightCoverage));

        let foreign = selection.assign(BTreeMap::from([
            (id("olympiad"), 50.0),
            (id("startup"), 50.0),
        ]));
        assert_eq!(foreign, Err(ValidationError::WeightCoverage));
    }

    #[test]
    fn assign_rejects_negative_weights() {
        let mut selection = selection();
        selection.select(id("olympiad"));
        selection.select(id("research"));

        let err = selection
            .assign(BTreeMap::from([
                (id("olympiad"), 120.0),
                (id("research"), -20.0),
            ]))
            .expect_err("out of range");
        assert!(matches!(err, ValidationError::WeightOutOfRange { .. }));
    }

    #[test]
    fn deselect_rescales_survivors_to_one_hundred() {
        let mut selection = selection();
        for activity in ["olympiad", "research", "startup"] {
            selection.select(id(activity));
        }
        selection
            .assign(BTreeMap::from([
                (id("olympiad"), 50.0),
                (id("research"), 30.0),
                (id("startup"), 20.0),
            ]))
            .expect("valid weights");

        assert!(selection.deselect(&id("olympiad")));
        let weights = selection.complete_weights().expect("still complete");
        assert!((weights[&id("research")] - 60.0).abs() < 1e-9);
        assert!((weights[&id("startup")] - 40.0).abs() < 1e-9);
    }

    #[test]
    fn deselect_down_to_one_activity_restores_full_weight() {
        let mut selection = selection();
        selection.select(id("olympiad"));
        selection.select(id("research"));

        assert!(selection.deselect(&id("research")));
        assert_eq!(
            selection.weights,
            WeightSet::Assigned(BTreeMap::from([(id("olympiad"), 100.0)]))
        );

        assert!(selection.deselect(&id("olympiad")));
        assert_eq!(selection.weights, WeightSet::Unassigned);
        assert!(!selection.deselect(&id("olympiad")));
    }

    #[test]
    fn deselect_with_zero_weight_survivors_falls_back_to_unassigned() {
        let mut selection = selection();
        for activity in ["olympiad", "research", "startup"] {
            selection.select(id(activity));
        }
        selection
            .assign(BTreeMap::from([
                (id("olympiad"), 100.0),
                (id("research"), 0.0),
                (id("startup"), 0.0),
            ]))
            .expect("valid weights");

        selection.deselect(&id("olympiad"));
        assert_eq!(selection.weights, WeightSet::Unassigned);
    }
}
