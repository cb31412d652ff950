// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Atomic State Table
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Immutable catalog of atomic/ionic states of one impurity species.
//!
//! Energies are in eV measured from the ground state of the neutral
//! atom, so transition thresholds are plain differences of state
//! energies.

use std::collections::HashMap;

use crm_types::error::{CrmError, CrmResult};
use serde::{Deserialize, Serialize};

/// One catalog row as supplied by an atomic-data reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub ionization_stage: usize,
    pub name: String,
    pub statistical_weight: u32,
    /// [eV], relative to the neutral ground state.
    pub energy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub ionization_stage: usize,
    pub name: String,
    pub statistical_weight: u32,
    pub energy: f64,
    /// Dense index into per-state arrays.
    pub location_index: usize,
}

#[derive(Debug, Clone)]
pub struct StateTable {
    states: Vec<State>,
    index: HashMap<(usize, String), usize>,
    stages: Vec<usize>,
}

impl StateTable {
    /// Build the table in catalog order. Records with a stage above
    /// `max_stage` are skipped.
    pub fn load(records: &[StateRecord], max_stage: Option<usize>) -> CrmResult<Self> {
        let mut states = Vec::with_capacity(records.len());
        let mut index = HashMap::with_capacity(records.len());

        for (row, rec) in records.iter().enumerate() {
            if max_stage.is_some_and(|m| rec.ionization_stage > m) {
                continue;
            }
            if rec.name.trim().is_empty() {
                return Err(CrmError::DataError(format!("state record {row} has an empty name")));
            }
            if rec.statistical_weight == 0 {
                return Err(CrmError::DataError(format!(
                    "state {}:{} has zero statistical weight",
                    rec.ionization_stage, rec.name
                )));
            }
            if !rec.energy.is_finite() {
                return Err(CrmError::DataError(format!(
                    "state {}:{} has non-finite energy",
                    rec.ionization_stage, rec.name
                )));
            }
            let key = (rec.ionization_stage, rec.name.clone());
            if index.contains_key(&key) {
                return Err(CrmError::DataError(format!(
                    "duplicate state {}:{}",
                    rec.ionization_stage, rec.name
                )));
            }
            let loc = states.len();
            index.insert(key, loc);
            states.push(State {
                ionization_stage: rec.ionization_stage,
                name: rec.name.clone(),
                statistical_weight: rec.statistical_weight,
                energy: rec.energy,
                location_index: loc,
            });
        }

        if states.is_empty() {
            return Err(CrmError::DataError("state catalog is empty".into()));
        }

        let mut stages: Vec<usize> = states.iter().map(|s| s.ionization_stage).collect();
        stages.sort_unstable();
        stages.dedup();

        log::debug!(
            "Loaded {} states across {} ionization stages",
            states.len(),
            stages.len()
        );
        Ok(StateTable {
            states,
            index,
            stages,
        })
    }

    pub fn lookup(&self, stage: usize, name: &str) -> Option<&State> {
        self.index
            .get(&(stage, name.to_string()))
            .map(|&loc| &self.states[loc])
    }

    /// First state of `stage` in catalog order.
    pub fn ground_state(&self, stage: usize) -> CrmResult<&State> {
        self.states
            .iter()
            .find(|s| s.ionization_stage == stage)
            .ok_or_else(|| CrmError::DataError(format!("no states for ionization stage {stage}")))
    }

    /// Distinct ionization stages, ascending.
    pub fn stages(&self) -> &[usize] {
        &self.stages
    }

    pub fn get(&self, location_index: usize) -> Option<&State> {
        self.states.get(location_index)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }

    pub fn states_in_stage(&self, stage: usize) -> impl Iterator<Item = &State> {
        self.states.iter().filter(move |s| s.ionization_stage == stage)
    }

    /// Charge (ionization stage) of every state, by location index.
    pub fn charges(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.ionization_stage as f64).collect()
    }

    /// Ground-state energy difference between `stage + 1` and `stage` [eV].
    pub fn ionization_energy(&self, stage: usize) -> CrmResult<f64> {
        Ok(self.ground_state(stage + 1)?.energy - self.ground_state(stage)?.energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(stage: usize, name: &str, g: u32, energy: f64) -> StateRecord {
        StateRecord {
            ionization_stage: stage,
            name: name.to_string(),
            statistical_weight: g,
            energy,
        }
    }

    fn hydrogen_like() -> Vec<StateRecord> {
        vec![
            rec(0, "1s", 2, 0.0),
            rec(0, "2s", 2, 10.2),
            rec(0, "2p", 6, 10.2),
            rec(1, "bare", 1, 13.6),
        ]
    }

    #[test]
    fn test_location_indices_contiguous() {
        let table = StateTable::load(&hydrogen_like(), None).unwrap();
        assert_eq!(table.len(), 4);
        for (i, s) in table.iter().enumerate() {
            assert_eq!(s.location_index, i);
        }
        assert_eq!(table.stages(), &[0, 1]);
    }

    #[test]
    fn test_lookup_and_ground_state() {
        let table = StateTable::load(&hydrogen_like(), None).unwrap();
        let s = table.lookup(0, "2p").unwrap();
        assert_eq!(s.statistical_weight, 6);
        assert!(table.lookup(1, "2p").is_none());
        assert_eq!(table.ground_state(0).unwrap().name, "1s");
        assert_eq!(table.ground_state(1).unwrap().name, "bare");
        assert!(table.ground_state(2).is_err());
        assert!((table.ionization_energy(0).unwrap() - 13.6).abs() < 1e-12);
    }

    #[test]
    fn test_max_stage_filter() {
        let table = StateTable::load(&hydrogen_like(), Some(0)).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.stages(), &[0]);
    }

    #[test]
    fn test_malformed_records_rejected() {
        assert!(StateTable::load(&[], None).is_err());
        assert!(StateTable::load(&[rec(0, "", 1, 0.0)], None).is_err());
        assert!(StateTable::load(&[rec(0, "1s", 0, 0.0)], None).is_err());
        assert!(StateTable::load(&[rec(0, "1s", 1, f64::NAN)], None).is_err());
        let dup = vec![rec(0, "1s", 2, 0.0), rec(0, "1s", 2, 0.0)];
        assert!(matches!(
            StateTable::load(&dup, None),
            Err(CrmError::DataError(_))
        ));
    }

    #[test]
    fn test_charges() {
        let table = StateTable::load(&hydrogen_like(), None).unwrap();
        assert_eq!(table.charges(), vec![0.0, 0.0, 0.0, 1.0]);
    }
}
