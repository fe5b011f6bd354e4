//! Per-blade transmission factors for inserted targets.

use crate::blade::{BladeState, StateEncoding};
use std::collections::BTreeMap;

/// Transmission of each `(blade, target)` pair when inserted.
///
/// Blades and targets are one-based. Anything not listed falls back to
/// `BladeState::default_transmission`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransmissionTable {
    entries: BTreeMap<(usize, u8), f64>,
}

impl TransmissionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, blade: usize, target: u8, transmission: f64) {
        self.entries.insert((blade, target), transmission);
    }

    pub fn get(&self, blade: usize, target: u8) -> Option<f64> {
        self.entries.get(&(blade, target)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Factor for a blade in `state`, when one is configured.
    ///
    /// Only inserted blades consult the table; out and unknown blades keep
    /// their defaults.
    pub fn factor(&self, blade: usize, state: BladeState, target: Option<u8>) -> Option<f64> {
        if !state.is_inserted() {
            return None;
        }
        self.get(blade, target.unwrap_or(1))
    }

    /// Per-blade factors for one snapshot of raw position readbacks.
    pub fn factors_for(
        &self,
        encoding: StateEncoding,
        states: &[Option<BladeState>],
        raw: &[Option<i64>],
    ) -> BTreeMap<usize, f64> {
        let mut out = BTreeMap::new();
        for (i, state) in states.iter().enumerate() {
            let Some(state) = state else { continue };
            let target = raw
                .get(i)
                .copied()
                .flatten()
                .and_then(|r| encoding.inserted_target(r));
            if let Some(f) = self.factor(i + 1, *state, target) {
                out.insert(i + 1, f);
            }
        }
        out
    }
}

impl FromIterator<(usize, u8, f64)> for TransmissionTable {
    fn from_iter<I: IntoIterator<Item = (usize, u8, f64)>>(iter: I) -> Self {
        let mut t = Self::new();
        for (blade, target, tr) in iter {
            t.insert(blade, target, tr);
        }
        t
    }
}
