//! Action-value table.
use crate::{Action, StateKey};
use std::collections::HashMap;
use xxhash_rust::xxh3::Xxh3Builder;

type Row = HashMap<Action, f64, Xxh3Builder>;

/// Mapping from `(StateKey, Action)` to an action value.
///
/// Pairs that were never written read as `0`. The hasher is deterministic, so two runs
/// with the same seed build byte-identical tables.
#[derive(Debug, Clone, Default)]
pub struct QTable {
    rows: HashMap<StateKey, Row, Xxh3Builder>,
}

impl QTable {
    /// Constructs an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a table seeded with the given entries, e.g. from a prior run.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ((StateKey, Action), f64)>,
    {
        let mut table = Self::new();
        for ((state, action), value) in entries {
            table.rows.entry(state).or_default().insert(action, value);
        }
        table
    }

    /// Value of a pair.
    pub fn get(&self, state: &StateKey, action: Action) -> f64 {
        self.rows
            .get(state)
            .and_then(|row| row.get(&action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Overwrites the value of a pair.
    pub fn set(&mut self, state: &StateKey, action: Action, value: f64) {
        match self.rows.get_mut(state) {
            Some(row) => {
                row.insert(action, value);
            }
            None => {
                let mut row = Row::default();
                row.insert(action, value);
                self.rows.insert(state.clone(), row);
            }
        }
    }

    /// Greedy action among `actions`, ties broken by order in `actions`.
    pub fn argmax(&self, state: &StateKey, actions: &[Action]) -> Option<Action> {
        let row = self.rows.get(state);
        let mut best: Option<(Action, f64)> = None;
        for &a in actions {
            let q = row.and_then(|r| r.get(&a)).copied().unwrap_or(0.0);
            match best {
                Some((_, v)) if q <= v => {}
                _ => best = Some((a, q)),
            }
        }
        best.map(|(a, _)| a)
    }

    /// Maximum value among `actions`, `0` if there is none.
    pub fn max(&self, state: &StateKey, actions: &[Action]) -> f64 {
        let row = self.rows.get(state);
        actions
            .iter()
            .map(|a| row.and_then(|r| r.get(a)).copied().unwrap_or(0.0))
            .fold(None, |m: Option<f64>, q| Some(m.map_or(q, |m| m.max(q))))
            .unwrap_or(0.0)
    }

    /// Number of stored pairs.
    pub fn len(&self) -> usize {
        self.rows.values().map(|row| row.len()).sum()
    }

    /// `true` if no pair was written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over stored pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, Action, f64)> {
        self.rows
            .iter()
            .flat_map(|(s, row)| row.iter().map(move |(a, v)| (s, *a, *v)))
    }

    /// Stored pairs sorted by key.
    pub fn sorted_entries(&self) -> Vec<((StateKey, Action), f64)> {
        let mut entries = self
            .iter()
            .map(|(s, a, v)| ((s.clone(), a), v))
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_zero_and_set() {
        let mut table = QTable::new();
        let s = StateKey::new(vec![0, 1], 0);
        assert_eq!(table.get(&s, Action::Hold), 0.0);
        table.set(&s, Action::Hold, -2.5);
        assert_eq!(table.get(&s, Action::Hold), -2.5);
        assert_eq!(table.get(&StateKey::new(vec![0, 1], 1), Action::Hold), 0.0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_argmax_ties_first_seen() {
        let mut table = QTable::new();
        let s = StateKey::default();
        let acts = [Action::Choose(0), Action::Choose(1), Action::Choose(2)];
        assert_eq!(table.argmax(&s, &acts), Some(Action::Choose(0)));

        table.set(&s, Action::Choose(0), -1.0);
        assert_eq!(table.argmax(&s, &acts), Some(Action::Choose(1)));
        assert_eq!(table.max(&s, &acts), 0.0);

        table.set(&s, Action::Choose(1), -3.0);
        table.set(&s, Action::Choose(2), -1.0);
        assert_eq!(table.argmax(&s, &acts), Some(Action::Choose(0)));
        assert_eq!(table.max(&s, &acts), -1.0);
        assert_eq!(table.argmax(&s, &[]), None);
        assert_eq!(table.max(&s, &[]), 0.0);
    }

    #[test]
    fn test_from_entries() {
        let s = StateKey::new(vec![2], 0);
        let table = QTable::from_entries(vec![((s.clone(), Action::Choose(1)), 4.0)]);
        assert_eq!(table.get(&s, Action::Choose(1)), 4.0);
        assert_eq!(table.sorted_entries(), vec![((s, Action::Choose(1)), 4.0)]);
    }

    #[test]
    fn test_rows_share_a_state() {
        let mut table = QTable::new();
        let s = StateKey::new(vec![1], 0);
        table.set(&s, Action::Choose(0), -2.0);
        table.set(&s, Action::Choose(1), -1.0);
        table.set(&s, Action::Choose(0), -3.0);
        assert_eq!(table.len(), 2);
        let acts = [Action::Choose(0), Action::Choose(1)];
        assert_eq!(table.argmax(&s, &acts), Some(Action::Choose(1)));
        assert_eq!(table.iter().filter(|(k, _, _)| **k == s).count(), 2);
    }
}
