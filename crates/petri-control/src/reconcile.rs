//! Organism list deduplication.
//!
//! The engine occasionally reports the same organism twice within one
//! generation. The renderer needs each identity exactly once, so the first
//! occurrence wins and later duplicates are dropped and counted.

use std::collections::HashSet;

use petri_types::Organism;
use tracing::warn;

/// Display-ready organisms plus the number of duplicates that were dropped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reconciled {
    /// Deduplicated organisms in first-occurrence order.
    pub organisms: Vec<Organism>,
    /// Number of later duplicates that were dropped.
    pub duplicates: usize,
}

/// Deduplicate `organisms` by identity, preserving first-occurrence order.
///
/// Idempotent: reconciling an already-deduplicated list returns it
/// unchanged with zero duplicates.
pub fn reconcile(organisms: &[Organism]) -> Reconciled {
    let mut seen = HashSet::with_capacity(organisms.len());
    let mut kept = Vec::with_capacity(organisms.len());
    let mut duplicates: usize = 0;

    for organism in organisms {
        if seen.insert(&organism.id) {
            kept.push(organism.clone());
        } else {
            duplicates = duplicates.saturating_add(1);
        }
    }

    if duplicates > 0 {
        warn!(duplicates, kept = kept.len(), "Dropped duplicate organisms");
    }

    Reconciled {
        organisms: kept,
        duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(organisms: &[Organism]) -> Vec<&str> {
        organisms.iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn first_occurrence_wins() {
        let input = vec![
            Organism::new("a", true),
            Organism::new("b", false),
            Organism::new("a", false),
            Organism::new("c", false),
            Organism::new("b", true),
        ];
        let out = reconcile(&input);
        assert_eq!(ids(&out.organisms), vec!["a", "b", "c"]);
        assert_eq!(out.duplicates, 2);
        // The kept copy of "a" is the first one, resistant.
        assert!(out.organisms.first().is_some_and(|o| o.resistant));
    }

    #[test]
    fn reconciling_twice_equals_once() {
        let input = vec![
            Organism::new("x", false),
            Organism::new("x", false),
            Organism::new("y", true),
        ];
        let once = reconcile(&input);
        let twice = reconcile(&once.organisms);
        assert_eq!(once.organisms, twice.organisms);
        assert_eq!(twice.duplicates, 0);
    }

    #[test]
    fn each_identity_appears_exactly_once() {
        let input: Vec<Organism> = (0..50)
            .map(|i| Organism::new(format!("o{}", i % 7), i % 2 == 0))
            .collect();
        let out = reconcile(&input);
        let unique: HashSet<_> = out.organisms.iter().map(|o| o.id.clone()).collect();
        assert_eq!(unique.len(), out.organisms.len());
        assert_eq!(out.organisms.len(), 7);
        assert_eq!(out.duplicates, 43);
        assert_eq!(ids(&out.organisms), vec!["o0", "o1", "o2", "o3", "o4", "o5", "o6"]);
    }

    #[test]
    fn empty_input() {
        assert_eq!(reconcile(&[]), Reconciled::default());
    }
}
