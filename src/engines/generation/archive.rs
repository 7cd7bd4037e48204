use crate::engines::generation::pareto::{dominates, objectives_close, Objectives};
use crate::engines::generation::tree::Individual;

/// The non-dominated set across every individual ever submitted.
///
/// Unlike the bounded hall-of-fame pattern, the archive has no size limit:
/// membership is decided purely by dominance. Two members are considered the
/// same when their fitness tuples are near-equal, regardless of tree
/// identity, so equivalent pipelines do not pile up.
#[derive(Default)]
pub struct ParetoArchive {
    members: Vec<Individual>,
}

impl ParetoArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a batch of evaluated candidates into the archive. Candidates
    /// without fitness are skipped; a candidate enters iff no current member
    /// dominates it and none is its fitness twin, and every member it
    /// dominates is dropped.
    pub fn update(&mut self, candidates: &[Individual]) {
        for candidate in candidates {
            let fitness = match candidate.fitness {
                Some(f) => f,
                None => continue,
            };

            let mut is_dominated = false;
            let mut dominates_one = false;
            let mut has_twin = false;
            let mut to_remove: Vec<usize> = Vec::new();

            for (i, member) in self.members.iter().enumerate() {
                let member_fitness = match member.fitness {
                    Some(f) => f,
                    None => continue,
                };
                if !dominates_one && dominates(&member_fitness, &fitness) {
                    is_dominated = true;
                    break;
                } else if dominates(&fitness, &member_fitness) {
                    dominates_one = true;
                    to_remove.push(i);
                } else if objectives_close(&fitness, &member_fitness) {
                    has_twin = true;
                    break;
                }
            }

            for &i in to_remove.iter().rev() {
                self.members.remove(i);
            }
            if !is_dominated && !has_twin {
                self.members.push(candidate.clone());
            }
        }
    }

    pub fn members(&self) -> &[Individual] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn fitness_values(&self) -> Vec<Objectives> {
        self.members.iter().filter_map(|m| m.fitness).collect()
    }

    /// The set of distinct (dataset 1, dataset 2) objective pairs present,
    /// in canonical order. The generational loop compares consecutive
    /// snapshots of this set to detect stagnation.
    pub fn objective_pairs(&self) -> Vec<(f64, f64)> {
        let mut pairs: Vec<(f64, f64)> = self
            .members
            .iter()
            .filter_map(|m| m.fitness.map(|f| (f[0], f[1])))
            .collect();
        pairs.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        });
        pairs.dedup();
        pairs
    }

    /// Reset state for a cold start.
    pub fn reset(&mut self) {
        self.members.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::tree::{Individual, Tree};

    fn candidate(fitness: Objectives) -> Individual {
        let mut ind = Individual::new(Tree::default());
        ind.fitness = Some(fitness);
        ind
    }

    #[test]
    fn archive_holds_only_non_dominated_members() {
        let mut archive = ParetoArchive::new();
        archive.update(&[
            candidate([0.5, 0.5, 0.1]),
            candidate([0.6, 0.4, 0.1]),
            candidate([0.4, 0.4, 0.1]), // dominated by the first
        ]);
        assert_eq!(archive.len(), 2);

        // A new dominator sweeps out everything it beats.
        archive.update(&[candidate([0.7, 0.6, 0.2])]);
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.fitness_values()[0], [0.7, 0.6, 0.2]);

        // No pair of survivors may dominate each other.
        archive.update(&[candidate([0.9, 0.1, 0.2]), candidate([0.1, 0.9, 0.2])]);
        let values = archive.fitness_values();
        for a in &values {
            for b in &values {
                assert!(!dominates(a, b) || a == b);
            }
        }
    }

    #[test]
    fn near_equal_fitness_is_not_duplicated() {
        let mut archive = ParetoArchive::new();
        archive.update(&[candidate([0.5, 0.5, 0.1])]);
        archive.update(&[candidate([0.5 + 1e-9, 0.5, 0.1])]);
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn unevaluated_candidates_are_ignored() {
        let mut archive = ParetoArchive::new();
        archive.update(&[Individual::new(Tree::default())]);
        assert!(archive.is_empty());
    }

    #[test]
    fn objective_pairs_are_sorted_and_distinct() {
        let mut archive = ParetoArchive::new();
        archive.update(&[candidate([0.9, 0.1, 0.2]), candidate([0.1, 0.9, 0.2])]);
        let pairs = archive.objective_pairs();
        assert_eq!(pairs, vec![(0.1, 0.9), (0.9, 0.1)]);
    }
}
