//! Multi-objective ranking utilities: NSGA-II fast non-dominated sorting,
//! crowding distance, and truncation selection.
//!
//! All three objectives (score on dataset 1, score on dataset 2, feature
//! score) are maximized.

use std::cmp::Ordering;

/// Fitness tuple of one individual.
pub type Objectives = [f64; 3];

/// Absolute and relative tolerances for fitness equality, matching the
/// usual `allclose` semantics: `|a - b| <= ATOL + RTOL * |b|` per dimension
/// (exact equality short-circuits so infinite pairs compare equal).
pub const ATOL: f64 = 1e-8;
pub const RTOL: f64 = 1e-5;

/// True when `a` dominates `b`: at least as good everywhere, strictly
/// better somewhere.
pub fn dominates(a: &Objectives, b: &Objectives) -> bool {
    let mut strictly_better = false;
    for i in 0..a.len() {
        if a[i] < b[i] {
            return false;
        }
        if a[i] > b[i] {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Near-equality of fitness tuples, used to keep twins out of the archive.
pub fn objectives_close(a: &Objectives, b: &Objectives) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(&x, &y)| x == y || (x - y).abs() <= ATOL + RTOL * y.abs())
}

/// Individual index annotated with rank and crowding distance.
#[derive(Debug, Clone)]
pub struct RankedIndividual {
    pub index: usize,
    pub objectives: Objectives,
    pub rank: usize,
    pub crowding_distance: f64,
}

/// Fast non-dominated sorting. Returns successive Pareto fronts as index
/// lists into `ranked` (front 0 = non-dominated) and stamps each entry's
/// rank.
pub fn fast_non_dominated_sort(ranked: &mut [RankedIndividual]) -> Vec<Vec<usize>> {
    let n = ranked.len();
    let mut domination_count = vec![0usize; n];
    let mut dominated_solutions: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut fronts: Vec<Vec<usize>> = Vec::new();

    let mut first_front = Vec::new();
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            if dominates(&ranked[i].objectives, &ranked[j].objectives) {
                dominated_solutions[i].push(j);
            } else if dominates(&ranked[j].objectives, &ranked[i].objectives) {
                domination_count[i] += 1;
            }
        }
        if domination_count[i] == 0 {
            ranked[i].rank = 0;
            first_front.push(i);
        }
    }
    fronts.push(first_front);

    let mut front_index = 0;
    while front_index < fronts.len() && !fronts[front_index].is_empty() {
        let mut next_front = Vec::new();
        for &i in &fronts[front_index] {
            for &j in &dominated_solutions[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    ranked[j].rank = front_index + 1;
                    next_front.push(j);
                }
            }
        }
        if !next_front.is_empty() {
            fronts.push(next_front);
        }
        front_index += 1;
    }

    fronts
}

/// Crowding distance within one front: the sum over objectives of the
/// normalized gap to the nearest neighbors, with boundary individuals given
/// infinite distance.
pub fn assign_crowding_distance(ranked: &mut [RankedIndividual], front: &[usize]) {
    let front_size = front.len();
    if front_size <= 2 {
        for &idx in front {
            ranked[idx].crowding_distance = f64::INFINITY;
        }
        return;
    }

    for &idx in front {
        ranked[idx].crowding_distance = 0.0;
    }

    let num_objectives = ranked[front[0]].objectives.len();
    for obj in 0..num_objectives {
        let mut sorted: Vec<usize> = front.to_vec();
        sorted.sort_by(|&a, &b| {
            ranked[a].objectives[obj]
                .partial_cmp(&ranked[b].objectives[obj])
                .unwrap_or(Ordering::Equal)
        });

        ranked[sorted[0]].crowding_distance = f64::INFINITY;
        ranked[sorted[front_size - 1]].crowding_distance = f64::INFINITY;

        let min_val = ranked[sorted[0]].objectives[obj];
        let max_val = ranked[sorted[front_size - 1]].objectives[obj];
        let range = max_val - min_val;
        // A degenerate or unbounded range carries no ordering information.
        if !range.is_finite() || range.abs() < 1e-12 {
            continue;
        }

        for w in 1..(front_size - 1) {
            let prev = ranked[sorted[w - 1]].objectives[obj];
            let next = ranked[sorted[w + 1]].objectives[obj];
            let idx = sorted[w];
            if ranked[idx].crowding_distance.is_finite() {
                ranked[idx].crowding_distance += (next - prev) / range;
            }
        }
    }
}

/// NSGA-II truncation selection: fill front by front, truncating the
/// boundary front by descending crowding distance to return exactly `k`
/// indices into `objectives`.
pub fn sel_nsga2(objectives: &[Objectives], k: usize) -> Vec<usize> {
    let mut ranked: Vec<RankedIndividual> = objectives
        .iter()
        .enumerate()
        .map(|(index, &objectives)| RankedIndividual {
            index,
            objectives,
            rank: 0,
            crowding_distance: 0.0,
        })
        .collect();

    let fronts = fast_non_dominated_sort(&mut ranked);
    for front in &fronts {
        assign_crowding_distance(&mut ranked, front);
    }

    let mut selected = Vec::with_capacity(k);
    for front in &fronts {
        if selected.len() + front.len() <= k {
            selected.extend(front.iter().map(|&i| ranked[i].index));
        } else {
            let mut boundary: Vec<usize> = front.clone();
            boundary.sort_by(|&a, &b| {
                ranked[b]
                    .crowding_distance
                    .partial_cmp(&ranked[a].crowding_distance)
                    .unwrap_or(Ordering::Equal)
            });
            selected.extend(
                boundary
                    .iter()
                    .take(k - selected.len())
                    .map(|&i| ranked[i].index),
            );
        }
        if selected.len() == k {
            break;
        }
    }
    selected
}
