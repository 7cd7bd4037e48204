use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::engines::evaluation::cache::EvaluatedCache;
use crate::engines::generation::primitive_set::{PrimitiveSet, TypeTag};
use crate::engines::generation::tree::{Generation, Individual, Lineage, Node, NodeKind, Tree};
use crate::error::{CandidateKind, EvopipeError, Result};

/// Try crossover and mutation at most this many times for any given
/// individual (or pair) before accepting a possible duplicate.
pub const MAX_MUT_LOOPS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationKind {
    Insert,
    Replace,
    Shrink,
}

/// One-point subtree crossover.
///
/// Collects the return types present at non-root positions of both trees;
/// when none are shared the trees are returned unchanged (identity, not an
/// error). Otherwise one common type is drawn, one node of that type in each
/// tree, and the two subtree spans are exchanged. Type consistency holds by
/// construction since the swapped subtrees share a return type.
pub fn cx_one_point(tree1: &mut Tree, tree2: &mut Tree, rng: &mut StdRng) {
    let mut types1: HashMap<TypeTag, Vec<usize>> = HashMap::new();
    for (idx, node) in tree1.nodes().iter().enumerate().skip(1) {
        types1.entry(node.ret).or_default().push(idx);
    }

    let mut types2: HashMap<TypeTag, Vec<usize>> = HashMap::new();
    let mut common_types: Vec<TypeTag> = Vec::new();
    for (idx, node) in tree2.nodes().iter().enumerate().skip(1) {
        if types1.contains_key(&node.ret) && !types2.contains_key(&node.ret) {
            common_types.push(node.ret);
        }
        types2.entry(node.ret).or_default().push(idx);
    }

    let ty = match common_types.choose(rng) {
        Some(&ty) => ty,
        None => return,
    };
    let index1 = types1[&ty][rng.gen_range(0..types1[&ty].len())];
    let index2 = types2[&ty][rng.gen_range(0..types2[&ty].len())];

    let span1 = tree1.span(index1);
    let span2 = tree2.span(index2);
    let subtree1 = tree1.subtree(index1);
    let subtree2 = tree2.subtree(index2);
    tree1.splice(span1, &subtree2);
    tree2.splice(span2, &subtree1);
}

/// Insert a newly drawn primitive above a random node.
///
/// The new primitive must return the node's type and accept it as an
/// argument; the original subtree is wired into one matching slot (drawn
/// uniformly) and the remaining slots are filled with fresh terminals of the
/// declared types. When no primitive qualifies the tree is left unchanged.
pub fn mut_insert(tree: &mut Tree, pset: &PrimitiveSet, rng: &mut StdRng) -> Result<()> {
    if tree.is_empty() {
        return Ok(());
    }
    let index = rng.gen_range(0..tree.len());
    let node = *tree.node(index);
    let span = tree.span(index);

    let candidates: Vec<usize> = pset
        .primitives_of(node.ret)
        .iter()
        .copied()
        .filter(|&id| pset.primitive(id).args.contains(&node.ret))
        .collect();
    let new_id = match candidates.choose(rng) {
        Some(&id) => id,
        None => return Ok(()),
    };

    let args = pset.primitive(new_id).args.clone();
    let slots: Vec<usize> = args
        .iter()
        .enumerate()
        .filter(|(_, &ty)| ty == node.ret)
        .map(|(i, _)| i)
        .collect();
    let position = slots[rng.gen_range(0..slots.len())];

    let original = tree.subtree(index);
    let depth = tree.depth_of(index);
    let mut replacement = vec![Node::primitive(new_id, pset)];
    for (i, &arg) in args.iter().enumerate() {
        if i == position {
            replacement.extend_from_slice(&original);
        } else {
            let term = draw_terminal(pset, arg, depth + 1, rng)?;
            replacement.push(term);
        }
    }
    tree.splice(span, &replacement);
    Ok(())
}

/// Point mutation: replace a random node in place.
///
/// A terminal becomes a different terminal of the same return type. A
/// primitive is replaced by a freshly drawn primitive of the same return
/// type; the next primitive in prefix order whose return type matches one of
/// the replacement's argument types is spliced into that slot and the other
/// slots are filled with fresh terminals.
pub fn mut_node_replacement(tree: &mut Tree, pset: &PrimitiveSet, rng: &mut StdRng) -> Result<()> {
    if tree.is_empty() {
        return Ok(());
    }
    let index = rng.gen_range(0..tree.len());
    let node = *tree.node(index);

    match node.kind {
        NodeKind::Terminal(current) => {
            let others: Vec<usize> = pset
                .terminals_of(node.ret)
                .iter()
                .copied()
                .filter(|&id| id != current)
                .collect();
            if let Some(&new_id) = others.choose(rng) {
                let span = tree.span(index);
                tree.splice(span, &[Node::terminal(new_id, pset)]);
            }
        }
        NodeKind::Primitive(_) => {
            let primitives = pset.primitives_of(node.ret);
            if primitives.is_empty() {
                return Ok(());
            }
            let new_id = primitives[rng.gen_range(0..primitives.len())];
            let args = pset.primitive(new_id).args.clone();

            // Next consumer: the first later primitive whose output feeds
            // one of the replacement's argument slots.
            let consumer = (index + 1..tree.len()).find(|&i| {
                let n = tree.node(i);
                n.is_primitive() && args.contains(&n.ret)
            });

            let depth = tree.depth_of(index);
            let span = tree.span(index);
            let mut replacement = vec![Node::primitive(new_id, pset)];
            match consumer {
                Some(ci) => {
                    let consumer_type = tree.node(ci).ret;
                    let slots: Vec<usize> = args
                        .iter()
                        .enumerate()
                        .filter(|(_, &ty)| ty == consumer_type)
                        .map(|(i, _)| i)
                        .collect();
                    let position = slots[rng.gen_range(0..slots.len())];
                    let consumer_subtree = tree.subtree(ci);
                    for (i, &arg) in args.iter().enumerate() {
                        if i == position {
                            replacement.extend_from_slice(&consumer_subtree);
                        } else {
                            replacement.push(draw_terminal(pset, arg, depth + 1, rng)?);
                        }
                    }
                }
                None => {
                    for &arg in &args {
                        replacement.push(draw_terminal(pset, arg, depth + 1, rng)?);
                    }
                }
            }
            tree.splice(span, &replacement);
        }
    }
    Ok(())
}

/// Shrink mutation: replace an eligible subtree with one of its own
/// same-typed child subtrees, reducing tree size. Eligible primitives are
/// non-root nodes whose return type appears among their own argument types.
pub fn mut_shrink(tree: &mut Tree, pset: &PrimitiveSet, rng: &mut StdRng) {
    if tree.len() < 3 || tree.height() <= 1 {
        return;
    }

    let mut eligible: Vec<(usize, Vec<usize>)> = Vec::new();
    for i in 1..tree.len() {
        if let NodeKind::Primitive(id) = tree.node(i).kind {
            let prim = pset.primitive(id);
            let slots: Vec<usize> = prim
                .args
                .iter()
                .enumerate()
                .filter(|(_, &ty)| ty == prim.ret)
                .map(|(slot, _)| slot)
                .collect();
            if !slots.is_empty() {
                eligible.push((i, slots));
            }
        }
    }

    if let Some((index, slots)) = eligible.choose(rng) {
        let arg_idx = slots[rng.gen_range(0..slots.len())];
        // Walk past the preceding siblings to the chosen child subtree.
        let mut child = index + 1;
        for _ in 0..arg_idx {
            child = tree.span(child).end;
        }
        let subtree = tree.subtree(child);
        let span = tree.span(*index);
        tree.splice(span, &subtree);
    }
}

/// Apply one uniformly chosen mutation technique, retrying against a clone
/// until the offspring's canonical string is absent from the evaluation
/// cache (novelty), up to [`MAX_MUT_LOOPS`] attempts.
///
/// When the pipeline shape is fixed (`tree_structure == false`) only node
/// replacement is offered; shrink additionally requires more than one
/// primitive. If all shrink attempts fail to find a novel individual, the
/// operator retries once with shrink excluded. Exhaustion returns the last
/// attempt — a possible duplicate — rather than failing.
pub fn random_mutation(
    individual: &Individual,
    pset: &PrimitiveSet,
    cache: &EvaluatedCache,
    tree_structure: bool,
    allow_shrink: bool,
    rng: &mut StdRng,
) -> Result<Individual> {
    let mut techniques = if tree_structure {
        vec![MutationKind::Insert, MutationKind::Replace]
    } else {
        vec![MutationKind::Replace]
    };
    if tree_structure && allow_shrink && individual.tree.primitive_count() > 1 {
        techniques.push(MutationKind::Shrink);
    }
    let technique = techniques[rng.gen_range(0..techniques.len())];

    let mut offspring = individual.clone();
    let mut unsuccessful_mutations = 0;
    for _ in 0..MAX_MUT_LOOPS {
        // Mutators work in place, so each attempt starts from a fresh clone.
        let mut candidate = individual.clone();
        match technique {
            MutationKind::Insert => mut_insert(&mut candidate.tree, pset, rng)?,
            MutationKind::Replace => mut_node_replacement(&mut candidate.tree, pset, rng)?,
            MutationKind::Shrink => mut_shrink(&mut candidate.tree, pset, rng),
        }
        offspring = candidate;
        if !cache.contains(&offspring.tree.canonical_string(pset)) {
            offspring.stats = Lineage {
                generation: Generation::Pending,
                mutation_count: individual.stats.mutation_count + 1,
                crossover_count: individual.stats.crossover_count,
                predecessor: vec![individual.tree.canonical_string(pset)],
            };
            return Ok(offspring);
        }
        unsuccessful_mutations += 1;
    }

    // Every shrunk form may have been explored already; fall back to the
    // other techniques once.
    if unsuccessful_mutations == MAX_MUT_LOOPS && technique == MutationKind::Shrink {
        return random_mutation(individual, pset, cache, tree_structure, false, rng);
    }

    Ok(offspring)
}

/// Crossover with the same novelty loop as mutation. Only the first
/// offspring is used by the generational loop; the second is returned for
/// completeness and its uniqueness is not checked.
pub fn mate(
    ind1: &Individual,
    ind2: &Individual,
    pset: &PrimitiveSet,
    cache: &EvaluatedCache,
    rng: &mut StdRng,
) -> (Individual, Individual) {
    let mut offspring = ind1.clone();
    let mut offspring2 = ind2.clone();
    for _ in 0..MAX_MUT_LOOPS {
        let mut clone1 = ind1.clone();
        let mut clone2 = ind2.clone();
        cx_one_point(&mut clone1.tree, &mut clone2.tree, rng);
        offspring = clone1;
        offspring2 = clone2;
        if !cache.contains(&offspring.tree.canonical_string(pset)) {
            offspring.stats = Lineage {
                generation: Generation::Pending,
                mutation_count: ind1.stats.mutation_count + ind2.stats.mutation_count,
                crossover_count: ind1.stats.crossover_count + ind2.stats.crossover_count + 1,
                predecessor: vec![
                    ind1.tree.canonical_string(pset),
                    ind2.tree.canonical_string(pset),
                ],
            };
            break;
        }
    }
    (offspring, offspring2)
}

/// Pick two distinct individuals eligible for crossover: they must share at
/// least one primitive name and differ in canonical string. Pairs are
/// eligible in both orders. Returns `None` when no such pair exists.
pub fn pick_eligible_pair(
    population: &[Individual],
    pset: &PrimitiveSet,
    rng: &mut StdRng,
) -> Option<(usize, usize)> {
    let primitive_sets: Vec<_> = population
        .iter()
        .map(|ind| ind.tree.primitive_names(pset))
        .collect();
    let strings: Vec<String> = population
        .iter()
        .map(|ind| ind.tree.canonical_string(pset))
        .collect();

    let mut pairs = Vec::new();
    for i in 0..population.len() {
        for j in (i + 1)..population.len() {
            if !primitive_sets[i].is_disjoint(&primitive_sets[j]) && strings[i] != strings[j] {
                pairs.push((i, j));
                pairs.push((j, i));
            }
        }
    }
    pairs.choose(rng).copied()
}

fn draw_terminal(pset: &PrimitiveSet, ty: TypeTag, depth: usize, rng: &mut StdRng) -> Result<Node> {
    pset.terminals_of(ty)
        .choose(rng)
        .map(|&id| Node::terminal(id, pset))
        .ok_or_else(|| EvopipeError::NoCandidate {
            kind: CandidateKind::Terminal,
            type_name: pset.type_name(ty).to_string(),
            depth,
        })
}
