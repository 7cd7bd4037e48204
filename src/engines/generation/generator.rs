use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::engines::generation::primitive_set::{PrimitiveSet, TypeTag};
use crate::engines::generation::tree::{Node, Tree};
use crate::error::{CandidateKind, EvopipeError, Result};

/// Generate a tree with leaves at possibly different depths.
///
/// The default stop condition places a terminal whenever the required type
/// is a parameter type (nothing but a terminal can satisfy it) or the target
/// height is reached.
pub fn gen_grow_safe(
    pset: &PrimitiveSet,
    min_height: usize,
    max_height: usize,
    rng: &mut StdRng,
) -> Result<Tree> {
    let condition =
        |height: usize, depth: usize, ty: TypeTag| !pset.is_stage_type(ty) || depth == height;
    generate(pset, min_height, max_height, &condition, rng)
}

/// Build a tree top-down to a target height drawn uniformly from
/// `[min_height, max_height)`.
///
/// Construction uses an explicit work stack seeded with the output type at
/// depth 0; argument types are pushed in reverse order so nodes appear in
/// declaration order when drained. A required type with no eligible
/// terminal/primitive raises `NoCandidate` so the caller can retry with
/// fresh randomness — a wrong-typed substitute is never drawn.
pub fn generate<F>(
    pset: &PrimitiveSet,
    min_height: usize,
    max_height: usize,
    condition: &F,
    rng: &mut StdRng,
) -> Result<Tree>
where
    F: Fn(usize, usize, TypeTag) -> bool,
{
    let height = rng.gen_range(min_height..max_height);
    let mut nodes = Vec::new();
    let mut stack: Vec<(usize, TypeTag)> = vec![(0, pset.output_type())];

    while let Some((depth, ty)) = stack.pop() {
        if condition(height, depth, ty) {
            let id = draw(pset.terminals_of(ty), CandidateKind::Terminal, pset, ty, depth, rng)?;
            nodes.push(Node::terminal(id, pset));
        } else {
            let id = draw(pset.primitives_of(ty), CandidateKind::Primitive, pset, ty, depth, rng)?;
            nodes.push(Node::primitive(id, pset));
            for &arg in pset.primitive(id).args.iter().rev() {
                stack.push((depth + 1, arg));
            }
        }
    }

    Ok(Tree::from_nodes(nodes))
}

fn draw(
    candidates: &[usize],
    kind: CandidateKind,
    pset: &PrimitiveSet,
    ty: TypeTag,
    depth: usize,
    rng: &mut StdRng,
) -> Result<usize> {
    candidates
        .choose(rng)
        .copied()
        .ok_or_else(|| EvopipeError::NoCandidate {
            kind,
            type_name: pset.type_name(ty).to_string(),
            depth,
        })
}
