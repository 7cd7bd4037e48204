use crate::engines::generation::primitive_set::PrimitiveSet;
use crate::engines::generation::tree::{NodeKind, Tree};
use crate::error::{EvopipeError, Result};

/// Structural validator for expression trees: arity, positional argument
/// types, root typing, and placement of root-only primitives.
///
/// The genetic operators preserve these invariants by construction; the
/// validator exists for tests and for sanity-checking trees that arrive
/// from outside the engine (warm starts, deserialized checkpoints).
pub struct StructureValidator<'a> {
    pset: &'a PrimitiveSet,
}

impl<'a> StructureValidator<'a> {
    pub fn new(pset: &'a PrimitiveSet) -> Self {
        Self { pset }
    }

    pub fn validate(&self, tree: &Tree) -> Result<()> {
        if tree.is_empty() {
            return Err(EvopipeError::Validation("empty tree".to_string()));
        }

        let root = tree.node(0);
        if root.ret != self.pset.output_type() {
            return Err(EvopipeError::Validation(format!(
                "root returns {}, expected {}",
                self.pset.type_name(root.ret),
                self.pset.type_name(self.pset.output_type())
            )));
        }

        let mut total_arity = 0usize;
        for (i, node) in tree.nodes().iter().enumerate() {
            if let NodeKind::Primitive(id) = node.kind {
                let prim = self.pset.primitive(id);
                if prim.root && i != 0 {
                    return Err(EvopipeError::Validation(format!(
                        "root-only primitive {} at interior position {}",
                        prim.name, i
                    )));
                }
                if node.arity != prim.arity() {
                    return Err(EvopipeError::Validation(format!(
                        "{} carries arity {}, declared {}",
                        prim.name,
                        node.arity,
                        prim.arity()
                    )));
                }
                let mut child = i + 1;
                for (slot, &want) in prim.args.iter().enumerate() {
                    if child >= tree.len() {
                        return Err(EvopipeError::Validation(format!(
                            "{} is missing argument {}",
                            prim.name, slot
                        )));
                    }
                    let got = tree.node(child).ret;
                    if got != want {
                        return Err(EvopipeError::Validation(format!(
                            "argument {} of {}: expected {}, got {}",
                            slot,
                            prim.name,
                            self.pset.type_name(want),
                            self.pset.type_name(got)
                        )));
                    }
                    child = tree.span(child).end;
                }
            }
            total_arity += node.arity;
        }

        // A well-formed prefix arena has exactly arity-sum + 1 nodes.
        if total_arity + 1 != tree.len() {
            return Err(EvopipeError::Validation(format!(
                "arity sum {} inconsistent with {} nodes",
                total_arity,
                tree.len()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::tree::Node;
    use crate::types::Value;

    #[test]
    fn rejects_mistyped_argument() {
        let mut pset = PrimitiveSet::new("matrix", "output");
        let matrix = pset.input_type();
        let output = pset.output_type();
        let pct = pset.type_tag("percentile");
        let sel = pset.add_primitive("SelectPercentile", vec![matrix, pct], matrix, false);
        let reg = pset.add_primitive("RidgeModel", vec![matrix], output, true);
        let input = pset
            .add_terminal(matrix, Value::Str("input_matrix".into()), "input_matrix")
            .unwrap();
        let p10 = pset.add_terminal(pct, Value::Int(10), "percentile=10").unwrap();

        let good = Tree::from_nodes(vec![
            Node::primitive(reg, &pset),
            Node::primitive(sel, &pset),
            Node::terminal(input, &pset),
            Node::terminal(p10, &pset),
        ]);
        assert!(StructureValidator::new(&pset).validate(&good).is_ok());

        // Swap the selector's arguments: percentile lands in the matrix slot.
        let bad = Tree::from_nodes(vec![
            Node::primitive(reg, &pset),
            Node::primitive(sel, &pset),
            Node::terminal(p10, &pset),
            Node::terminal(input, &pset),
        ]);
        assert!(StructureValidator::new(&pset).validate(&bad).is_err());
    }
}
