//! Dependency extraction across formulas.
//!
//! Maps every header that has a formula to the distinct headers it
//! references. Used for cycle detection and for ordering row evaluation.

use std::collections::HashMap;

use super::{Formula, HeaderId};

/// header -> headers its formula references (distinct, in reading order)
pub type DependencyGraph = HashMap<HeaderId, Vec<HeaderId>>;

/// Build the dependency graph from `(header, formula)` pairs.
pub fn dependency_graph<'a, I>(formulas: I) -> DependencyGraph
where
    I: IntoIterator<Item = (&'a HeaderId, &'a Formula)>,
{
    let mut graph = DependencyGraph::new();
    for (header, formula) in formulas {
        let mut deps: Vec<HeaderId> = Vec::new();
        for reference in formula.references() {
            if !deps.contains(reference) {
                deps.push(reference.clone());
            }
        }
        if !deps.is_empty() {
            graph.insert(header.clone(), deps);
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{ColumnKind, Operand, OperandGroup, Operator};

    #[test]
    fn test_duplicate_references_collapse() {
        let total = HeaderId::new("total");
        let a = HeaderId::new("a");
        let formula = Formula::new(vec![
            OperandGroup::new(
                Operator::Multiply,
                vec![
                    Operand::filled(a.clone(), "A", ColumnKind::Base),
                    Operand::filled(a.clone(), "A", ColumnKind::Base),
                ],
            ),
            OperandGroup::new(Operator::Divide, vec![Operand::placeholder()]),
        ]);
        let graph = dependency_graph([(&total, &formula)]);
        assert_eq!(graph.get(&total), Some(&vec![a]));
    }

    #[test]
    fn test_formula_without_references_is_left_out() {
        let header = HeaderId::new("x");
        let mut formula = Formula::default();
        formula.start(Operator::Multiply);
        assert!(dependency_graph([(&header, &formula)]).is_empty());
    }
}
