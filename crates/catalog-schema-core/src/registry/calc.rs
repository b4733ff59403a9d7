use catalog_schema_engine::{
    DependencyGraph, HeaderId, Operand, Operator, Slot, dependency_graph, detect_cycle, evaluate,
    format_expression,
};
use std::collections::{HashMap, HashSet};

use super::Registry;
use crate::error::{Result, SchemaError};

impl Registry {
    /// Check that a formula may be built on a header, without touching it.
    ///
    /// A custom header whose quantity question is still open gets a dedicated
    /// message.
    pub fn ensure_calculation(&self, id: &HeaderId) -> Result<()> {
        let header = self.require(id)?;
        if header.supports_calculation() {
            return Ok(());
        }
        let title = header.display_title(&self.fallback_title);
        if !header.is_base_header && !header.is_quantity_resolved && header.formula.is_empty() {
            return Err(SchemaError::QuantityUnanswered { header: title });
        }
        Err(SchemaError::CalculationUnsupported { header: title })
    }

    /// Append a calculation step to a header's formula. Returns the first
    /// new (unfilled) slot.
    pub fn start_formula(&mut self, id: &HeaderId, operator: Operator) -> Result<Slot> {
        self.ensure_calculation(id)?;
        let slot = self.update(id, |header| Ok(header.formula.start(operator)))?;
        tracing::debug!(header = %id, ?operator, %slot, "started calculation step");
        Ok(slot)
    }

    /// Remove one operand; its group goes too when left empty.
    pub fn remove_operand(&mut self, id: &HeaderId, slot: Slot) -> Result<Operand> {
        let fallback = self.fallback_title.clone();
        self.update(id, |header| {
            header
                .formula
                .remove_operand(slot)
                .ok_or_else(|| SchemaError::InvalidSlot {
                    header: header.display_title(&fallback),
                    slot,
                })
        })
    }

    pub fn clear_formula(&mut self, id: &HeaderId) -> Result<()> {
        self.update(id, |header| {
            header.formula.clear();
            Ok(())
        })
    }

    /// Render a header's formula, e.g. `Quantity × Unit Cost`.
    pub fn format_expression(&self, id: &HeaderId, placeholder: &str) -> Option<String> {
        self.get(id)
            .map(|header| format_expression(&header.formula, placeholder))
    }

    pub fn dependency_graph(&self) -> DependencyGraph {
        dependency_graph(
            self.headers
                .iter()
                .map(|header| (&header.id, &header.formula)),
        )
    }

    /// The loop that referencing `candidate` from `target`'s formula would
    /// close, if any.
    pub fn would_create_cycle(
        &self,
        target: &HeaderId,
        candidate: &HeaderId,
    ) -> Option<Vec<HeaderId>> {
        let mut graph = self.dependency_graph();
        let deps = graph.entry(target.clone()).or_default();
        if !deps.contains(candidate) {
            deps.push(candidate.clone());
        }
        detect_cycle(target, &graph)
    }

    /// Compute every derived column of one row.
    ///
    /// `values` holds the raw values of plain columns. Each header with a
    /// formula gets an entry; `None` means the value cannot be computed
    /// (unfilled operand, missing input, division by zero or a cycle).
    pub fn evaluate_row(&self, values: &HashMap<HeaderId, f64>) -> HashMap<HeaderId, Option<f64>> {
        let mut memo: HashMap<HeaderId, Option<f64>> = HashMap::new();
        let mut visiting: HashSet<HeaderId> = HashSet::new();

        for header in &self.headers {
            if !header.formula.is_empty() {
                self.resolve_value(&header.id, values, &mut memo, &mut visiting);
            }
        }

        memo
    }

    fn resolve_value(
        &self,
        id: &HeaderId,
        values: &HashMap<HeaderId, f64>,
        memo: &mut HashMap<HeaderId, Option<f64>>,
        visiting: &mut HashSet<HeaderId>,
    ) -> Option<f64> {
        if let Some(value) = memo.get(id) {
            return *value;
        }
        let header = self.get(id)?;
        if header.formula.is_empty() {
            return values.get(id).copied();
        }
        if !visiting.insert(id.clone()) {
            tracing::warn!(header = %id, "cyclic reference during row evaluation");
            return None;
        }

        let value = evaluate(&header.formula, |dep| {
            self.resolve_value(dep, values, memo, visiting)
        });

        visiting.remove(id);
        memo.insert(id.clone(), value);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::BaseColumn;
    use catalog_schema_engine::{ColumnKind, Formula, OperandGroup};

    fn fill(registry: &mut Registry, target: &HeaderId, slot: Slot, with: &HeaderId) {
        let title = registry.title_of(with);
        registry
            .update(target, |h| {
                let operand = h.formula.operand_mut(slot).unwrap();
                operand.header_ref = Some(with.clone());
                operand.display_title = title;
                operand.kind = ColumnKind::Attribute;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_start_formula_requires_quantity_answer() {
        let mut registry = Registry::new();
        let flete = registry.add_custom();
        registry.set_title(&flete, "Flete").unwrap();

        let err = registry.start_formula(&flete, Operator::Multiply).unwrap_err();
        assert!(matches!(err, SchemaError::QuantityUnanswered { ref header } if header == "Flete"));
        assert!(registry.get(&flete).unwrap().formula.is_empty());

        registry.answer_quantity_question(&flete, true).unwrap();
        let slot = registry.start_formula(&flete, Operator::Multiply).unwrap();
        assert_eq!(slot, Slot::new(0, 0));
        let formula = &registry.get(&flete).unwrap().formula;
        assert_eq!(formula.groups.len(), 1);
        assert_eq!(formula.unfilled_count(), 2);
    }

    #[test]
    fn test_start_formula_on_unit_is_unsupported() {
        let mut registry = Registry::new();
        let err = registry
            .start_formula(&BaseColumn::Unit.header_id(), Operator::Multiply)
            .unwrap_err();
        assert!(matches!(err, SchemaError::CalculationUnsupported { .. }));
    }

    #[test]
    fn test_start_formula_on_total_appends_group() {
        let mut registry = Registry::new();
        let total = BaseColumn::Total.header_id();
        let slot = registry.start_formula(&total, Operator::Divide).unwrap();
        assert_eq!(slot, Slot::new(1, 0));
        assert_eq!(
            registry.format_expression(&total, "---").unwrap(),
            "Quantity × Unit Cost ÷ ---"
        );
    }

    #[test]
    fn test_remove_operand_scenario_partial() {
        // A × B ÷ C, drop B -> A ÷ C
        let mut registry = Registry::new();
        let total = BaseColumn::Total.header_id();
        let ids: Vec<HeaderId> = ["A", "B", "C"]
            .iter()
            .map(|title| {
                let id = registry.add_custom();
                registry.set_title(&id, title).unwrap();
                registry.answer_quantity_question(&id, true).unwrap();
                id
            })
            .collect();
        registry.clear_formula(&total).unwrap();
        registry.start_formula(&total, Operator::Multiply).unwrap();
        registry.start_formula(&total, Operator::Divide).unwrap();
        fill(&mut registry, &total, Slot::new(0, 0), &ids[0]);
        fill(&mut registry, &total, Slot::new(0, 1), &ids[1]);
        fill(&mut registry, &total, Slot::new(1, 0), &ids[2]);
        assert_eq!(registry.format_expression(&total, "---").unwrap(), "A × B ÷ C");

        registry.remove_operand(&total, Slot::new(0, 1)).unwrap();
        let formula = &registry.get(&total).unwrap().formula;
        assert_eq!(formula.groups.len(), 2);
        assert_eq!(formula.groups[0].operands.len(), 1);
        assert_eq!(registry.format_expression(&total, "---").unwrap(), "A ÷ C");
    }

    #[test]
    fn test_remove_operand_out_of_range() {
        let mut registry = Registry::new();
        let err = registry
            .remove_operand(&BaseColumn::Total.header_id(), Slot::new(4, 0))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSlot { .. }));
    }

    #[test]
    fn test_would_create_cycle() {
        let mut registry = Registry::new();
        let flete = registry.add_custom();
        registry.answer_quantity_question(&flete, true).unwrap();
        let total = BaseColumn::Total.header_id();
        registry.start_formula(&flete, Operator::Multiply).unwrap();
        fill(&mut registry, &flete, Slot::new(0, 0), &total);

        assert!(registry.would_create_cycle(&total, &flete).is_some());
        assert!(
            registry
                .would_create_cycle(&flete, &BaseColumn::UnitCost.header_id())
                .is_none()
        );
    }

    #[test]
    fn test_evaluate_row_chains_derived_columns() {
        let mut registry = Registry::new();
        let flete = registry.add_custom();
        registry.answer_quantity_question(&flete, true).unwrap();
        let total = BaseColumn::Total.header_id();
        registry
            .update(&flete, |h| {
                h.formula = Formula::new(vec![OperandGroup::new(
                    Operator::Divide,
                    vec![
                        Operand::filled(total.clone(), "Total", ColumnKind::Base),
                        Operand::filled(
                            BaseColumn::Quantity.header_id(),
                            "Quantity",
                            ColumnKind::Base,
                        ),
                    ],
                )]);
                Ok(())
            })
            .unwrap();

        let values: HashMap<HeaderId, f64> = [
            (BaseColumn::Quantity.header_id(), 4.0),
            (BaseColumn::UnitCost.header_id(), 2.5),
        ]
        .into_iter()
        .collect();
        let row = registry.evaluate_row(&values);
        assert_eq!(row.get(&total), Some(&Some(10.0)));
        assert_eq!(row.get(&flete), Some(&Some(2.5)));
    }

    #[test]
    fn test_evaluate_row_cycle_is_absent() {
        let mut registry = Registry::new();
        let total = BaseColumn::Total.header_id();
        let flete = registry.add_custom();
        registry.answer_quantity_question(&flete, true).unwrap();
        registry
            .update(&flete, |h| {
                h.formula = Formula::new(vec![OperandGroup::new(
                    Operator::Multiply,
                    vec![Operand::filled(total.clone(), "Total", ColumnKind::Base)],
                )]);
                Ok(())
            })
            .unwrap();
        registry
            .update(&total, |h| {
                h.formula.groups[0]
                    .operands
                    .push(Operand::filled(flete.clone(), "Header", ColumnKind::Attribute));
                Ok(())
            })
            .unwrap();

        let row = registry.evaluate_row(&HashMap::new());
        assert_eq!(row.get(&total), Some(&None));
        assert_eq!(row.get(&flete), Some(&None));
    }
}
