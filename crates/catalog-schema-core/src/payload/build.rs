use catalog_schema_engine::{ColumnKind, Formula, HeaderId, Operator};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, SchemaError};
use crate::registry::Registry;

/// The body of a "create schema" request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaSubmission {
    #[serde(rename = "titulo")]
    pub title: String,
    /// Optional built-ins (Quantity, Unit) present in the schema.
    #[serde(rename = "headers_base_active")]
    pub active_optional_base_ids: Vec<u8>,
    #[serde(rename = "headers_base_calculations")]
    pub base_formulas: Vec<BaseFormula>,
    #[serde(
        rename = "headers_atributes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub attribute_columns: Option<Vec<AttributeColumn>>,
    #[serde(rename = "order_headers", default)]
    pub column_order: Vec<OrderEntry>,
}

impl SchemaSubmission {
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaseFormula {
    #[serde(rename = "id_header_base")]
    pub base_column_id: u8,
    #[serde(rename = "calculo")]
    pub formula: FormulaPayload,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeColumn {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "isCantidad")]
    pub is_quantity: bool,
    #[serde(rename = "calculo", default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<FormulaPayload>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormulaPayload {
    #[serde(rename = "activo")]
    pub active: bool,
    #[serde(rename = "isMultiple")]
    pub is_multiple: bool,
    #[serde(rename = "operaciones")]
    pub groups: Vec<GroupPayload>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupPayload {
    #[serde(rename = "tipo")]
    pub operator: Operator,
    #[serde(rename = "headers_base", default, skip_serializing_if = "Option::is_none")]
    pub base_refs: Option<Vec<u8>>,
    #[serde(
        rename = "headers_atributes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub attribute_refs: Option<Vec<usize>>,
}

/// Position of one column: base columns by base id, attribute columns by
/// their 1-based attribute index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntry {
    pub id: u64,
    pub order: u32,
    #[serde(rename = "type", default)]
    pub kind: ColumnKind,
}

fn push_unique<T: PartialEq>(values: &mut Vec<T>, value: T) {
    if !values.contains(&value) {
        values.push(value);
    }
}

/// Fail on the first header whose formula still has an unfilled operand.
pub fn validate(registry: &Registry) -> Result<()> {
    match registry
        .headers()
        .iter()
        .find(|header| header.formula.has_unfilled())
    {
        Some(header) => Err(SchemaError::IncompleteFormula {
            header: header.display_title(registry.fallback_title()),
        }),
        None => Ok(()),
    }
}

/// 1-based position of each attribute column among the attribute columns.
pub(crate) fn attribute_indices(registry: &Registry) -> HashMap<HeaderId, usize> {
    registry
        .attribute_headers()
        .enumerate()
        .map(|(index, header)| (header.id.clone(), index + 1))
        .collect()
}

/// Convert one formula to the index-based payload.
///
/// Base operands resolve to the referenced column's base id, attribute
/// operands through `attribute_index`; references that resolve to nothing
/// are skipped. Groups left with no reference are dropped, and `None` is
/// returned when no group survives.
pub fn build_formula_payload(
    formula: &Formula,
    registry: &Registry,
    attribute_index: &HashMap<HeaderId, usize>,
) -> Option<FormulaPayload> {
    let mut groups = Vec::new();

    for group in &formula.groups {
        let mut base_refs: Vec<u8> = Vec::new();
        let mut attribute_refs: Vec<usize> = Vec::new();

        for operand in &group.operands {
            let Some(reference) = &operand.header_ref else {
                continue;
            };
            match operand.kind {
                ColumnKind::Base => {
                    if let Some(base) = registry.get(reference).and_then(|h| h.base_column) {
                        push_unique(&mut base_refs, base.id());
                    }
                }
                ColumnKind::Attribute => {
                    if let Some(index) = attribute_index.get(reference) {
                        push_unique(&mut attribute_refs, *index);
                    }
                }
            }
        }

        if base_refs.is_empty() && attribute_refs.is_empty() {
            continue;
        }
        groups.push(GroupPayload {
            operator: group.operator,
            base_refs: (!base_refs.is_empty()).then_some(base_refs),
            attribute_refs: (!attribute_refs.is_empty()).then_some(attribute_refs),
        });
    }

    if groups.is_empty() {
        return None;
    }
    Some(FormulaPayload {
        active: true,
        is_multiple: groups.len() > 1,
        groups,
    })
}

/// Walk the registry and produce the submission body.
///
/// Expects a registry that passed [`validate`]; use [`prepare_submission`]
/// to run every gate first.
pub fn build_submission(registry: &Registry, title: &str) -> SchemaSubmission {
    let attribute_index = attribute_indices(registry);

    let mut active_optional_base_ids = Vec::new();
    let mut base_formulas = Vec::new();
    let mut column_order = Vec::new();

    for header in registry.headers() {
        match header.base_column {
            Some(base) if header.is_base_header => {
                if base.is_optional() {
                    push_unique(&mut active_optional_base_ids, base.id());
                }
                if let Some(formula) =
                    build_formula_payload(&header.formula, registry, &attribute_index)
                {
                    base_formulas.push(BaseFormula {
                        base_column_id: base.id(),
                        formula,
                    });
                }
                column_order.push(OrderEntry {
                    id: u64::from(base.id()),
                    order: header.order,
                    kind: ColumnKind::Base,
                });
            }
            _ => {
                if let Some(index) = attribute_index.get(&header.id) {
                    column_order.push(OrderEntry {
                        id: *index as u64,
                        order: header.order,
                        kind: ColumnKind::Attribute,
                    });
                }
            }
        }
    }

    let attributes: Vec<AttributeColumn> = registry
        .attribute_headers()
        .map(|header| AttributeColumn {
            title: header.display_title(registry.fallback_title()).trim().to_string(),
            is_quantity: header.is_quantity,
            formula: build_formula_payload(&header.formula, registry, &attribute_index),
        })
        .collect();

    SchemaSubmission {
        title: title.trim().to_string(),
        active_optional_base_ids,
        base_formulas,
        attribute_columns: (!attributes.is_empty()).then_some(attributes),
        column_order,
    }
}

/// Run every submission gate, then build the payload.
///
/// Refuses a blank table title, an unanswered quantity question and any
/// incomplete formula, in that order.
pub fn prepare_submission(registry: &Registry, title: &str) -> Result<SchemaSubmission> {
    if title.trim().is_empty() {
        return Err(SchemaError::MissingTitle);
    }
    if let Some(header) = registry
        .headers()
        .iter()
        .find(|header| header.pending_quantity_question)
    {
        return Err(SchemaError::PendingQuantityQuestion {
            header: header.display_title(registry.fallback_title()),
        });
    }
    validate(registry)?;
    Ok(build_submission(registry, title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::BaseColumn;
    use catalog_schema_engine::{Operand, OperandGroup, Slot};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn flete_registry() -> (Registry, HeaderId) {
        let mut registry = Registry::new();
        let flete = registry.add_custom();
        registry.set_title(&flete, "Flete").unwrap();
        registry.answer_quantity_question(&flete, true).unwrap();
        let total = BaseColumn::Total.header_id();
        registry.start_formula(&total, Operator::Divide).unwrap();
        registry
            .update(&total, |h| {
                *h.formula.operand_mut(Slot::new(1, 0)).unwrap() =
                    Operand::filled(flete.clone(), "Flete", ColumnKind::Attribute);
                Ok(())
            })
            .unwrap();
        (registry, flete)
    }

    #[test]
    fn test_default_submission_json() {
        let registry = Registry::new();
        let submission = prepare_submission(&registry, "  Tuberías ").unwrap();
        assert_eq!(
            serde_json::to_value(&submission).unwrap(),
            json!({
                "titulo": "Tuberías",
                "headers_base_active": [3, 2],
                "headers_base_calculations": [{
                    "id_header_base": 5,
                    "calculo": {
                        "activo": true,
                        "isMultiple": false,
                        "operaciones": [{"tipo": "multiplicacion", "headers_base": [2, 4]}]
                    }
                }],
                "order_headers": [
                    {"id": 1, "order": 1, "type": "base"},
                    {"id": 3, "order": 2, "type": "base"},
                    {"id": 2, "order": 3, "type": "base"},
                    {"id": 4, "order": 4, "type": "base"},
                    {"id": 5, "order": 999, "type": "base"}
                ]
            })
        );
    }

    #[test]
    fn test_attribute_refs_use_positions() {
        let (registry, _) = flete_registry();
        let submission = build_submission(&registry, "Fletes");

        let total = &submission.base_formulas[0];
        assert_eq!(total.base_column_id, 5);
        assert!(total.formula.is_multiple);
        assert_eq!(
            total.formula.groups[1],
            GroupPayload {
                operator: Operator::Divide,
                base_refs: None,
                attribute_refs: Some(vec![1]),
            }
        );
        assert_eq!(
            submission.attribute_columns,
            Some(vec![AttributeColumn {
                title: "Flete".into(),
                is_quantity: true,
                formula: None,
            }])
        );
        assert!(submission.column_order.contains(&OrderEntry {
            id: 1,
            order: 4,
            kind: ColumnKind::Attribute,
        }));
    }

    #[test]
    fn test_duplicate_refs_collapse_and_unresolved_groups_drop() {
        let registry = Registry::new();
        let quantity = BaseColumn::Quantity.header_id();
        let formula = Formula::new(vec![
            OperandGroup::new(
                Operator::Multiply,
                vec![
                    Operand::filled(quantity.clone(), "Quantity", ColumnKind::Base),
                    Operand::filled(quantity, "Quantity", ColumnKind::Base),
                ],
            ),
            OperandGroup::new(
                Operator::Divide,
                vec![Operand::filled(HeaderId::new("gone"), "Gone", ColumnKind::Attribute)],
            ),
        ]);
        let payload =
            build_formula_payload(&formula, &registry, &attribute_indices(&registry)).unwrap();
        assert!(!payload.is_multiple);
        assert_eq!(payload.groups.len(), 1);
        assert_eq!(payload.groups[0].base_refs, Some(vec![2]));

        let only_dangling = Formula::new(vec![OperandGroup::new(
            Operator::Multiply,
            vec![Operand::filled(HeaderId::new("x"), "X", ColumnKind::Attribute)],
        )]);
        assert_eq!(
            build_formula_payload(&only_dangling, &registry, &HashMap::new()),
            None
        );
    }

    #[test]
    fn test_blank_custom_title_serializes_as_fallback() {
        let mut registry = Registry::new();
        let blank = registry.add_custom();
        registry.answer_quantity_question(&blank, false).unwrap();
        let submission = prepare_submission(&registry, "Tabla").unwrap();
        let columns = submission.attribute_columns.unwrap();
        assert_eq!(columns[0].title, "Header");
        assert!(!columns[0].is_quantity);
    }

    #[test]
    fn test_submission_gates() {
        let mut registry = Registry::new();
        assert!(matches!(
            prepare_submission(&registry, "   "),
            Err(SchemaError::MissingTitle)
        ));

        let pending = registry.add_custom();
        registry.set_title(&pending, "Peso").unwrap();
        assert!(matches!(
            prepare_submission(&registry, "Tabla"),
            Err(SchemaError::PendingQuantityQuestion { ref header }) if header == "Peso"
        ));

        registry.answer_quantity_question(&pending, true).unwrap();
        registry
            .start_formula(&BaseColumn::Total.header_id(), Operator::Multiply)
            .unwrap();
        assert!(matches!(
            prepare_submission(&registry, "Tabla"),
            Err(SchemaError::IncompleteFormula { ref header }) if header == "Total"
        ));
    }
}
