//! The stored schema returned by the persistence backend, and hydration of
//! an editable registry from it.

use catalog_schema_engine::{ColumnKind, Formula, HeaderId, Operand, OperandGroup, Operator};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::build::{FormulaPayload, OrderEntry, SchemaSubmission};
use crate::error::Result;
use crate::header::{BaseColumn, Header, TOTAL_ORDER};
use crate::registry::Registry;
use crate::settings::Settings;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredSchema {
    #[serde(rename = "id_tipo_material", default)]
    pub id: u64,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "headers_base", default)]
    pub base_headers: Vec<StoredBaseHeader>,
    #[serde(rename = "headers_atributes", default)]
    pub attribute_headers: Option<Vec<StoredAttributeHeader>>,
    #[serde(rename = "order_headers", default)]
    pub column_order: Vec<OrderEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredBaseHeader {
    #[serde(rename = "id_header_base")]
    pub base_column_id: u8,
    #[serde(rename = "titulo", default)]
    pub title: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(rename = "calculo", default)]
    pub formula: StoredFormula,
    #[serde(default)]
    pub order: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredAttributeHeader {
    #[serde(rename = "id_header_atribute")]
    pub id: u64,
    #[serde(rename = "titulo", default)]
    pub title: String,
    #[serde(rename = "isCantidad", default)]
    pub is_quantity: bool,
    #[serde(rename = "calculo", default)]
    pub formula: StoredFormula,
    #[serde(default)]
    pub order: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredFormula {
    #[serde(rename = "activo", default)]
    pub active: bool,
    #[serde(rename = "isMultiple", default)]
    pub is_multiple: bool,
    #[serde(rename = "operaciones", default)]
    pub groups: Vec<StoredGroup>,
}

/// A stored operation. The operator stays a string: the backend also knows
/// operators the editor cannot build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredGroup {
    #[serde(rename = "tipo", default = "default_operator")]
    pub operator: String,
    #[serde(rename = "headers_base", default)]
    pub base_refs: Option<Vec<u8>>,
    #[serde(rename = "headers_atributes", default)]
    pub attribute_refs: Option<Vec<u64>>,
}

fn default_active() -> bool {
    true
}

fn default_operator() -> String {
    "multiplicacion".to_string()
}

fn operator_name(operator: Operator) -> &'static str {
    match operator {
        Operator::Multiply => "multiplicacion",
        Operator::Divide => "division",
    }
}

impl From<&FormulaPayload> for StoredFormula {
    fn from(payload: &FormulaPayload) -> Self {
        StoredFormula {
            active: payload.active,
            is_multiple: payload.is_multiple,
            groups: payload
                .groups
                .iter()
                .map(|group| StoredGroup {
                    operator: operator_name(group.operator).to_string(),
                    base_refs: group.base_refs.clone(),
                    attribute_refs: group
                        .attribute_refs
                        .as_ref()
                        .map(|refs| refs.iter().map(|index| *index as u64).collect()),
                })
                .collect(),
        }
    }
}

impl StoredSchema {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The schema a backend stores for `submission`: every built-in listed
    /// with its active flag, attribute columns keyed by their position.
    pub fn from_submission(id: u64, submission: &SchemaSubmission) -> Self {
        let order_of = |kind: ColumnKind, id: u64| {
            submission
                .column_order
                .iter()
                .find(|entry| entry.kind == kind && entry.id == id)
                .map(|entry| entry.order)
        };

        let base_headers = BaseColumn::ALL
            .into_iter()
            .map(|base| StoredBaseHeader {
                base_column_id: base.id(),
                title: base.label().to_string(),
                active: !base.is_optional()
                    || submission.active_optional_base_ids.contains(&base.id()),
                formula: submission
                    .base_formulas
                    .iter()
                    .find(|entry| entry.base_column_id == base.id())
                    .map(|entry| StoredFormula::from(&entry.formula))
                    .unwrap_or_default(),
                order: order_of(ColumnKind::Base, u64::from(base.id())),
            })
            .collect();

        let attribute_headers = submission.attribute_columns.as_ref().map(|columns| {
            columns
                .iter()
                .enumerate()
                .map(|(index, column)| {
                    let id = index as u64 + 1;
                    StoredAttributeHeader {
                        id,
                        title: column.title.clone(),
                        is_quantity: column.is_quantity,
                        formula: column
                            .formula
                            .as_ref()
                            .map(StoredFormula::from)
                            .unwrap_or_default(),
                        order: order_of(ColumnKind::Attribute, id),
                    }
                })
                .collect()
        });

        StoredSchema {
            id,
            title: submission.title.clone(),
            base_headers,
            attribute_headers,
            column_order: submission.column_order.clone(),
        }
    }
}

fn attribute_header_id(id: u64) -> HeaderId {
    HeaderId::new(format!("attr-{}", id))
}

impl Registry {
    /// Rebuild an editable registry from a stored schema.
    ///
    /// Positions come from `order_headers`, then each header's own `order`,
    /// then its position in the stored list. Inactive optional built-ins are
    /// left out; Detail, Unit Cost and Total are always present. References
    /// a header makes to itself are dropped, as are operations with an
    /// operator the editor cannot express or with no resolvable reference.
    pub fn from_stored(stored: &StoredSchema, settings: &Settings) -> Registry {
        let positions: HashMap<(ColumnKind, u64), u32> = stored
            .column_order
            .iter()
            .map(|entry| ((entry.kind, entry.id), entry.order))
            .collect();

        let mut headers: Vec<Header> = Vec::new();
        let mut formulas: Vec<(HeaderId, &StoredFormula)> = Vec::new();

        for (index, stored_base) in stored.base_headers.iter().enumerate() {
            let Some(base) = BaseColumn::from_id(stored_base.base_column_id) else {
                tracing::warn!(id = stored_base.base_column_id, "skipping unknown base column");
                continue;
            };
            if (!stored_base.active && base.is_optional())
                || headers.iter().any(|header| header.is_base(base))
            {
                continue;
            }
            let mut header = Header::built_in(base);
            let title = stored_base.title.trim();
            if !title.is_empty() {
                header.title = title.to_string();
            }
            header.order = positions
                .get(&(ColumnKind::Base, u64::from(base.id())))
                .copied()
                .or(stored_base.order)
                .unwrap_or(if base == BaseColumn::Total {
                    TOTAL_ORDER
                } else {
                    index as u32 + 1
                });
            formulas.push((header.id.clone(), &stored_base.formula));
            headers.push(header);
        }

        for base in [BaseColumn::Detail, BaseColumn::UnitCost, BaseColumn::Total] {
            if !headers.iter().any(|header| header.is_base(base)) {
                headers.push(Header::built_in(base));
            }
        }

        for (index, stored_attribute) in stored.attribute_headers.iter().flatten().enumerate() {
            let mut header = Header::custom(0);
            header.id = attribute_header_id(stored_attribute.id);
            header.title = stored_attribute.title.trim().to_string();
            header.is_quantity = stored_attribute.is_quantity;
            header.is_quantity_resolved = true;
            header.pending_quantity_question = false;
            header.order = positions
                .get(&(ColumnKind::Attribute, stored_attribute.id))
                .copied()
                .or(stored_attribute.order)
                .unwrap_or(index as u32 + 1);
            formulas.push((header.id.clone(), &stored_attribute.formula));
            headers.push(header);
        }

        let titles: HashMap<HeaderId, String> = headers
            .iter()
            .map(|header| (header.id.clone(), header.display_title(&settings.fallback_title)))
            .collect();
        let resolve = |id: HeaderId, kind: ColumnKind| {
            titles
                .get(&id)
                .map(|title| Operand::filled(id.clone(), title.clone(), kind))
        };

        for (id, stored_formula) in formulas {
            if !stored_formula.active {
                continue;
            }
            let mut formula = Formula::default();
            for group in &stored_formula.groups {
                let Ok(operator) = group.operator.parse::<Operator>() else {
                    tracing::warn!(
                        header = %id,
                        operator = %group.operator,
                        "dropping unsupported operation"
                    );
                    continue;
                };
                let operands: Vec<Operand> = group
                    .base_refs
                    .iter()
                    .flatten()
                    .filter_map(|base_id| {
                        BaseColumn::from_id(*base_id)
                            .and_then(|base| resolve(base.header_id(), ColumnKind::Base))
                    })
                    .chain(
                        group
                            .attribute_refs
                            .iter()
                            .flatten()
                            .filter_map(|attr_id| {
                                resolve(attribute_header_id(*attr_id), ColumnKind::Attribute)
                            }),
                    )
                    .filter(|operand| !operand.references(&id))
                    .collect();
                if !operands.is_empty() {
                    formula.groups.push(OperandGroup::new(operator, operands));
                }
            }
            if let Some(header) = headers.iter_mut().find(|header| header.id == id) {
                header.formula = formula;
            }
        }

        Registry::from_headers(headers, &settings.fallback_title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STORED: &str = r#"{
        "id_tipo_material": 7,
        "titulo": "Tuberías",
        "headers_base": [
            {"id_header_base": 1, "titulo": "Detalle", "active": true, "order": 1},
            {"id_header_base": 2, "titulo": "Cantidad", "active": true},
            {"id_header_base": 3, "titulo": "Unidad", "active": false},
            {"id_header_base": 4, "titulo": "", "active": true},
            {"id_header_base": 5, "titulo": "Total", "active": true, "calculo": {
                "activo": true,
                "isMultiple": true,
                "operaciones": [
                    {"tipo": "multiplicacion", "headers_base": [2, 4]},
                    {"tipo": "division", "headers_atributes": [12]},
                    {"tipo": "suma", "headers_base": [2]},
                    {"tipo": "division", "headers_atributes": [99]}
                ]
            }}
        ],
        "headers_atributes": [
            {"id_header_atribute": 12, "titulo": "Rollos", "isCantidad": true}
        ],
        "order_headers": [
            {"id": 1, "order": 1, "type": "base"},
            {"id": 12, "order": 2, "type": "atribute"},
            {"id": 2, "order": 3, "type": "base"},
            {"id": 4, "order": 4, "type": "base"},
            {"id": 5, "order": 999, "type": "base"}
        ]
    }"#;

    #[test]
    fn test_from_stored_rebuilds_headers_and_formulas() {
        let stored = StoredSchema::from_json(STORED).unwrap();
        let registry = Registry::from_stored(&stored, &Settings::default());

        let titles: Vec<String> = registry
            .headers()
            .iter()
            .map(|header| registry.title_of(&header.id))
            .collect();
        assert_eq!(titles, vec!["Detalle", "Rollos", "Cantidad", "Unit Cost", "Total"]);
        assert!(registry.base_header(BaseColumn::Unit).is_none());

        let rollos = registry.get(&HeaderId::new("attr-12")).unwrap();
        assert!(rollos.is_quantity && rollos.is_quantity_resolved);
        assert!(!rollos.pending_quantity_question);

        assert_eq!(
            registry
                .format_expression(&BaseColumn::Total.header_id(), "---")
                .unwrap(),
            "Cantidad × Unit Cost ÷ Rollos"
        );
    }

    #[test]
    fn test_from_stored_drops_self_references() {
        let stored = StoredSchema::from_json(
            r#"{
                "titulo": "Cables",
                "headers_base": [
                    {"id_header_base": 5, "titulo": "Total", "calculo": {
                        "activo": true,
                        "isMultiple": true,
                        "operaciones": [
                            {"tipo": "multiplicacion", "headers_base": [4, 5]},
                            {"tipo": "division", "headers_base": [5]}
                        ]
                    }}
                ]
            }"#,
        )
        .unwrap();
        let registry = Registry::from_stored(&stored, &Settings::default());
        let total = BaseColumn::Total.header_id();

        let header = registry.get(&total).unwrap();
        assert!(!header.formula.references_header(&total));
        assert_eq!(header.formula.groups.len(), 1);
        assert_eq!(registry.format_expression(&total, "---").unwrap(), "Unit Cost");
    }

    #[test]
    fn test_from_stored_keeps_pinned_columns() {
        let stored =
            StoredSchema::from_json(r#"{"titulo": "Vacía", "headers_base": []}"#).unwrap();
        let registry = Registry::from_stored(&stored, &Settings::default());
        let bases: Vec<_> = registry.headers().iter().map(|h| h.base_column).collect();
        assert_eq!(
            bases,
            vec![
                Some(BaseColumn::Detail),
                Some(BaseColumn::UnitCost),
                Some(BaseColumn::Total)
            ]
        );
    }

    #[test]
    fn test_from_submission_lists_every_built_in() {
        let submission = super::super::build_submission(&Registry::new(), "Tabla");
        let stored = StoredSchema::from_submission(3, &submission);
        assert_eq!(stored.id, 3);
        assert_eq!(stored.base_headers.len(), 5);
        assert!(stored.base_headers.iter().all(|header| header.active));
        assert_eq!(stored.base_headers[4].formula.groups[0].operator, "multiplicacion");
        assert_eq!(stored.attribute_headers, None);
    }
}
