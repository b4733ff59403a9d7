//! Column headers and the five built-in base columns.

use catalog_schema_engine::{ColumnKind, Formula, HeaderId};

/// Sort key that keeps Total last.
pub const TOTAL_ORDER: u32 = 999;

/// The fixed schema columns known to the backend by numeric id.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum BaseColumn {
    Detail = 1,
    Quantity = 2,
    Unit = 3,
    UnitCost = 4,
    Total = 5,
}

impl BaseColumn {
    pub const ALL: [BaseColumn; 5] = [
        BaseColumn::Detail,
        BaseColumn::Quantity,
        BaseColumn::Unit,
        BaseColumn::UnitCost,
        BaseColumn::Total,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<BaseColumn> {
        BaseColumn::ALL.into_iter().find(|base| base.id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            BaseColumn::Detail => "Detail",
            BaseColumn::Quantity => "Quantity",
            BaseColumn::Unit => "Unit",
            BaseColumn::UnitCost => "Unit Cost",
            BaseColumn::Total => "Total",
        }
    }

    /// Quantity and Unit may be added and removed; the rest are always present.
    pub fn is_optional(self) -> bool {
        matches!(self, BaseColumn::Quantity | BaseColumn::Unit)
    }

    pub fn default_order(self) -> u32 {
        match self {
            BaseColumn::Detail => 1,
            BaseColumn::Quantity => 2,
            BaseColumn::Unit => 3,
            BaseColumn::UnitCost => 4,
            BaseColumn::Total => TOTAL_ORDER,
        }
    }

    /// Deterministic header id (`base-N`).
    pub fn header_id(self) -> HeaderId {
        HeaderId::new(format!("base-{}", self.id()))
    }
}

/// A column definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub id: HeaderId,
    pub title: String,
    pub is_editable: bool,
    pub is_base_header: bool,
    pub base_column: Option<BaseColumn>,
    /// The column holds a countable quantity.
    pub is_quantity: bool,
    /// The user has answered the quantity question.
    pub is_quantity_resolved: bool,
    /// The quantity question is still shown for this column.
    pub pending_quantity_question: bool,
    pub formula: Formula,
    pub order: u32,
}

impl Header {
    /// A built-in column with its fixed properties and default position.
    pub fn built_in(base: BaseColumn) -> Header {
        Header {
            id: base.header_id(),
            title: base.label().to_string(),
            is_editable: base.is_optional(),
            is_base_header: true,
            base_column: Some(base),
            is_quantity: base == BaseColumn::Quantity,
            is_quantity_resolved: true,
            pending_quantity_question: false,
            formula: Formula::default(),
            order: base.default_order(),
        }
    }

    /// A blank user-defined column. Its quantity question is still open.
    pub fn custom(order: u32) -> Header {
        Header {
            id: HeaderId::generate(),
            title: String::new(),
            is_editable: true,
            is_base_header: false,
            base_column: None,
            is_quantity: false,
            is_quantity_resolved: false,
            pending_quantity_question: true,
            formula: Formula::default(),
            order,
        }
    }

    pub fn is_base(&self, base: BaseColumn) -> bool {
        self.base_column == Some(base)
    }

    /// Whether this column is one of Detail, UnitCost or Total.
    pub fn is_pinned(&self) -> bool {
        matches!(
            self.base_column,
            Some(BaseColumn::Detail | BaseColumn::UnitCost | BaseColumn::Total)
        )
    }

    pub fn is_removable(&self) -> bool {
        !self.is_pinned()
    }

    /// Title for display: the header's own title, else its built-in label,
    /// else `fallback`.
    pub fn display_title(&self, fallback: &str) -> String {
        if !self.title.trim().is_empty() {
            return self.title.clone();
        }
        match self.base_column {
            Some(base) if self.is_base_header => base.label().to_string(),
            _ => fallback.to_string(),
        }
    }

    pub fn column_kind(&self) -> ColumnKind {
        if self.is_base_header {
            ColumnKind::Base
        } else {
            ColumnKind::Attribute
        }
    }

    fn is_confirmed_quantity(&self) -> bool {
        self.is_quantity_resolved && self.is_quantity
    }

    /// Whether a formula may be built on this column.
    pub fn supports_calculation(&self) -> bool {
        if self.is_base_header {
            return match self.base_column {
                Some(BaseColumn::Total) => true,
                Some(BaseColumn::Quantity) => self.is_confirmed_quantity(),
                _ => false,
            };
        }
        !self.formula.is_empty() || self.is_confirmed_quantity()
    }

    /// Whether this column may be picked as an operand of another formula.
    pub fn is_selectable_as_operand(&self) -> bool {
        if !self.formula.is_empty() {
            return true;
        }
        if self.is_base_header {
            return match self.base_column {
                Some(BaseColumn::UnitCost) => true,
                Some(BaseColumn::Quantity) => self.is_confirmed_quantity(),
                _ => false,
            };
        }
        self.is_confirmed_quantity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_schema_engine::Operator;

    #[test]
    fn test_base_column_ids_round_trip() {
        for base in BaseColumn::ALL {
            assert_eq!(BaseColumn::from_id(base.id()), Some(base));
        }
        assert_eq!(BaseColumn::from_id(0), None);
        assert_eq!(BaseColumn::from_id(6), None);
    }

    #[test]
    fn test_calculation_support_for_built_ins() {
        assert!(Header::built_in(BaseColumn::Total).supports_calculation());
        assert!(Header::built_in(BaseColumn::Quantity).supports_calculation());
        assert!(!Header::built_in(BaseColumn::Unit).supports_calculation());
        assert!(!Header::built_in(BaseColumn::Detail).supports_calculation());
        assert!(!Header::built_in(BaseColumn::UnitCost).supports_calculation());
    }

    #[test]
    fn test_selectable_operands() {
        assert!(Header::built_in(BaseColumn::UnitCost).is_selectable_as_operand());
        assert!(Header::built_in(BaseColumn::Quantity).is_selectable_as_operand());
        assert!(!Header::built_in(BaseColumn::Unit).is_selectable_as_operand());
        assert!(!Header::built_in(BaseColumn::Detail).is_selectable_as_operand());
        assert!(!Header::built_in(BaseColumn::Total).is_selectable_as_operand());
    }

    #[test]
    fn test_custom_header_needs_quantity_answer_or_formula() {
        let mut header = Header::custom(5);
        assert!(!header.supports_calculation());
        assert!(!header.is_selectable_as_operand());

        header.is_quantity = true;
        header.is_quantity_resolved = true;
        assert!(header.supports_calculation());
        assert!(header.is_selectable_as_operand());

        let mut derived = Header::custom(6);
        derived.formula.start(Operator::Multiply);
        assert!(derived.supports_calculation());
        assert!(derived.is_selectable_as_operand());
    }

    #[test]
    fn test_display_title_fallbacks() {
        let mut unit = Header::built_in(BaseColumn::Unit);
        unit.title = "  ".into();
        assert_eq!(unit.display_title("Header"), "Unit");
        assert_eq!(Header::custom(3).display_title("Header"), "Header");
    }
}
