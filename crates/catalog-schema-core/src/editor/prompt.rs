use catalog_schema_engine::Operator;
use std::fmt;

/// Confirmation shown before a filled operand is deleted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeletePrompt {
    /// The formula collapses to nothing (one group of at most two operands).
    WholeFormula {
        header: String,
        first: String,
        operator: Operator,
        second: String,
    },
    /// Only the operand (and its group, if left empty) goes.
    Partial {
        header: String,
        operand: String,
        operator: Operator,
        before: String,
        after: String,
    },
}

impl DeletePrompt {
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Whether accepting clears the whole formula.
    pub fn clears_formula(&self) -> bool {
        matches!(self, DeletePrompt::WholeFormula { .. })
    }
}

impl fmt::Display for DeletePrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletePrompt::WholeFormula {
                header,
                first,
                operator,
                second,
            } => write!(
                f,
                "Delete the calculation \"{}\" {} \"{}\" from header \"{}\"?",
                first,
                operator.symbol(),
                second,
                header
            ),
            DeletePrompt::Partial {
                header,
                operand,
                operator,
                before,
                after,
            } => write!(
                f,
                "Delete \"{}\" and its {} from \"{}\" in header \"{}\", leaving \"{}\"?",
                operand,
                operator.label(),
                before,
                header,
                after
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let whole = DeletePrompt::WholeFormula {
            header: "Total".into(),
            first: "Quantity".into(),
            operator: Operator::Multiply,
            second: "Unit Cost".into(),
        };
        assert_eq!(
            whole.message(),
            "Delete the calculation \"Quantity\" × \"Unit Cost\" from header \"Total\"?"
        );
        assert!(whole.clears_formula());

        let partial = DeletePrompt::Partial {
            header: "Total".into(),
            operand: "B".into(),
            operator: Operator::Multiply,
            before: "A × B ÷ C".into(),
            after: "A ÷ C".into(),
        };
        assert_eq!(
            partial.message(),
            "Delete \"B\" and its multiplication from \"A × B ÷ C\" in header \"Total\", leaving \"A ÷ C\"?"
        );
    }
}
