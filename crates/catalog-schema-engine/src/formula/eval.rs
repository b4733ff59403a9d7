//! Formula evaluation.
//!
//! Groups are evaluated left to right. A group's own operands fold with its
//! operator (multiply: product, divide: first divided by the rest), then the
//! group result folds into the running result with that same operator. The
//! first group seeds the running result. With single-operand trailing groups
//! this reads naturally: `[Q × P] [÷ F]` is `Q × P ÷ F`.

use super::{Formula, HeaderId, OperandGroup};

/// Evaluate a formula. `resolve` supplies the value of each referenced column.
///
/// Returns `None` for an empty formula, an unfilled operand, a reference the
/// resolver cannot supply, or any division by zero.
pub fn evaluate<F>(formula: &Formula, mut resolve: F) -> Option<f64>
where
    F: FnMut(&HeaderId) -> Option<f64>,
{
    let mut result: Option<f64> = None;

    for group in &formula.groups {
        let value = evaluate_group(group, &mut resolve)?;
        result = match result {
            None => Some(value),
            Some(running) => Some(group.operator.apply(running, value)?),
        };
    }

    result
}

fn evaluate_group<F>(group: &OperandGroup, resolve: &mut F) -> Option<f64>
where
    F: FnMut(&HeaderId) -> Option<f64>,
{
    let mut values = Vec::with_capacity(group.operands.len());
    for operand in &group.operands {
        let header = operand.header_ref.as_ref()?;
        values.push(resolve(header)?);
    }

    let (first, rest) = values.split_first()?;
    rest.iter()
        .try_fold(*first, |acc, value| group.operator.apply(acc, *value))
}
