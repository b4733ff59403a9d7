//! Expression rendering.

use super::Formula;

/// Render the flattened operand sequence, each operand preceded by its
/// group's operator glyph. Unfilled or untitled operands render as
/// `placeholder`.
pub fn format_expression(formula: &Formula, placeholder: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for (_, operator, operand) in formula.operands() {
        if !parts.is_empty() {
            parts.push(operator.symbol());
        }
        let title = operand.display_title.trim();
        if operand.is_filled() && !title.is_empty() {
            parts.push(title);
        } else {
            parts.push(placeholder);
        }
    }
    parts.join(" ")
}
