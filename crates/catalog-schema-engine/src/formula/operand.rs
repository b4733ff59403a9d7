//! Formula data shape.
//!
//! A formula is an ordered list of [`OperandGroup`]s. The first group usually
//! holds two or more operands; every later group is appended by one "add
//! calculation" action and holds a single operand. Each group carries the
//! operator that joins its operands to whatever comes before them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Stable identifier of a column header.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderId(String);

impl HeaderId {
    pub fn new(id: impl Into<String>) -> HeaderId {
        HeaderId(id.into())
    }

    /// Generate a fresh random id for a user-defined column.
    pub fn generate() -> HeaderId {
        HeaderId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HeaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HeaderId {
    fn from(id: &str) -> Self {
        HeaderId::new(id)
    }
}

/// Operator joining an operand to the running result.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "multiplicacion")]
    Multiply,
    #[serde(rename = "division")]
    Divide,
}

impl Operator {
    /// Glyph used when rendering expressions.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Multiply => "×",
            Operator::Divide => "÷",
        }
    }

    /// Word used in confirmation prompts.
    pub fn label(self) -> &'static str {
        match self {
            Operator::Multiply => "multiplication",
            Operator::Divide => "division",
        }
    }

    /// Apply the operator. Division by zero yields `None`.
    pub fn apply(self, lhs: f64, rhs: f64) -> Option<f64> {
        match self {
            Operator::Multiply => Some(lhs * rhs),
            Operator::Divide if rhs == 0.0 => None,
            Operator::Divide => Some(lhs / rhs),
        }
    }
}

impl std::str::FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "multiply" | "multiplication" | "multiplicacion" | "mul" | "*" | "×" | "x" => {
                Ok(Operator::Multiply)
            }
            "divide" | "division" | "div" | "/" | "÷" => Ok(Operator::Divide),
            other => Err(format!("Invalid operator: {}", other)),
        }
    }
}

/// Which backend array an operand indexes into.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ColumnKind {
    #[default]
    #[serde(rename = "base")]
    Base,
    #[serde(rename = "atribute")]
    Attribute,
}

/// One reference slot inside a formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operand {
    pub id: Uuid,
    /// Referenced header, `None` while the slot is unfilled.
    pub header_ref: Option<HeaderId>,
    /// Cached title of the referenced header.
    pub display_title: String,
    pub kind: ColumnKind,
}

impl Operand {
    /// An unfilled slot waiting for the user to pick a column.
    pub fn placeholder() -> Operand {
        Operand {
            id: Uuid::new_v4(),
            header_ref: None,
            display_title: String::new(),
            kind: ColumnKind::Base,
        }
    }

    pub fn filled(header: HeaderId, title: impl Into<String>, kind: ColumnKind) -> Operand {
        Operand {
            id: Uuid::new_v4(),
            header_ref: Some(header),
            display_title: title.into(),
            kind,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.header_ref.is_some()
    }

    pub fn references(&self, header: &HeaderId) -> bool {
        self.header_ref.as_ref() == Some(header)
    }

    /// Turn the slot back into a placeholder, keeping its id.
    pub fn clear(&mut self) {
        self.header_ref = None;
        self.display_title.clear();
    }
}

/// A run of operands sharing one operator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperandGroup {
    pub operator: Operator,
    pub operands: Vec<Operand>,
}

impl OperandGroup {
    pub fn new(operator: Operator, operands: Vec<Operand>) -> OperandGroup {
        OperandGroup { operator, operands }
    }
}

/// Position of an operand: group index, then operand index within the group.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Slot {
    pub group: usize,
    pub operand: usize,
}

impl Slot {
    pub fn new(group: usize, operand: usize) -> Slot {
        Slot { group, operand }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.operand)
    }
}

/// The ordered list of operand groups defining a derived column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Formula {
    pub groups: Vec<OperandGroup>,
}

impl Formula {
    pub fn new(groups: Vec<OperandGroup>) -> Formula {
        Formula { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    pub fn operand(&self, slot: Slot) -> Option<&Operand> {
        self.groups.get(slot.group)?.operands.get(slot.operand)
    }

    pub fn operand_mut(&mut self, slot: Slot) -> Option<&mut Operand> {
        self.groups.get_mut(slot.group)?.operands.get_mut(slot.operand)
    }

    /// Every operand in reading order, paired with its slot and its group's operator.
    pub fn operands(&self) -> impl Iterator<Item = (Slot, Operator, &Operand)> + '_ {
        self.groups.iter().enumerate().flat_map(|(g, group)| {
            group
                .operands
                .iter()
                .enumerate()
                .map(move |(o, operand)| (Slot::new(g, o), group.operator, operand))
        })
    }

    /// Locate an operand by its id.
    pub fn slot_of(&self, operand_id: Uuid) -> Option<Slot> {
        self.operands()
            .find(|(_, _, operand)| operand.id == operand_id)
            .map(|(slot, _, _)| slot)
    }

    pub fn operand_count(&self) -> usize {
        self.groups.iter().map(|g| g.operands.len()).sum()
    }

    pub fn has_unfilled(&self) -> bool {
        self.operands().any(|(_, _, operand)| !operand.is_filled())
    }

    pub fn unfilled_count(&self) -> usize {
        self.operands()
            .filter(|(_, _, operand)| !operand.is_filled())
            .count()
    }

    pub fn first_unfilled(&self) -> Option<Slot> {
        self.operands()
            .find(|(_, _, operand)| !operand.is_filled())
            .map(|(slot, _, _)| slot)
    }

    /// Scan forward from `after` (exclusive): the rest of its group, then the
    /// following groups. Earlier slots are never revisited.
    pub fn next_unfilled_after(&self, after: Slot) -> Option<Slot> {
        self.operands()
            .filter(|(slot, _, _)| *slot > after)
            .find(|(_, _, operand)| !operand.is_filled())
            .map(|(slot, _, _)| slot)
    }

    /// Filled references, in reading order (duplicates kept).
    pub fn references(&self) -> impl Iterator<Item = &HeaderId> + '_ {
        self.operands()
            .filter_map(|(_, _, operand)| operand.header_ref.as_ref())
    }

    /// Filled references of every slot except `skip`.
    pub fn references_except(&self, skip: Slot) -> HashSet<HeaderId> {
        self.operands()
            .filter(|(slot, _, _)| *slot != skip)
            .filter_map(|(_, _, operand)| operand.header_ref.clone())
            .collect()
    }

    pub fn references_header(&self, header: &HeaderId) -> bool {
        self.references().any(|r| r == header)
    }

    /// Append the operands of a new calculation step.
    ///
    /// An empty formula gets one group with two placeholders; otherwise a
    /// group with one placeholder is appended. Returns the first new slot.
    pub fn start(&mut self, operator: Operator) -> Slot {
        if self.groups.is_empty() {
            self.groups.push(OperandGroup::new(
                operator,
                vec![Operand::placeholder(), Operand::placeholder()],
            ));
            Slot::new(0, 0)
        } else {
            self.groups
                .push(OperandGroup::new(operator, vec![Operand::placeholder()]));
            Slot::new(self.groups.len() - 1, 0)
        }
    }

    /// Remove one operand; a group left empty is dropped with it.
    pub fn remove_operand(&mut self, slot: Slot) -> Option<Operand> {
        let group = self.groups.get_mut(slot.group)?;
        if slot.operand >= group.operands.len() {
            return None;
        }
        let removed = group.operands.remove(slot.operand);
        if group.operands.is_empty() {
            self.groups.remove(slot.group);
        }
        Some(removed)
    }

    /// Drop operands matching `pred`, then any group left empty.
    /// Returns the number of operands removed.
    pub fn retain_operands<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Operand) -> bool,
    {
        let before = self.operand_count();
        for group in &mut self.groups {
            group.operands.retain(&mut keep);
        }
        self.groups.retain(|group| !group.operands.is_empty());
        before - self.operand_count()
    }

    /// Drop every operand referencing `header`.
    pub fn prune_reference(&mut self, header: &HeaderId) -> usize {
        self.retain_operands(|operand| !operand.references(header))
    }

    /// Drop every unfilled operand.
    pub fn strip_unfilled(&mut self) -> usize {
        self.retain_operands(Operand::is_filled)
    }

    /// Rewrite the cached title of every operand referencing `header`.
    pub fn refresh_title(&mut self, header: &HeaderId, title: &str) {
        for group in &mut self.groups {
            for operand in &mut group.operands {
                if operand.references(header) {
                    operand.display_title = title.to_string();
                }
            }
        }
    }
}
