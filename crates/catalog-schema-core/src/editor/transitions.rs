//! The selection state machine.
//!
//! Every user interaction becomes one [`Event`] fed to [`Editor::apply`].
//! A transition either completes fully or returns an error without touching
//! any state; `&mut self` makes each one atomic with respect to the single
//! selection slot.

use catalog_schema_engine::{HeaderId, Operator, Slot};
use std::time::Instant;

use super::prompt::DeletePrompt;
use super::state::{EditBackup, Editor, Mode, SelectionState};
use crate::error::{Result, SchemaError};

/// A user interaction with the formula editor.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// "Add calculation" on a header.
    StartFormula { header: HeaderId, operator: Operator },
    /// Single activation of an operand: edit if unfilled, flash if filled.
    ActivateOperand { header: HeaderId, slot: Slot },
    /// Double activation of an operand: clear it and pick a replacement.
    ReplaceOperand { header: HeaderId, slot: Slot },
    /// A column was chosen for the current selection.
    Pick(HeaderId),
    Cancel,
    /// An interaction outside the selectable columns.
    OutsideInteraction,
    /// Context-menu delete of a filled operand, with the user's answer to
    /// the confirmation prompt.
    DeleteOperand {
        header: HeaderId,
        slot: Slot,
        confirmed: bool,
    },
}

/// What a transition did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing changed.
    Ignored,
    /// A calculation step was added; selection waits at the slot.
    FormulaStarted(Slot),
    /// Selection waits at the slot.
    Selecting(Slot),
    /// The last unfilled slot was filled; the edit is final.
    Committed,
    Cancelled,
    Highlighted(HeaderId),
    OperandDeleted { cleared: bool },
}

impl Editor {
    pub fn apply(&mut self, event: Event) -> Result<Outcome> {
        self.apply_at(event, Instant::now())
    }

    /// Apply an event with an explicit clock for highlight timing.
    pub fn apply_at(&mut self, event: Event, now: Instant) -> Result<Outcome> {
        self.highlights.prune(now);
        let outcome = match event {
            Event::StartFormula { header, operator } => self.start_formula(&header, operator)?,
            Event::ActivateOperand { header, slot } => self.activate_operand(&header, slot, now)?,
            Event::ReplaceOperand { header, slot } => self.replace_operand(&header, slot, now)?,
            Event::Pick(candidate) => self.pick(&candidate)?,
            Event::Cancel => self.cancel(),
            Event::OutsideInteraction => self.outside_interaction(),
            Event::DeleteOperand {
                header,
                slot,
                confirmed,
            } => self.delete_confirmed(&header, slot, confirmed)?,
        };
        tracing::debug!(?outcome, "editor transition");
        Ok(outcome)
    }

    /// Delete an operand, asking `confirm` first.
    pub fn delete_operand<F>(&mut self, id: &HeaderId, slot: Slot, confirm: F) -> Result<Outcome>
    where
        F: FnOnce(&DeletePrompt) -> bool,
    {
        let Some(prompt) = self.delete_prompt(id, slot)? else {
            return Ok(Outcome::Ignored);
        };
        let confirmed = confirm(&prompt);
        self.apply(Event::DeleteOperand {
            header: id.clone(),
            slot,
            confirmed,
        })
    }

    fn target(&self) -> Option<&HeaderId> {
        self.selection().map(|state| &state.target)
    }

    /// Leave a selection on another header before working on `id`.
    fn leave_other_selection(&mut self, id: &HeaderId) {
        if self.target().is_some_and(|target| target != id) {
            self.cancel();
        }
    }

    /// Take the edit backup for `id` unless one is already held for it.
    fn ensure_backup(&mut self, id: &HeaderId) -> Result<()> {
        if self.backup.as_ref().is_some_and(|backup| &backup.header_id == id) {
            return Ok(());
        }
        let snapshot = self
            .registry
            .get(id)
            .ok_or_else(|| SchemaError::UnknownHeader(id.clone()))?
            .clone();
        self.backup = Some(EditBackup {
            header_id: id.clone(),
            snapshot,
        });
        Ok(())
    }

    fn enter_selecting(&mut self, id: &HeaderId, slot: Slot) -> Result<()> {
        let header = self
            .registry
            .get(id)
            .ok_or_else(|| SchemaError::UnknownHeader(id.clone()))?;
        let state = SelectionState::for_slot(header, slot).ok_or_else(|| SchemaError::InvalidSlot {
            header: header.display_title(self.registry.fallback_title()),
            slot,
        })?;
        tracing::debug!(header = %id, %slot, excluded = state.excluded.len(), "selecting");
        self.mode = Mode::Selecting(state);
        Ok(())
    }

    fn start_formula(&mut self, id: &HeaderId, operator: Operator) -> Result<Outcome> {
        if self.target() == Some(id) {
            return Ok(Outcome::Ignored);
        }
        self.registry.ensure_calculation(id)?;
        self.leave_other_selection(id);
        self.ensure_backup(id)?;

        let slot = self.registry.start_formula(id, operator)?;
        self.enter_selecting(id, slot)?;
        Ok(Outcome::FormulaStarted(slot))
    }

    fn activate_operand(&mut self, id: &HeaderId, slot: Slot, now: Instant) -> Result<Outcome> {
        let operand = self.operand_at(id, slot)?;
        if let Some(reference) = operand.header_ref.clone() {
            tracing::debug!(header = %reference, "flashing referenced column");
            self.highlights.flash(reference.clone(), now);
            return Ok(Outcome::Highlighted(reference));
        }
        if self.selection().is_some_and(|state| &state.target == id && state.slot == slot) {
            return Ok(Outcome::Ignored);
        }

        self.leave_other_selection(id);
        self.ensure_backup(id)?;
        self.enter_selecting(id, slot)?;
        Ok(Outcome::Selecting(slot))
    }

    fn replace_operand(&mut self, id: &HeaderId, slot: Slot, now: Instant) -> Result<Outcome> {
        let filled = self.operand_at(id, slot)?.is_filled();
        if !filled {
            return self.activate_operand(id, slot, now);
        }

        self.leave_other_selection(id);
        self.ensure_backup(id)?;
        self.registry.update(id, |header| {
            if let Some(operand) = header.formula.operand_mut(slot) {
                operand.clear();
            }
            Ok(())
        })?;
        self.enter_selecting(id, slot)?;
        Ok(Outcome::Selecting(slot))
    }

    fn pick(&mut self, candidate: &HeaderId) -> Result<Outcome> {
        let Some(state) = self.selection().cloned() else {
            return Ok(Outcome::Ignored);
        };
        let fallback = self.registry.fallback_title().to_string();
        let picked = self
            .registry
            .get(candidate)
            .ok_or_else(|| SchemaError::UnknownHeader(candidate.clone()))?;
        let title = picked.display_title(&fallback);
        let kind = picked.column_kind();

        if state.is_excluded(candidate) {
            tracing::warn!(
                header = %state.target,
                candidate = %candidate,
                "rejected excluded operand"
            );
            return Err(SchemaError::OperandExcluded {
                candidate: title,
                target: self.registry.title_of(&state.target),
            });
        }
        if !picked.is_selectable_as_operand() {
            tracing::warn!(candidate = %candidate, "rejected non-selectable operand");
            return Err(SchemaError::NotSelectable(title));
        }
        if let Some(path) = self.registry.would_create_cycle(&state.target, candidate) {
            tracing::warn!(
                header = %state.target,
                candidate = %candidate,
                "rejected circular operand"
            );
            return Err(SchemaError::CircularDependency {
                path: path.iter().map(|id| self.registry.title_of(id)).collect(),
            });
        }

        let target_title = self.registry.title_of(&state.target);
        let next = self.registry.update(&state.target, |header| {
            let operand = header
                .formula
                .operand_mut(state.slot)
                .ok_or(SchemaError::InvalidSlot {
                    header: target_title,
                    slot: state.slot,
                })?;
            operand.header_ref = Some(candidate.clone());
            operand.display_title = title;
            operand.kind = kind;
            Ok(header.formula.next_unfilled_after(state.slot))
        })?;
        tracing::debug!(
            header = %state.target,
            slot = %state.slot,
            operand = %candidate,
            "filled operand"
        );

        match next {
            Some(slot) => {
                self.enter_selecting(&state.target, slot)?;
                Ok(Outcome::Selecting(slot))
            }
            None => {
                self.mode = Mode::Idle;
                self.backup = None;
                tracing::debug!(header = %state.target, "formula edit committed");
                Ok(Outcome::Committed)
            }
        }
    }

    /// Abort the current selection.
    ///
    /// The target is restored from its backup (keeping its current title and
    /// position); without a backup its unfilled operands are stripped.
    pub(super) fn cancel(&mut self) -> Outcome {
        let Mode::Selecting(state) = std::mem::take(&mut self.mode) else {
            return Outcome::Ignored;
        };
        let backup = self.backup.take();
        let target = state.target;

        let restored = match backup {
            Some(backup) if backup.header_id == target => {
                self.registry.update(&target, |header| {
                    let mut snapshot = backup.snapshot;
                    snapshot.title = std::mem::take(&mut header.title);
                    snapshot.order = header.order;
                    *header = snapshot;
                    Ok(())
                })
            }
            _ => self.registry.update(&target, |header| {
                header.formula.strip_unfilled();
                Ok(())
            }),
        };
        if let Err(err) = restored {
            tracing::warn!(header = %target, %err, "cancel found no header to restore");
        }

        self.highlights.clear();
        tracing::debug!(header = %target, "selection cancelled");
        Outcome::Cancelled
    }

    /// Ignored while the target still has an unfilled operand.
    fn outside_interaction(&mut self) -> Outcome {
        let Some(target) = self.target() else {
            return Outcome::Ignored;
        };
        let pending = self
            .registry
            .get(target)
            .is_some_and(|header| header.formula.has_unfilled());
        if pending {
            tracing::debug!(header = %target, "outside interaction ignored, formula incomplete");
            return Outcome::Ignored;
        }
        self.cancel()
    }

    fn delete_confirmed(&mut self, id: &HeaderId, slot: Slot, confirmed: bool) -> Result<Outcome> {
        let Some(prompt) = self.delete_prompt(id, slot)? else {
            return Ok(Outcome::Ignored);
        };
        if !confirmed {
            return Ok(Outcome::Ignored);
        }

        let cleared = prompt.clears_formula();
        if cleared {
            self.registry.clear_formula(id)?;
        } else {
            self.registry.remove_operand(id, slot)?;
        }

        let editing = self.target() == Some(id)
            || self.backup.as_ref().is_some_and(|backup| &backup.header_id == id);
        if editing {
            if self.target() == Some(id) {
                self.mode = Mode::Idle;
            }
            self.backup = None;
            self.registry.update(id, |header| {
                header.formula.strip_unfilled();
                Ok(())
            })?;
        }
        tracing::debug!(header = %id, %slot, cleared, "deleted operand");
        Ok(Outcome::OperandDeleted { cleared })
    }

    fn operand_at(&self, id: &HeaderId, slot: Slot) -> Result<&catalog_schema_engine::Operand> {
        let header = self
            .registry
            .get(id)
            .ok_or_else(|| SchemaError::UnknownHeader(id.clone()))?;
        header.formula.operand(slot).ok_or_else(|| SchemaError::InvalidSlot {
            header: header.display_title(self.registry.fallback_title()),
            slot,
        })
    }
}
