use catalog_schema_engine::{HeaderId, Slot};
use std::collections::HashSet;
use std::time::Instant;
use uuid::Uuid;

use super::highlight::Highlights;
use super::prompt::DeletePrompt;
use crate::error::{Result, SchemaError};
use crate::header::{BaseColumn, Header};
use crate::registry::Registry;
use crate::settings::Settings;

/// The slot currently waiting for a column pick.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionState {
    pub target: HeaderId,
    pub slot: Slot,
    /// Id of the operand at `slot`; survives index shifts caused by cascades.
    pub operand_id: Uuid,
    /// The target itself plus every column already used elsewhere in its formula.
    pub excluded: HashSet<HeaderId>,
}

impl SelectionState {
    pub fn for_slot(header: &Header, slot: Slot) -> Option<SelectionState> {
        let operand = header.formula.operand(slot)?;
        let mut excluded = header.formula.references_except(slot);
        excluded.insert(header.id.clone());
        Some(SelectionState {
            target: header.id.clone(),
            slot,
            operand_id: operand.id,
            excluded,
        })
    }

    pub fn is_excluded(&self, id: &HeaderId) -> bool {
        self.excluded.contains(id)
    }
}

/// Snapshot of a header taken when editing its formula began.
#[derive(Clone, Debug, PartialEq)]
pub struct EditBackup {
    pub header_id: HeaderId,
    pub snapshot: Header,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Mode {
    #[default]
    Idle,
    Selecting(SelectionState),
}

/// Interactive schema editor: the registry plus the single selection slot
/// and edit backup driven by user interactions.
#[derive(Clone, Debug)]
pub struct Editor {
    pub(crate) registry: Registry,
    pub(crate) mode: Mode,
    pub(crate) backup: Option<EditBackup>,
    pub(crate) highlights: Highlights,
    pub(crate) settings: Settings,
}

impl Editor {
    /// Create an editor over the default registry.
    pub fn new(settings: Settings) -> Self {
        let registry = Registry::with_settings(&settings);
        Self::with_registry(registry, settings)
    }

    pub fn with_registry(registry: Registry, settings: Settings) -> Self {
        Editor {
            registry,
            mode: Mode::Idle,
            backup: None,
            highlights: Highlights::new(settings.highlight_duration()),
            settings,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn selection(&self) -> Option<&SelectionState> {
        match &self.mode {
            Mode::Selecting(state) => Some(state),
            Mode::Idle => None,
        }
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self.mode, Mode::Selecting(_))
    }

    pub fn backup(&self) -> Option<&EditBackup> {
        self.backup.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn highlights(&self) -> &Highlights {
        &self.highlights
    }

    /// Headers the user may pick for the current selection: selectable,
    /// not excluded and not closing a dependency loop. Empty while idle.
    pub fn eligible_candidates(&self) -> Vec<HeaderId> {
        let Some(state) = self.selection() else {
            return Vec::new();
        };
        self.registry
            .headers()
            .iter()
            .filter(|header| !state.is_excluded(&header.id))
            .filter(|header| header.is_selectable_as_operand())
            .filter(|header| {
                self.registry
                    .would_create_cycle(&state.target, &header.id)
                    .is_none()
            })
            .map(|header| header.id.clone())
            .collect()
    }

    /// Columns that should flash at `now`.
    pub fn flashing_columns(&self, now: Instant) -> Vec<HeaderId> {
        self.highlights.active(now)
    }

    /// Render a header's formula with the configured placeholder.
    pub fn format_expression(&self, id: &HeaderId) -> Option<String> {
        self.registry.format_expression(id, &self.settings.placeholder)
    }

    /// The confirmation to show before deleting the operand at `slot`.
    ///
    /// `None` when the slot is unfilled: only filled operands can be deleted.
    pub fn delete_prompt(&self, id: &HeaderId, slot: Slot) -> Result<Option<DeletePrompt>> {
        let header = self
            .registry
            .get(id)
            .ok_or_else(|| SchemaError::UnknownHeader(id.clone()))?;
        let header_title = header.display_title(self.registry.fallback_title());
        let formula = &header.formula;
        let operand = formula.operand(slot).ok_or_else(|| SchemaError::InvalidSlot {
            header: header_title.clone(),
            slot,
        })?;
        if !operand.is_filled() {
            return Ok(None);
        }

        let placeholder = self.settings.placeholder.as_str();
        let title_or_placeholder = |title: &str| {
            if title.trim().is_empty() {
                placeholder.to_string()
            } else {
                title.to_string()
            }
        };
        let group = &formula.groups[slot.group];

        if formula.groups.len() == 1 && group.operands.len() <= 2 {
            let title_at = |index: usize| {
                group
                    .operands
                    .get(index)
                    .map(|operand| title_or_placeholder(&operand.display_title))
                    .unwrap_or_else(|| placeholder.to_string())
            };
            return Ok(Some(DeletePrompt::WholeFormula {
                header: header_title,
                first: title_at(0),
                operator: group.operator,
                second: title_at(1),
            }));
        }

        let mut after = formula.clone();
        after.remove_operand(slot);
        let after = catalog_schema_engine::format_expression(&after, placeholder);

        Ok(Some(DeletePrompt::Partial {
            header: header_title,
            operand: title_or_placeholder(&operand.display_title),
            operator: group.operator,
            before: catalog_schema_engine::format_expression(formula, placeholder),
            after: if after.is_empty() {
                placeholder.to_string()
            } else {
                after
            },
        }))
    }

    // Registry mutations routed through the editor so the selection and the
    // backup stay consistent with the headers they point at.

    pub fn add_built_in(&mut self, base: BaseColumn) -> Result<HeaderId> {
        let id = self.registry.add_built_in(base)?;
        self.resync_selection();
        Ok(id)
    }

    pub fn add_custom(&mut self) -> HeaderId {
        self.registry.add_custom()
    }

    /// Remove a column. A selection on it is cancelled first, so the column
    /// leaves (and may later be restored) in its pre-edit state; a selection
    /// elsewhere is re-pointed at its operand after the cascade shifted
    /// indices.
    pub fn remove_header(&mut self, id: &HeaderId) -> Result<Header> {
        let header = self
            .registry
            .get(id)
            .ok_or_else(|| SchemaError::UnknownHeader(id.clone()))?;
        if !header.is_removable() {
            return Err(SchemaError::NotRemovable(
                header.display_title(self.registry.fallback_title()),
            ));
        }
        if self.selection().is_some_and(|state| &state.target == id) {
            self.cancel();
        }
        let removed = self.registry.remove(id)?;

        if self.backup.as_ref().is_some_and(|backup| &backup.header_id == id) {
            self.backup = None;
        } else if let Some(backup) = &mut self.backup {
            backup.snapshot.formula.prune_reference(id);
        }
        self.resync_selection();
        Ok(removed)
    }

    pub fn restore_removed_custom(&mut self, id: &HeaderId) -> Result<()> {
        self.registry.restore_removed_custom(id)
    }

    pub fn discard_removed_custom(&mut self, id: &HeaderId) -> Result<()> {
        self.registry.discard_removed_custom(id)
    }

    pub fn reorder(&mut self, ordered_ids: &[HeaderId]) {
        self.registry.reorder(ordered_ids);
    }

    pub fn set_title(&mut self, id: &HeaderId, title: &str) -> Result<()> {
        self.registry.set_title(id, title)?;
        let display = self.registry.title_of(id);
        if let Some(backup) = &mut self.backup {
            backup.snapshot.formula.refresh_title(id, &display);
        }
        Ok(())
    }

    pub fn answer_quantity_question(&mut self, id: &HeaderId, is_quantity: bool) -> Result<()> {
        self.registry.answer_quantity_question(id, is_quantity)
    }

    /// Recompute the selection after the registry changed underneath it.
    pub(crate) fn resync_selection(&mut self) {
        let Mode::Selecting(state) = &self.mode else {
            return;
        };
        let target = state.target.clone();
        let refreshed = self.registry.get(&target).and_then(|header| {
            let slot = header.formula.slot_of(state.operand_id)?;
            SelectionState::for_slot(header, slot)
        });

        match refreshed {
            Some(state) => self.mode = Mode::Selecting(state),
            None => {
                tracing::debug!(header = %target, "selection target gone, leaving selection");
                if let Some(header) = self.registry.headers.iter_mut().find(|h| h.id == target) {
                    header.formula.strip_unfilled();
                }
                self.mode = Mode::Idle;
                self.backup = None;
            }
        }
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_schema_engine::Operator;
    use pretty_assertions::assert_eq;

    fn custom_quantity(editor: &mut Editor, title: &str) -> HeaderId {
        let id = editor.add_custom();
        editor.set_title(&id, title).unwrap();
        editor.answer_quantity_question(&id, true).unwrap();
        id
    }

    #[test]
    fn test_selection_excludes_target_and_other_operands() {
        let registry = Registry::new();
        let total = registry.base_header(BaseColumn::Total).unwrap();
        let state = SelectionState::for_slot(total, Slot::new(0, 1)).unwrap();

        assert!(state.is_excluded(&total.id));
        assert!(state.is_excluded(&BaseColumn::Quantity.header_id()));
        assert!(!state.is_excluded(&BaseColumn::UnitCost.header_id()));
        assert!(SelectionState::for_slot(total, Slot::new(3, 0)).is_none());
    }

    #[test]
    fn test_delete_prompt_whole_formula() {
        let editor = Editor::default();
        let prompt = editor
            .delete_prompt(&BaseColumn::Total.header_id(), Slot::new(0, 1))
            .unwrap()
            .unwrap();
        assert_eq!(
            prompt,
            DeletePrompt::WholeFormula {
                header: "Total".into(),
                first: "Quantity".into(),
                operator: Operator::Multiply,
                second: "Unit Cost".into(),
            }
        );
    }

    #[test]
    fn test_delete_prompt_partial_and_unfilled() {
        let mut editor = Editor::default();
        let total = BaseColumn::Total.header_id();
        let flete = custom_quantity(&mut editor, "Flete");
        editor.registry.start_formula(&total, Operator::Divide).unwrap();

        assert_eq!(editor.delete_prompt(&total, Slot::new(1, 0)).unwrap(), None);

        editor
            .registry
            .update(&total, |h| {
                let operand = h.formula.operand_mut(Slot::new(1, 0)).unwrap();
                operand.header_ref = Some(flete.clone());
                operand.display_title = "Flete".into();
                Ok(())
            })
            .unwrap();
        let prompt = editor.delete_prompt(&total, Slot::new(0, 0)).unwrap().unwrap();
        assert_eq!(
            prompt,
            DeletePrompt::Partial {
                header: "Total".into(),
                operand: "Quantity".into(),
                operator: Operator::Multiply,
                before: "Quantity × Unit Cost ÷ Flete".into(),
                after: "Unit Cost ÷ Flete".into(),
            }
        );
    }

    #[test]
    fn test_eligible_candidates_idle_is_empty() {
        let editor = Editor::default();
        assert!(editor.eligible_candidates().is_empty());
    }
}
