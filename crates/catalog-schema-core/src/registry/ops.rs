use catalog_schema_engine::{ColumnKind, HeaderId, Operand, OperandGroup, Operator};
use std::collections::HashMap;

use super::Registry;
use crate::error::{Result, SchemaError};
use crate::header::{BaseColumn, Header, TOTAL_ORDER};

impl Registry {
    /// Optional built-in columns not currently in the registry.
    pub fn available_base_columns(&self) -> Vec<BaseColumn> {
        BaseColumn::ALL
            .into_iter()
            .filter(|base| base.is_optional() && self.base_header(*base).is_none())
            .collect()
    }

    /// Custom headers parked by `remove`, oldest first.
    pub fn removed_customs(&self) -> &[Header] {
        &self.removed
    }

    /// Whether anything can be brought back (optional built-ins or parked customs).
    pub fn has_restorable_columns(&self) -> bool {
        !self.available_base_columns().is_empty() || !self.removed.is_empty()
    }

    /// Add a built-in column.
    ///
    /// Adding Quantity folds it into Total's formula instead of creating a
    /// second formula: appended to the first group, or as the default
    /// `Quantity × Unit Cost` when Total has no formula.
    pub fn add_built_in(&mut self, base: BaseColumn) -> Result<HeaderId> {
        if self.base_header(base).is_some() {
            return Err(SchemaError::HeaderExists(base.label().to_string()));
        }

        let header = Header::built_in(base);
        let id = header.id.clone();
        self.headers.push(header);

        if base == BaseColumn::Quantity {
            self.fold_quantity_into_total(&id);
        }

        self.normalize();
        tracing::debug!(header = %id, "added built-in column");
        Ok(id)
    }

    fn fold_quantity_into_total(&mut self, quantity: &HeaderId) {
        let quantity_operand = || {
            Operand::filled(
                quantity.clone(),
                BaseColumn::Quantity.label(),
                ColumnKind::Base,
            )
        };
        let Some(total) = self
            .headers
            .iter_mut()
            .find(|header| header.is_base(BaseColumn::Total))
        else {
            return;
        };

        if total.formula.references_header(quantity) {
            return;
        }

        match total.formula.groups.first_mut() {
            Some(group) => group.operands.push(quantity_operand()),
            None => total.formula.groups.push(OperandGroup::new(
                Operator::Multiply,
                vec![
                    quantity_operand(),
                    Operand::filled(
                        BaseColumn::UnitCost.header_id(),
                        BaseColumn::UnitCost.label(),
                        ColumnKind::Base,
                    ),
                ],
            )),
        }
    }

    /// Add a blank custom column after the last editable column, pushing
    /// Unit Cost behind it.
    pub fn add_custom(&mut self) -> HeaderId {
        let max_base_before_unit_cost = self
            .headers
            .iter()
            .filter(|header| {
                header.base_column.is_some()
                    && !header.is_base(BaseColumn::UnitCost)
                    && !header.is_base(BaseColumn::Total)
            })
            .map(|header| header.order)
            .max()
            .unwrap_or(0);
        let max_custom = self
            .headers
            .iter()
            .filter(|header| !header.is_base_header)
            .map(|header| header.order)
            .max()
            .unwrap_or(0);
        let next_order = max_base_before_unit_cost.max(max_custom) + 1;

        for header in &mut self.headers {
            if header.is_base(BaseColumn::UnitCost) && header.order <= next_order {
                header.order = next_order + 1;
            }
        }

        let header = Header::custom(next_order);
        let id = header.id.clone();
        self.headers.push(header);
        self.normalize();
        tracing::debug!(header = %id, order = next_order, "added custom column");
        id
    }

    /// Remove a column and every operand referencing it.
    ///
    /// Groups left empty are dropped. A custom column with a title or a
    /// formula is parked, without its unfilled operands, so it can be
    /// restored later. Returns the removed header as parked.
    pub fn remove(&mut self, id: &HeaderId) -> Result<Header> {
        let header = self.require(id)?;
        if !header.is_removable() {
            return Err(SchemaError::NotRemovable(
                header.display_title(&self.fallback_title),
            ));
        }

        let position = self
            .headers
            .iter()
            .position(|header| &header.id == id)
            .ok_or_else(|| SchemaError::UnknownHeader(id.clone()))?;
        let mut removed = self.headers.remove(position);
        removed.formula.strip_unfilled();

        for header in &mut self.headers {
            let pruned = header.formula.prune_reference(id);
            if pruned > 0 {
                tracing::debug!(header = %header.id, removed = %id, pruned, "pruned operands");
            }
        }

        if !removed.is_base_header
            && (!removed.title.trim().is_empty() || !removed.formula.is_empty())
        {
            self.removed.retain(|parked| parked.id != removed.id);
            self.removed.push(removed.clone());
        }

        self.normalize();
        tracing::debug!(header = %id, "removed column");
        Ok(removed)
    }

    /// Bring a parked custom column back.
    ///
    /// References to columns removed since it was parked are dropped.
    pub fn restore_removed_custom(&mut self, id: &HeaderId) -> Result<()> {
        let position = self
            .removed
            .iter()
            .position(|header| &header.id == id)
            .ok_or_else(|| SchemaError::UnknownHeader(id.clone()))?;
        let mut header = self.removed.remove(position);

        let dangling = header.formula.retain_operands(|operand| match &operand.header_ref {
            Some(reference) => self.headers.iter().any(|h| &h.id == reference),
            None => true,
        });
        if dangling > 0 {
            tracing::warn!(header = %id, dangling, "dropped references to removed columns");
        }

        self.headers.push(header);
        self.normalize();
        tracing::debug!(header = %id, "restored custom column");
        Ok(())
    }

    /// Forget a parked custom column for good.
    pub fn discard_removed_custom(&mut self, id: &HeaderId) -> Result<()> {
        let before = self.removed.len();
        self.removed.retain(|header| &header.id != id);
        if self.removed.len() == before {
            return Err(SchemaError::UnknownHeader(id.clone()));
        }
        Ok(())
    }

    /// Reorder the editable columns.
    ///
    /// Detail stays first, the requested ids follow in sequence, then any
    /// unlisted editable and non-editable columns in their previous relative
    /// order, then Unit Cost. Total stays at the end.
    pub fn reorder(&mut self, ordered_ids: &[HeaderId]) {
        if ordered_ids.is_empty() {
            return;
        }

        let mut assigned: HashMap<HeaderId, u32> = HashMap::new();
        let mut cursor = 1;
        let mut assign = |id: &HeaderId, assigned: &mut HashMap<HeaderId, u32>| {
            if !assigned.contains_key(id) {
                assigned.insert(id.clone(), cursor);
                cursor += 1;
            }
        };

        if let Some(detail) = self.base_header(BaseColumn::Detail) {
            assign(&detail.id, &mut assigned);
        }

        for id in ordered_ids {
            if self.get(id).is_some_and(|header| !header.is_pinned()) {
                assign(id, &mut assigned);
            }
        }

        // `headers` is already sorted, so filtering preserves prior relative order.
        for editable in [true, false] {
            for header in &self.headers {
                if header.is_editable == editable && !header.is_pinned() {
                    assign(&header.id, &mut assigned);
                }
            }
        }

        if let Some(unit_cost) = self.base_header(BaseColumn::UnitCost) {
            assign(&unit_cost.id, &mut assigned);
        }

        for header in &mut self.headers {
            if header.is_base(BaseColumn::Total) {
                header.order = TOTAL_ORDER;
            } else if let Some(order) = assigned.get(&header.id) {
                header.order = *order;
            }
        }

        self.normalize();
        tracing::debug!(count = ordered_ids.len(), "reordered columns");
    }

    /// Rename an editable column and refresh the cached title in every
    /// operand referencing it.
    pub fn set_title(&mut self, id: &HeaderId, title: &str) -> Result<()> {
        let fallback = self.fallback_title.clone();
        let display = self.update(id, |header| {
            if !header.is_editable {
                return Err(SchemaError::NotEditable(header.display_title(&fallback)));
            }
            header.title = title.to_string();
            Ok(header.display_title(&fallback))
        })?;

        for header in &mut self.headers {
            header.formula.refresh_title(id, &display);
        }
        for header in &mut self.removed {
            header.formula.refresh_title(id, &display);
        }
        Ok(())
    }

    /// Record the answer to "is this column a quantity?".
    pub fn answer_quantity_question(&mut self, id: &HeaderId, is_quantity: bool) -> Result<()> {
        self.update(id, |header| {
            header.is_quantity = is_quantity;
            header.is_quantity_resolved = true;
            header.pending_quantity_question = false;
            Ok(())
        })?;
        tracing::debug!(header = %id, is_quantity, "answered quantity question");
        Ok(())
    }
}
