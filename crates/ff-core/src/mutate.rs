//! Tree mutator: every structural and field edit of a `FormDocument`.
//!
//! Each operation checks its preconditions before the first write, so an
//! `Err` leaves the document untouched. Structural operations move a
//! component together with its Actions bundle and renumber bundle drivers
//! when they are done.

use crate::document::{FormDocument, Slot};
use crate::error::FormError;
use crate::factory::{create_component, dedupe_option_values, empty_columns};
use crate::formula;
use crate::key::ComponentKey;
use crate::locate::{self, ComponentPath};
use crate::model::*;
use std::collections::HashSet;

/// Resolved destination of an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    List {
        parent: Option<ComponentKey>,
        column: Option<usize>,
    },
    /// A full-but-growable columns wrapper: add a column, then fill it.
    NewColumn(ComponentKey),
}

impl FormDocument {
    // ─── Create / insert ─────────────────────────────────────────────────

    /// Build a component with the factory and append it to `parent`
    /// (`None` = root). A columns parent takes it in its first empty
    /// column, growing the row if needed.
    pub fn create(
        &mut self,
        ty: ComponentType,
        label: &str,
        options: &[String],
        hide_label: bool,
        parent: Option<ComponentKey>,
    ) -> Result<ComponentKey, FormError> {
        let target = self.plan_target(parent)?;
        let component = create_component(ty, label, options, hide_label, &mut self.registry);
        let key = component.key;
        self.append_to(target, vec![component])?;
        log::debug!("create: `{key}` in {}", describe(parent));
        Ok(key)
    }

    /// Insert an externally built component at `index` of a list. Its keys
    /// are registered first; colliding keys are replaced.
    pub fn insert(
        &mut self,
        parent: Option<ComponentKey>,
        column: Option<usize>,
        index: usize,
        mut component: Component,
    ) -> Result<ComponentKey, FormError> {
        let len = self.child_list(parent, column)?.len();
        if index > len {
            return Err(FormError::IndexOutOfRange { index, len });
        }
        self.adopt(&mut component);
        let key = component.key;
        self.place(parent, column, index, vec![component])?;
        self.compact_bundles();
        Ok(key)
    }

    // ─── Delete ──────────────────────────────────────────────────────────

    pub fn delete(&mut self, path: &ComponentPath) -> Result<Vec<Component>, FormError> {
        let key = self.key_at(path)?;
        self.delete_by_key(key)
    }

    /// Remove `key` and return what was removed.
    ///
    /// An owner goes with its whole bundle. Deleting a driver switches the
    /// owner's actions off; deleting a follower drops just that follower.
    /// A columns wrapper left with nothing in any column is deleted too.
    pub fn delete_by_key(&mut self, key: ComponentKey) -> Result<Vec<Component>, FormError> {
        let Some(source) = self.slot_of(key) else {
            return Err(FormError::not_found(key));
        };

        let removed = if let Some(owner) = self.bundles.owner_of_driver(key) {
            let members = self.bundles.members(owner);
            self.bundles.remove(owner);
            members
                .into_iter()
                .filter_map(|k| self.detach(k))
                .collect()
        } else if self.bundles.is_member(key) {
            self.bundles.remove_follower(key);
            self.detach(key).into_iter().collect()
        } else {
            let (_, unit) = self.take_unit(key)?;
            let mut gone = HashSet::new();
            locate::walk(&unit, &mut |_, c| {
                gone.insert(c.key);
            });
            self.bundles.retain_live(&|k| !gone.contains(&k));
            unit
        };

        log::debug!("delete: `{key}` ({} removed)", removed.len());
        self.drop_hollow_wrappers(source);
        self.compact_bundles();
        Ok(removed)
    }

    // ─── Move ────────────────────────────────────────────────────────────

    pub fn move_to(
        &mut self,
        path: &ComponentPath,
        target: Option<ComponentKey>,
    ) -> Result<(), FormError> {
        let key = self.key_at(path)?;
        self.move_key_to(key, target)
    }

    /// Append `key` (with its bundle) to `target`. Bundle members move
    /// their owner instead. A columns wrapper the move leaves empty is
    /// deleted.
    pub fn move_key_to(
        &mut self,
        key: ComponentKey,
        target: Option<ComponentKey>,
    ) -> Result<(), FormError> {
        let owner = self.unit_owner(key);
        if !self.contains(owner) {
            return Err(FormError::not_found(key));
        }
        if let Some(t) = target {
            if self.unit_keys(owner).contains(&t)
                || locate::is_descendant(&self.components, owner, t)
            {
                return Err(FormError::Cycle(owner.to_string()));
            }
        }
        let plan = self.plan_target(target)?;
        let (source, unit) = self.take_unit(owner)?;
        self.append_to(plan, unit)?;
        self.drop_hollow_wrappers(source);
        log::debug!("move: `{owner}` → {}", describe(target));
        self.compact_bundles();
        Ok(())
    }

    /// Move a unit within its sibling list. Indices count units, so an
    /// owner and its bundle occupy one position.
    pub fn reorder(
        &mut self,
        parent: Option<ComponentKey>,
        old_index: usize,
        new_index: usize,
    ) -> Result<(), FormError> {
        let groups = self.unit_groups(self.child_list(parent, None)?);
        let len = groups.len();
        for index in [old_index, new_index] {
            if index >= len {
                return Err(FormError::IndexOutOfRange { index, len });
            }
        }
        if old_index == new_index {
            return Ok(());
        }

        let list = self.child_list_mut(parent, None)?;
        let mut slots: Vec<Option<Component>> = list.drain(..).map(Some).collect();
        let mut units: Vec<Vec<Component>> = groups
            .iter()
            .map(|g| g.iter().filter_map(|&i| slots[i].take()).collect())
            .collect();
        let moving = units.remove(old_index);
        units.insert(new_index, moving);
        *list = units.into_iter().flatten().collect();

        log::debug!("reorder: {} {old_index} → {new_index}", describe(parent));
        self.compact_bundles();
        Ok(())
    }

    /// The units of a container's list in display order, each named by its
    /// owner; bundle members are folded into their owner.
    pub fn units_in(&self, parent: Option<ComponentKey>) -> Result<Vec<ComponentKey>, FormError> {
        let list = self.child_list(parent, None)?;
        Ok(self
            .unit_groups(list)
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|&i| list[i].key)
                    .find(|k| !self.bundles.is_member(*k))
                    .unwrap_or(list[group[0]].key)
            })
            .collect())
    }

    /// Indices of `list` grouped by unit, in list order.
    fn unit_groups(&self, list: &[Component]) -> Vec<Vec<usize>> {
        let mut groups: Vec<(ComponentKey, Vec<usize>)> = Vec::new();
        for (i, c) in list.iter().enumerate() {
            let owner = self
                .bundles
                .owner_of_member(c.key)
                .filter(|o| list.iter().any(|x| x.key == *o));
            match owner.and_then(|o| groups.iter().position(|(k, _)| *k == o)) {
                Some(g) => groups[g].1.push(i),
                None => groups.push((c.key, vec![i])),
            }
        }
        groups.into_iter().map(|(_, g)| g).collect()
    }

    // ─── Columns ─────────────────────────────────────────────────────────

    /// Replace the component at `path` with a fresh `columns` wrapper of
    /// `count` equal columns; the component (and its bundle) fills column 0.
    pub fn wrap_in_columns(
        &mut self,
        path: &ComponentPath,
        count: usize,
    ) -> Result<ComponentKey, FormError> {
        if !(2..=3).contains(&count) {
            return Err(FormError::ColumnCount(count));
        }
        let owner = self.unit_owner(self.key_at(path)?);
        let (slot, unit) = self.take_unit(owner)?;

        let mut wrapper = create_component(
            ComponentType::Columns,
            "Columns",
            &[],
            false,
            &mut self.registry,
        );
        let mut columns = empty_columns(count);
        columns[0].components = unit;
        wrapper.kind = ComponentKind::Columns { columns };
        let key = wrapper.key;

        self.place(slot.parent, slot.column, slot.index, vec![wrapper])?;
        log::debug!("wrap: `{owner}` in `{key}` ({count} columns)");
        self.compact_bundles();
        Ok(key)
    }

    /// Make `key` the sole occupant of `column` of `wrapper`.
    ///
    /// The component is taken from wherever it lives; when it is not in the
    /// tree, `fallback` is adopted instead (a palette drop). Previous
    /// occupants are re-homed right after the wrapper, in order, and their
    /// keys returned.
    pub fn move_into_column(
        &mut self,
        key: ComponentKey,
        wrapper: ComponentKey,
        column: usize,
        fallback: Option<Component>,
    ) -> Result<Vec<ComponentKey>, FormError> {
        let occupants: Vec<ComponentKey> = self
            .column_ref(wrapper, column)?
            .components
            .iter()
            .map(|c| c.key)
            .collect();

        let owner = self.unit_owner(key);
        let mut source = None;
        let unit = if self.contains(owner) {
            if owner == wrapper || locate::is_descendant(&self.components, owner, wrapper) {
                return Err(FormError::Cycle(owner.to_string()));
            }
            if occupants == self.unit_keys(owner) {
                return Ok(Vec::new());
            }
            let (slot, unit) = self.take_unit(owner)?;
            source = Some(slot);
            unit
        } else if let Some(mut component) = fallback {
            self.adopt(&mut component);
            vec![component]
        } else {
            return Err(FormError::not_found(key));
        };

        let displaced = {
            let slot = self.column_mut(wrapper, column)?;
            std::mem::replace(&mut slot.components, unit)
        };
        let displaced_keys: Vec<ComponentKey> = displaced.iter().map(|c| c.key).collect();
        if !displaced.is_empty() {
            let at = self
                .slot_of(wrapper)
                .ok_or_else(|| FormError::not_found(wrapper))?;
            self.place(at.parent, at.column, at.index + 1, displaced)?;
        }
        if let Some(source) = source {
            self.drop_hollow_wrappers(source);
        }

        log::debug!(
            "column: `{owner}` → `{wrapper}`[{column}], displaced {}",
            displaced_keys.len()
        );
        self.compact_bundles();
        Ok(displaced_keys)
    }

    /// Drop empty columns and respread the widths. Returns how many
    /// columns remain; a wrapper left with fewer than two is the caller's
    /// to collapse (see [`tidy_columns`](Self::tidy_columns)).
    pub fn prune_empty_columns(&mut self, wrapper: ComponentKey) -> Result<usize, FormError> {
        let columns = self.columns_of_mut(wrapper)?;
        columns.retain(|c| !c.is_empty());
        normalize_widths(columns);
        Ok(columns.len())
    }

    /// Prune, then delete a wrapper with no columns left or collapse one
    /// with a single column.
    pub fn tidy_columns(&mut self, wrapper: ComponentKey) -> Result<(), FormError> {
        match self.prune_empty_columns(wrapper)? {
            0 => {
                self.detach(wrapper);
            }
            1 => {
                self.collapse_wrapper(wrapper)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Replace a wrapper with the contents of its columns, left to right.
    pub fn collapse_wrapper(&mut self, wrapper: ComponentKey) -> Result<(), FormError> {
        self.columns_of_mut(wrapper)?;
        let slot = self
            .slot_of(wrapper)
            .ok_or_else(|| FormError::not_found(wrapper))?;
        let Some(removed) = self.detach(wrapper) else {
            return Err(FormError::not_found(wrapper));
        };
        let contents: Vec<Component> = match removed.kind {
            ComponentKind::Columns { columns } => {
                columns.into_iter().flat_map(|c| c.components).collect()
            }
            _ => Vec::new(),
        };
        self.place(slot.parent, slot.column, slot.index, contents)?;
        log::debug!("collapse: `{wrapper}`");
        Ok(())
    }

    /// Empty one column slot and return its former occupants.
    ///
    /// With `prune_after` the wrapper is tidied right away. A wrapper whose
    /// columns are all empty is deleted either way.
    pub fn remove_from_column(
        &mut self,
        wrapper: ComponentKey,
        column: usize,
        prune_after: bool,
    ) -> Result<Vec<Component>, FormError> {
        let removed = std::mem::take(&mut self.column_mut(wrapper, column)?.components);
        let mut gone = HashSet::new();
        locate::walk(&removed, &mut |_, c| {
            gone.insert(c.key);
        });
        self.bundles.retain_live(&|k| !gone.contains(&k));

        let all_empty = self.columns_of_mut(wrapper)?.iter().all(Column::is_empty);
        if prune_after {
            self.tidy_columns(wrapper)?;
        } else if all_empty {
            self.detach(wrapper);
        }
        self.compact_bundles();
        Ok(removed)
    }

    /// Append an empty column. Returns its index.
    pub fn add_column(&mut self, wrapper: ComponentKey) -> Result<usize, FormError> {
        let columns = self.columns_of_mut(wrapper)?;
        if columns.len() >= MAX_COLUMNS {
            return Err(FormError::ColumnLimit { max: MAX_COLUMNS });
        }
        columns.push(Column::with_width(0));
        normalize_widths(columns);
        Ok(columns.len() - 1)
    }

    /// Move the contents of column `from` to the end of column `into` and
    /// drop `from`. A wrapper left with one column collapses.
    pub fn merge_columns(
        &mut self,
        wrapper: ComponentKey,
        from: usize,
        into: usize,
    ) -> Result<(), FormError> {
        let columns = self.columns_of_mut(wrapper)?;
        for index in [from, into] {
            if index >= columns.len() {
                return Err(FormError::ColumnIndex {
                    wrapper: wrapper.to_string(),
                    index,
                });
            }
        }
        if from == into {
            return Ok(());
        }
        let moved = std::mem::take(&mut columns[from].components);
        columns[into].components.extend(moved);
        columns.remove(from);
        normalize_widths(columns);
        if columns.len() < MIN_COLUMNS {
            self.collapse_wrapper(wrapper)?;
        }
        Ok(())
    }

    fn columns_of_mut(&mut self, wrapper: ComponentKey) -> Result<&mut Vec<Column>, FormError> {
        self.get_mut(wrapper)?
            .columns_mut()
            .ok_or_else(|| FormError::NotContainer(wrapper.to_string()))
    }

    fn column_ref(&self, wrapper: ComponentKey, column: usize) -> Result<&Column, FormError> {
        self.get(wrapper)?
            .columns()
            .ok_or_else(|| FormError::NotContainer(wrapper.to_string()))?
            .get(column)
            .ok_or_else(|| FormError::ColumnIndex {
                wrapper: wrapper.to_string(),
                index: column,
            })
    }

    fn column_mut(&mut self, wrapper: ComponentKey, column: usize) -> Result<&mut Column, FormError> {
        self.columns_of_mut(wrapper)?
            .get_mut(column)
            .ok_or_else(|| FormError::ColumnIndex {
                wrapper: wrapper.to_string(),
                index: column,
            })
    }

    /// Delete the wrapper `source` sat in if none of its columns hold
    /// anything now, and repeat for the slot that wrapper sat in.
    fn drop_hollow_wrappers(&mut self, source: Slot) {
        let mut slot = source;
        while let Slot {
            parent: Some(wrapper),
            column: Some(_),
            ..
        } = slot
        {
            let hollow = self
                .find(wrapper)
                .and_then(Component::columns)
                .is_some_and(|columns| columns.iter().all(Column::is_empty));
            if !hollow {
                break;
            }
            let Some(outer) = self.slot_of(wrapper) else {
                break;
            };
            self.detach(wrapper);
            log::debug!("columns: `{wrapper}` left empty, removed");
            slot = outer;
        }
    }

    fn plan_target(&self, parent: Option<ComponentKey>) -> Result<Target, FormError> {
        let Some(key) = parent else {
            return Ok(Target::List {
                parent: None,
                column: None,
            });
        };
        let owner = self.get(key)?;
        if let Some(columns) = owner.columns() {
            return match columns.iter().position(Column::is_empty) {
                Some(i) => Ok(Target::List {
                    parent,
                    column: Some(i),
                }),
                None if columns.len() < MAX_COLUMNS => Ok(Target::NewColumn(key)),
                None => Err(FormError::ColumnLimit { max: MAX_COLUMNS }),
            };
        }
        if owner.is_container() {
            Ok(Target::List {
                parent,
                column: None,
            })
        } else {
            Err(FormError::NotContainer(key.to_string()))
        }
    }

    fn append_to(&mut self, target: Target, unit: Vec<Component>) -> Result<(), FormError> {
        let (parent, column) = match target {
            Target::List { parent, column } => (parent, column),
            Target::NewColumn(wrapper) => (Some(wrapper), Some(self.add_column(wrapper)?)),
        };
        self.child_list_mut(parent, column)?.extend(unit);
        Ok(())
    }

    // ─── Keys ────────────────────────────────────────────────────────────

    /// Give `old` the exact key `new`. References follow: conditionals,
    /// formulas, answer-key rows and the bundle table.
    pub fn rename_key(&mut self, old: ComponentKey, new: &str) -> Result<ComponentKey, FormError> {
        let new_key = ComponentKey::intern(new.trim());
        if new_key.is_empty() {
            return Err(FormError::Invalid("key must not be empty".into()));
        }
        self.get(old)?;
        if new_key == old {
            return Ok(old);
        }
        if self.bundles.owner_of_driver(old).is_some() {
            return Err(FormError::Invalid(format!(
                "`{old}` is an actions driver; its key is assigned automatically"
            )));
        }
        if self.contains(new_key) || self.registry.is_reserved(new_key) {
            return Err(FormError::DuplicateKey(new_key.to_string()));
        }
        self.registry.release(old);
        self.registry.register(new_key);
        self.apply_rename(old, new_key);
        Ok(new_key)
    }

    /// Re-derive the key of `old` from `label` through the registry.
    pub fn rekey_from_label(
        &mut self,
        old: ComponentKey,
        label: &str,
    ) -> Result<ComponentKey, FormError> {
        self.get(old)?;
        if self.bundles.owner_of_driver(old).is_some() {
            return Err(FormError::Invalid(format!(
                "`{old}` is an actions driver; its key is assigned automatically"
            )));
        }
        let new_key = self.registry.update_unique_key(old, label);
        if new_key != old {
            self.apply_rename(old, new_key);
        }
        Ok(new_key)
    }

    fn apply_rename(&mut self, old: ComponentKey, new: ComponentKey) {
        locate::walk_mut(&mut self.components, &mut |c| {
            if c.key == old {
                c.key = new;
            }
            let key = c.key;
            if let Some(cond) = c.conditional.as_mut() {
                if cond.when == old {
                    cond.when = new;
                }
            }
            if let Some(Some(f)) = c.calculate_value_mut() {
                match formula::rename_reference(f, old.as_str(), new.as_str()) {
                    Ok(rewritten) => *f = rewritten,
                    Err(e) => log::warn!("rename: formula of `{key}` left as is: {e}"),
                }
            }
            if let ComponentKind::AnswerKey { rows } = &mut c.kind {
                for row in rows.iter_mut().filter(|r| r.question_key == old) {
                    row.question_key = new;
                }
            }
        });
        self.bundles.rename(old, new);
        log::debug!("rename: `{old}` → `{new}`");
    }

    // ─── Fields ──────────────────────────────────────────────────────────

    pub fn set_label(&mut self, key: ComponentKey, label: &str) -> Result<(), FormError> {
        self.get_mut(key)?.label = label.to_string();
        self.sync_answer_row(key)?;
        Ok(())
    }

    pub fn set_hide_label(&mut self, key: ComponentKey, hide: bool) -> Result<(), FormError> {
        self.get_mut(key)?.hide_label = hide;
        Ok(())
    }

    pub fn set_description(
        &mut self,
        key: ComponentKey,
        description: Option<String>,
    ) -> Result<(), FormError> {
        self.get_mut(key)?.description = description.filter(|d| !d.is_empty());
        Ok(())
    }

    /// Switch among radio / select / selectboxes. Options carry over;
    /// single-valued kinds keep only the first default.
    pub fn change_type(&mut self, key: ComponentKey, to: ComponentType) -> Result<(), FormError> {
        let is_driver = self.bundles.owner_of_driver(key).is_some();
        let component = self.get_mut(key)?;
        let from = component.component_type();
        if !from.is_choice() || !to.is_choice() || is_driver {
            return Err(FormError::TypeChange {
                key: key.to_string(),
                from: from.as_str(),
                to: to.as_str(),
            });
        }
        if from == to {
            return Ok(());
        }
        let mut field = component.choice().cloned().unwrap_or_default();
        if to != ComponentType::SelectBoxes {
            field.default_value.truncate(1);
        }
        component.kind = match to {
            ComponentType::Radio => ComponentKind::Radio(field),
            ComponentType::Select => ComponentKind::Select(field),
            _ => ComponentKind::SelectBoxes(field),
        };
        log::debug!("type: `{key}` {} → {}", from.as_str(), to.as_str());
        self.sync_answer_row(key)?;
        Ok(())
    }

    /// Replace the options of a choice field (or the rating scale of a
    /// survey). Values are deduplicated; defaults that no longer match an
    /// option are dropped.
    pub fn set_options(
        &mut self,
        key: ComponentKey,
        mut options: Vec<ChoiceOption>,
    ) -> Result<(), FormError> {
        dedupe_option_values(&mut options);
        let component = self.get_mut(key)?;
        match &mut component.kind {
            ComponentKind::Radio(field)
            | ComponentKind::Select(field)
            | ComponentKind::SelectBoxes(field) => {
                field.options = options;
                field.retain_valid_defaults();
            }
            ComponentKind::Survey { values, .. } => *values = options,
            _ => return Err(FormError::Invalid(format!("`{key}` has no options"))),
        }
        self.sync_answer_row(key)?;
        Ok(())
    }

    pub fn set_validation(
        &mut self,
        key: ComponentKey,
        validation: Validation,
    ) -> Result<(), FormError> {
        self.get_mut(key)?.validate = validation;
        Ok(())
    }

    /// Set the default selection of a choice field by option value, then
    /// refresh its answer-key row.
    pub fn set_default_value(
        &mut self,
        key: ComponentKey,
        values: Vec<String>,
    ) -> Result<(), FormError> {
        let component = self.get_mut(key)?;
        let ty = component.component_type();
        let Some(field) = component.choice_mut() else {
            return Err(FormError::Invalid(format!("`{key}` has no options")));
        };
        if ty != ComponentType::SelectBoxes && values.len() > 1 {
            return Err(FormError::Invalid(format!(
                "`{key}` takes a single default value"
            )));
        }
        if let Some(bad) = values
            .iter()
            .find(|v| !field.options.iter().any(|o| &o.value == *v))
        {
            return Err(FormError::Invalid(format!(
                "`{bad}` is not an option of `{key}`"
            )));
        }
        field.default_value = values;
        self.sync_answer_row(key)?;
        Ok(())
    }

    /// Set or clear the `calculateValue` formula of a number or currency
    /// field. The formula must scan cleanly.
    pub fn set_calculate_value(
        &mut self,
        key: ComponentKey,
        formula: Option<String>,
    ) -> Result<(), FormError> {
        let formula = formula.filter(|f| !f.trim().is_empty());
        if let Some(f) = &formula {
            formula::references(f)?;
        }
        let component = self.get_mut(key)?;
        let Some(slot) = component.calculate_value_mut() else {
            return Err(FormError::Invalid(format!("`{key}` cannot be calculated")));
        };
        *slot = formula;
        Ok(())
    }

    pub fn set_html(&mut self, key: ComponentKey, html: &str) -> Result<(), FormError> {
        match &mut self.get_mut(key)?.kind {
            ComponentKind::Content { html: h } | ComponentKind::Disclaimer { html: h } => {
                *h = html.to_string();
                Ok(())
            }
            _ => Err(FormError::Invalid(format!("`{key}` has no html"))),
        }
    }

    /// Set or clear a visibility rule. The referenced component must exist
    /// and be another component.
    pub fn set_conditional(
        &mut self,
        key: ComponentKey,
        conditional: Option<Conditional>,
    ) -> Result<(), FormError> {
        if let Some(c) = &conditional {
            if c.when == key {
                return Err(FormError::Invalid(format!(
                    "`{key}` cannot depend on itself"
                )));
            }
            if !self.contains(c.when) {
                return Err(FormError::not_found(c.when));
            }
        }
        self.get_mut(key)?.conditional = conditional;
        Ok(())
    }
}

fn describe(parent: Option<ComponentKey>) -> String {
    match parent {
        Some(k) => format!("`{k}`"),
        None => "root".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn k(s: &str) -> ComponentKey {
        ComponentKey::intern(s)
    }

    fn root_keys(doc: &FormDocument) -> Vec<String> {
        doc.components().iter().map(|c| c.key.to_string()).collect()
    }

    fn fields(labels: &[&str]) -> FormDocument {
        let mut doc = FormDocument::new();
        for label in labels {
            doc.create(ComponentType::TextArea, label, &[], false, None)
                .unwrap();
        }
        doc
    }

    fn widths(doc: &FormDocument, wrapper: &str) -> Vec<u8> {
        doc.find(k(wrapper))
            .unwrap()
            .columns()
            .unwrap()
            .iter()
            .map(|c| c.width)
            .collect()
    }

    #[test]
    fn create_routes_into_columns_and_grows_row() {
        let mut doc = FormDocument::new();
        let cols = doc
            .create(ComponentType::Columns, "Columns", &[], false, None)
            .unwrap();
        for label in ["A", "B", "C", "D"] {
            doc.create(ComponentType::TextArea, label, &[], false, Some(cols))
                .unwrap();
        }
        assert_eq!(widths(&doc, "columns"), [3, 3, 3, 3]);
        let err = doc
            .create(ComponentType::TextArea, "E", &[], false, Some(cols))
            .unwrap_err();
        assert!(matches!(err, FormError::ColumnLimit { max: 4 }));
        assert!(!doc.contains(k("e")));
    }

    #[test]
    fn create_under_leaf_is_rejected() {
        let mut doc = fields(&["Notes"]);
        let err = doc
            .create(ComponentType::TextArea, "X", &[], false, Some(k("notes")))
            .unwrap_err();
        assert!(matches!(err, FormError::NotContainer(_)));
    }

    #[test]
    fn delete_missing_is_lookup_failure() {
        let mut doc = fields(&["A"]);
        let err = doc.delete(&ComponentPath::root(5)).unwrap_err();
        assert!(err.is_lookup());
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn delete_owner_takes_bundle() {
        let mut doc = fields(&["A", "B"]);
        doc.toggle_actions(k("a"), true).unwrap();
        let removed = doc.delete_by_key(k("a")).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(root_keys(&doc), ["b"]);
        assert!(doc.bundles().is_empty());
    }

    #[test]
    fn delete_driver_switches_actions_off() {
        let mut doc = fields(&["A"]);
        doc.toggle_actions(k("a"), true).unwrap();
        doc.delete_by_key(k("actions1")).unwrap();
        assert_eq!(root_keys(&doc), ["a"]);
        assert!(doc.bundles().get(k("a")).is_none());
    }

    #[test]
    fn move_appends_unit_to_target() {
        let mut doc = fields(&["A", "B"]);
        let group = doc
            .create(ComponentType::Fieldset, "Group", &[], false, None)
            .unwrap();
        doc.toggle_actions(k("a"), true).unwrap();
        doc.move_key_to(k("comment"), Some(group)).unwrap();
        assert_eq!(root_keys(&doc), ["b", "group"]);
        let inside: Vec<_> = doc
            .find(group)
            .unwrap()
            .children()
            .unwrap()
            .iter()
            .map(|c| c.key.to_string())
            .collect();
        assert_eq!(inside, ["a", "actions1", "comment"]);
    }

    #[test]
    fn move_into_descendant_is_a_cycle() {
        let mut doc = FormDocument::new();
        let outer = doc
            .create(ComponentType::Fieldset, "Outer", &[], false, None)
            .unwrap();
        let inner = doc
            .create(ComponentType::Fieldset, "Inner", &[], false, Some(outer))
            .unwrap();
        let before = doc.clone().to_value();
        assert!(matches!(
            doc.move_key_to(outer, Some(inner)),
            Err(FormError::Cycle(_))
        ));
        assert!(matches!(
            doc.move_key_to(outer, Some(outer)),
            Err(FormError::Cycle(_))
        ));
        assert_eq!(doc.to_value(), before);
    }

    #[test]
    fn wrap_rejects_bad_counts() {
        let mut doc = fields(&["A"]);
        let err = doc.wrap_in_columns(&ComponentPath::root(0), 4).unwrap_err();
        assert!(matches!(err, FormError::ColumnCount(4)));
    }

    #[test]
    fn wrap_in_three_columns() {
        let mut doc = fields(&["A", "B"]);
        let wrapper = doc.wrap_in_columns(&ComponentPath::root(1), 3).unwrap();
        assert_eq!(root_keys(&doc), ["a", wrapper.as_str()]);
        assert_eq!(widths(&doc, wrapper.as_str()), [4, 4, 4]);
    }

    #[test]
    fn move_into_column_rehomes_displaced() {
        let mut doc = fields(&["A", "B"]);
        let wrapper = doc.wrap_in_columns(&ComponentPath::root(0), 2).unwrap();
        let displaced = doc.move_into_column(k("b"), wrapper, 0, None).unwrap();
        assert_eq!(displaced, vec![k("a")]);
        assert_eq!(root_keys(&doc), [wrapper.as_str(), "a"]);
        let col0 = &doc.find(wrapper).unwrap().columns().unwrap()[0];
        assert_eq!(col0.components[0].key, k("b"));
    }

    #[test]
    fn move_into_column_uses_fallback_for_new_components() {
        let mut doc = fields(&["A"]);
        let wrapper = doc.wrap_in_columns(&ComponentPath::root(0), 2).unwrap();
        let fresh = create_component(
            ComponentType::Number,
            "Total",
            &[],
            false,
            doc.registry_mut(),
        );
        let displaced = doc
            .move_into_column(fresh.key, wrapper, 1, Some(fresh))
            .unwrap();
        assert!(displaced.is_empty());
        assert!(doc.contains(k("total")));
        assert!(matches!(
            doc.move_into_column(k("ghost"), wrapper, 1, None),
            Err(FormError::NotFound(_))
        ));
    }

    #[test]
    fn remove_from_column_collapses_single_column() {
        let mut doc = fields(&["A", "B"]);
        let wrapper = doc.wrap_in_columns(&ComponentPath::root(0), 2).unwrap();
        doc.move_into_column(k("b"), wrapper, 1, None).unwrap();
        let removed = doc.remove_from_column(wrapper, 1, true).unwrap();
        assert_eq!(removed[0].key, k("b"));
        assert_eq!(root_keys(&doc), ["a"]);
    }

    #[test]
    fn remove_last_occupant_deletes_wrapper() {
        let mut doc = fields(&["A"]);
        let wrapper = doc.wrap_in_columns(&ComponentPath::root(0), 2).unwrap();
        doc.remove_from_column(wrapper, 0, false).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn add_and_merge_columns() {
        let mut doc = fields(&["A", "B"]);
        let wrapper = doc.wrap_in_columns(&ComponentPath::root(0), 2).unwrap();
        assert_eq!(doc.add_column(wrapper).unwrap(), 2);
        assert_eq!(widths(&doc, wrapper.as_str()), [4, 4, 4]);
        doc.add_column(wrapper).unwrap();
        assert!(matches!(
            doc.add_column(wrapper),
            Err(FormError::ColumnLimit { .. })
        ));
        doc.merge_columns(wrapper, 3, 0).unwrap();
        doc.merge_columns(wrapper, 2, 0).unwrap();
        assert_eq!(widths(&doc, wrapper.as_str()), [6, 6]);
        doc.merge_columns(wrapper, 1, 0).unwrap();
        assert_eq!(root_keys(&doc), ["a", "b"]);
    }

    #[test]
    fn reorder_counts_units() {
        let mut doc = fields(&["A", "B", "C"]);
        doc.toggle_actions(k("a"), true).unwrap();
        doc.reorder(None, 0, 2).unwrap();
        assert_eq!(root_keys(&doc), ["b", "c", "a", "actions1", "comment"]);
        doc.reorder(None, 1, 1).unwrap();
        assert_eq!(doc.units_in(None).unwrap(), [k("b"), k("c"), k("a")]);
        assert!(matches!(
            doc.reorder(None, 0, 3),
            Err(FormError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn rename_rewrites_references() {
        let mut doc = FormDocument::new();
        let price = doc
            .create(ComponentType::Number, "Price", &[], false, None)
            .unwrap();
        let total = doc
            .create(ComponentType::Number, "Total", &[], false, None)
            .unwrap();
        let note = doc
            .create(ComponentType::TextArea, "Note", &[], false, None)
            .unwrap();
        doc.set_calculate_value(total, Some("value = data.price * 2".into()))
            .unwrap();
        doc.set_conditional(
            note,
            Some(Conditional {
                show: true,
                when: price,
                eq: "0".into(),
            }),
        )
        .unwrap();

        let cost = doc.rename_key(price, "cost").unwrap();
        assert_eq!(
            doc.find(total).unwrap().calculate_value(),
            Some("value = data.cost * 2")
        );
        assert_eq!(doc.find(note).unwrap().conditional.as_ref().unwrap().when, cost);
        assert!(!doc.registry().is_reserved(price));
        assert!(matches!(
            doc.rename_key(cost, "total"),
            Err(FormError::DuplicateKey(_))
        ));
    }

    #[test]
    fn change_type_keeps_options_across_hops() {
        let mut doc = FormDocument::new();
        let q = doc
            .create(
                ComponentType::SelectBoxes,
                "Pick",
                &["A".into(), "B".into()],
                false,
                None,
            )
            .unwrap();
        doc.set_default_value(q, vec!["a".into(), "b".into()])
            .unwrap();
        doc.change_type(q, ComponentType::Radio).unwrap();
        doc.change_type(q, ComponentType::Select).unwrap();
        doc.change_type(q, ComponentType::SelectBoxes).unwrap();
        let field = doc.find(q).unwrap().choice().unwrap();
        assert_eq!(field.options.len(), 2);
        assert_eq!(field.default_value, ["a"]);
        assert!(matches!(
            doc.change_type(q, ComponentType::TextArea),
            Err(FormError::TypeChange { .. })
        ));
    }

    #[test]
    fn default_value_must_name_an_option() {
        let mut doc = FormDocument::new();
        let q = doc
            .create(ComponentType::Radio, "Q", &["Yes".into()], false, None)
            .unwrap();
        assert!(doc.set_default_value(q, vec!["no".into()]).is_err());
        assert!(doc
            .set_default_value(q, vec!["yes".into(), "yes".into()])
            .is_err());
        doc.set_default_value(q, vec!["yes".into()]).unwrap();
    }

    #[test]
    fn bad_formula_is_rejected_before_write() {
        let mut doc = FormDocument::new();
        let n = doc
            .create(ComponentType::Number, "N", &[], false, None)
            .unwrap();
        assert!(matches!(
            doc.set_calculate_value(n, Some("value = (data.a".into())),
            Err(FormError::Formula { .. })
        ));
        assert_eq!(doc.find(n).unwrap().calculate_value(), None);
    }
}
