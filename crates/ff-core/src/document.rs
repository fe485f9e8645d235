//! `FormDocument`: the component tree together with its key registry and
//! bundle relation table.
//!
//! The three are kept side by side so every operation that changes the
//! tree can update the registry and the bundle table in the same call.
//! Structural operations live in `mutate`, bundle operations in `bundle`,
//! import/export in `exchange`.

use crate::bundle::{ActionsConfig, BundleTable};
use crate::error::FormError;
use crate::key::{ComponentKey, KeyRegistry};
use crate::locate::{self, ComponentPath};
use crate::model::Component;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Where a component sits: the list owner (`None` = root), the column for
/// columns wrappers, and the index inside that list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub parent: Option<ComponentKey>,
    pub column: Option<usize>,
    pub index: usize,
}

/// A form under edit.
#[derive(Debug, Clone, Default)]
pub struct FormDocument {
    pub(crate) components: Vec<Component>,
    pub(crate) registry: KeyRegistry,
    pub(crate) bundles: BundleTable,
    pub(crate) actions: ActionsConfig,
    /// Top-level wire fields other than `components` (title, display, …).
    pub(crate) extra: Map<String, Value>,
}

impl FormDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actions(actions: ActionsConfig) -> Self {
        Self {
            actions,
            ..Self::default()
        }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Direct registry access, for callers that build components
    /// themselves (palette drops, tests).
    pub fn registry_mut(&mut self) -> &mut KeyRegistry {
        &mut self.registry
    }

    pub fn bundles(&self) -> &BundleTable {
        &self.bundles
    }

    pub fn actions(&self) -> &ActionsConfig {
        &self.actions
    }

    pub fn set_actions(&mut self, actions: ActionsConfig) {
        self.actions = actions;
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Number of components in the tree, at every depth.
    pub fn len(&self) -> usize {
        self.components.iter().map(Component::subtree_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn find(&self, key: ComponentKey) -> Option<&Component> {
        locate::find_component_by_key(&self.components, key)
    }

    pub(crate) fn find_mut(&mut self, key: ComponentKey) -> Option<&mut Component> {
        locate::find_component_by_key_mut(&mut self.components, key)
    }

    /// Like [`find`](Self::find) but a miss is `NotFound`.
    pub fn get(&self, key: ComponentKey) -> Result<&Component, FormError> {
        self.find(key).ok_or_else(|| FormError::not_found(key))
    }

    pub(crate) fn get_mut(&mut self, key: ComponentKey) -> Result<&mut Component, FormError> {
        self.find_mut(key).ok_or_else(|| FormError::not_found(key))
    }

    pub fn contains(&self, key: ComponentKey) -> bool {
        self.find(key).is_some()
    }

    pub fn path_of(&self, key: ComponentKey) -> Option<ComponentPath> {
        locate::path_of(&self.components, key)
    }

    pub fn resolve(&self, path: &ComponentPath) -> Option<&Component> {
        locate::resolve(&self.components, path)
    }

    /// Key of the component at `path`, or `NotFound`.
    pub fn key_at(&self, path: &ComponentPath) -> Result<ComponentKey, FormError> {
        self.resolve(path)
            .map(|c| c.key)
            .ok_or_else(|| FormError::not_found(path))
    }

    /// Where `key` currently sits.
    pub fn slot_of(&self, key: ComponentKey) -> Option<Slot> {
        let path = self.path_of(key)?;
        let last = path.last()?;
        Some(Slot {
            parent: locate::parent_of(&self.components, &path),
            column: last.column,
            index: last.index,
        })
    }

    /// Every key, pre-order.
    pub fn keys(&self) -> Vec<ComponentKey> {
        locate::keys(&self.components)
    }

    // ─── Child lists ─────────────────────────────────────────────────────

    /// The list addressed by `parent` / `column`.
    pub fn child_list(
        &self,
        parent: Option<ComponentKey>,
        column: Option<usize>,
    ) -> Result<&Vec<Component>, FormError> {
        let Some(key) = parent else {
            return Ok(&self.components);
        };
        let owner = self.get(key)?;
        list_error(owner, column)?;
        owner
            .child_list(column)
            .ok_or_else(|| FormError::NotContainer(key.to_string()))
    }

    pub(crate) fn child_list_mut(
        &mut self,
        parent: Option<ComponentKey>,
        column: Option<usize>,
    ) -> Result<&mut Vec<Component>, FormError> {
        let Some(key) = parent else {
            return Ok(&mut self.components);
        };
        let owner = self.get_mut(key)?;
        list_error(owner, column)?;
        owner
            .child_list_mut(column)
            .ok_or_else(|| FormError::NotContainer(key.to_string()))
    }

    // ─── Units ───────────────────────────────────────────────────────────

    /// `key` plus its bundle members (driver, followers), or just `key`.
    pub fn unit_keys(&self, key: ComponentKey) -> Vec<ComponentKey> {
        let mut keys = vec![key];
        keys.extend(self.bundles.members(key));
        keys
    }

    /// Bundle members resolve to their owner; everything else to itself.
    pub fn unit_owner(&self, key: ComponentKey) -> ComponentKey {
        self.bundles.owner_of_member(key).unwrap_or(key)
    }

    /// Remove `owner` and its bundle members from the tree.
    ///
    /// Members are returned in the order they had in the owner's list.
    /// The returned slot is where the unit can be put back: the owner's
    /// list, at the owner's index less the members that sat before it.
    pub(crate) fn take_unit(
        &mut self,
        owner: ComponentKey,
    ) -> Result<(Slot, Vec<Component>), FormError> {
        let slot = self.slot_of(owner).ok_or_else(|| FormError::not_found(owner))?;
        let unit: HashSet<ComponentKey> = self.unit_keys(owner).into_iter().collect();

        let list = self.child_list_mut(slot.parent, slot.column)?;
        let before = list[..slot.index]
            .iter()
            .filter(|c| unit.contains(&c.key))
            .count();
        let mut taken = Vec::with_capacity(unit.len());
        let mut kept = Vec::with_capacity(list.len());
        for component in list.drain(..) {
            if unit.contains(&component.key) {
                taken.push(component);
            } else {
                kept.push(component);
            }
        }
        *list = kept;

        // Members that drifted out of the owner's list.
        for key in self.unit_keys(owner) {
            if taken.iter().any(|c| c.key == key) {
                continue;
            }
            if let Some(stray) = self.detach(key) {
                log::warn!("bundle member `{key}` was not beside its owner `{owner}`");
                taken.push(stray);
            }
        }

        Ok((
            Slot {
                index: slot.index - before,
                ..slot
            },
            taken,
        ))
    }

    /// Remove one component (no bundle handling) from wherever it sits.
    pub(crate) fn detach(&mut self, key: ComponentKey) -> Option<Component> {
        let path = self.path_of(key)?;
        let (list, index) = locate::containing_list_mut(&mut self.components, &path)?;
        Some(list.remove(index))
    }

    /// Put components into a list at `index` (clamped to its length).
    pub(crate) fn place(
        &mut self,
        parent: Option<ComponentKey>,
        column: Option<usize>,
        index: usize,
        components: Vec<Component>,
    ) -> Result<(), FormError> {
        let list = self.child_list_mut(parent, column)?;
        let at = index.min(list.len());
        list.splice(at..at, components);
        Ok(())
    }

    /// Register the keys of a subtree that comes from outside the document.
    ///
    /// Keys already live in the tree, repeated inside the subtree, or empty
    /// are replaced with fresh registry keys; conditionals inside the
    /// subtree follow the rename. Returns the `(old, new)` pairs.
    pub(crate) fn adopt(&mut self, component: &mut Component) -> Vec<(ComponentKey, ComponentKey)> {
        let mut seen: HashSet<ComponentKey> = locate::keys(&self.components).into_iter().collect();
        let mut renames = Vec::new();
        let registry = &mut self.registry;
        locate::walk_mut(std::slice::from_mut(component), &mut |c| {
            if c.key.is_empty() || seen.contains(&c.key) {
                let fresh = if c.key.is_empty() {
                    registry.generate_unique_key(&c.label)
                } else {
                    registry.generate_prefixed_key(c.key.as_str())
                };
                log::warn!("adopt: key `{}` already in use, re-keyed to `{fresh}`", c.key);
                renames.push((c.key, fresh));
                c.key = fresh;
            } else {
                registry.register(c.key);
            }
            seen.insert(c.key);
        });
        if !renames.is_empty() {
            locate::walk_mut(std::slice::from_mut(component), &mut |c| {
                if let Some(cond) = c.conditional.as_mut() {
                    if let Some((_, new)) = renames.iter().find(|(old, _)| *old == cond.when) {
                        cond.when = *new;
                    }
                }
            });
        }
        renames
    }

    // ─── Snapshots ───────────────────────────────────────────────────────

    /// MessagePack encoding of the wire tree (markers included).
    pub fn snapshot(&self) -> Result<Vec<u8>, FormError> {
        Ok(rmp_serde::to_vec(&self.to_value())?)
    }

    /// Replace the tree with a snapshot taken earlier.
    ///
    /// Keys stay spent: the registry keeps every key it had and gains the
    /// snapshot's keys.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<(), FormError> {
        let value: Value = rmp_serde::from_slice(bytes)?;
        let mut restored = FormDocument::from_value(&value)?;
        for key in self.registry.keys() {
            restored.registry.register(key);
        }
        restored.actions = std::mem::take(&mut self.actions);
        *self = restored;
        Ok(())
    }

    /// Bring derived state back in line after a batch of edits: bundle
    /// numbering, then every quiz answer key.
    pub fn settle(&mut self) {
        self.compact_bundles();
        self.sync_all_quizzes();
    }
}

fn list_error(owner: &Component, column: Option<usize>) -> Result<(), FormError> {
    match (column, owner.columns()) {
        (Some(index), Some(columns)) if index >= columns.len() => Err(FormError::ColumnIndex {
            wrapper: owner.key.to_string(),
            index,
        }),
        (None, Some(_)) | (Some(_), None) => Err(FormError::NotContainer(owner.key.to_string())),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ComponentType;

    fn doc_with(types: &[(ComponentType, &str)]) -> FormDocument {
        let mut doc = FormDocument::new();
        for (ty, label) in types {
            doc.create(*ty, label, &[], false, None).unwrap();
        }
        doc
    }

    #[test]
    fn child_list_rejects_leaves_and_bad_columns() {
        let mut doc = doc_with(&[(ComponentType::TextArea, "Notes")]);
        let notes = ComponentKey::intern("notes");
        assert!(matches!(
            doc.child_list(Some(notes), None),
            Err(FormError::NotContainer(_))
        ));
        let cols = doc
            .create(ComponentType::Columns, "Columns", &[], false, None)
            .unwrap();
        assert!(matches!(
            doc.child_list(Some(cols), Some(7)),
            Err(FormError::ColumnIndex { index: 7, .. })
        ));
        assert!(doc.child_list(Some(cols), Some(1)).unwrap().is_empty());
        assert!(doc.child_list_mut(Some(cols), None).is_err());
    }

    #[test]
    fn take_unit_reports_insertion_slot() {
        let mut doc = doc_with(&[
            (ComponentType::TextArea, "A"),
            (ComponentType::TextArea, "B"),
            (ComponentType::TextArea, "C"),
        ]);
        let (slot, taken) = doc.take_unit(ComponentKey::intern("b")).unwrap();
        assert_eq!(slot.index, 1);
        assert_eq!(slot.parent, None);
        assert_eq!(taken.len(), 1);
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn adopt_rekeys_collisions_and_rewires_conditionals() {
        let mut doc = doc_with(&[(ComponentType::TextArea, "Name")]);
        let name = ComponentKey::intern("name");
        let mut incoming = crate::codec::decode_component(&serde_json::json!({
            "type": "fieldset",
            "key": "group",
            "components": [
                {"type": "textarea", "key": "name"},
                {"type": "textarea", "key": "other",
                 "conditional": {"show": true, "when": "name", "eq": "x"}}
            ]
        }))
        .unwrap();
        let renames = doc.adopt(&mut incoming);
        assert_eq!(renames.len(), 1);
        assert_eq!(renames[0].0, name);
        let new = renames[0].1;
        assert_eq!(new.as_str(), "name1");
        let children = incoming.children().unwrap();
        assert_eq!(children[0].key, new);
        assert_eq!(children[1].conditional.as_ref().unwrap().when, new);
    }

    #[test]
    fn snapshot_restore_keeps_keys_spent() {
        let mut doc = doc_with(&[(ComponentType::TextArea, "A")]);
        let snap = doc.snapshot().unwrap();
        doc.create(ComponentType::TextArea, "B", &[], false, None)
            .unwrap();
        doc.restore(&snap).unwrap();
        assert_eq!(doc.len(), 1);
        assert!(doc.registry().is_reserved(ComponentKey::intern("b")));
        let next = doc
            .create(ComponentType::TextArea, "B", &[], false, None)
            .unwrap();
        assert_eq!(next.as_str(), "b1");
    }
}
