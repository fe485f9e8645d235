//! Drag-and-drop reconciliation.
//!
//! The builder UI reports a finished drag as a `DropEvent`: what was
//! dragged and where it landed. `plan_drop` turns it into the edit
//! commands that make the tree match what the user sees. The session runs
//! the plan as one batch, so a drop is one undo step and either fully
//! applies or leaves the tree untouched.

use crate::commands::EditCommand;
use crate::config::EditorConfig;
use ff_core::error::FormError;
use ff_core::factory::create_component_with_key;
use ff_core::key::ComponentKey;
use ff_core::model::{Component, ComponentType};
use ff_core::FormDocument;
use serde_json::Value;

/// What was dragged.
#[derive(Debug, Clone, PartialEq)]
pub enum DragSource {
    /// A component already in the tree. Bundle members drag their owner.
    Existing(ComponentKey),
    /// A new component from the palette.
    Palette {
        ty: ComponentType,
        label: String,
        options: Vec<String>,
    },
}

/// Where it landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// Position `index` (counted in units) of a container's list, or of the
    /// root for `None`.
    List {
        parent: Option<ComponentKey>,
        index: usize,
    },
    /// A column slot of a columns wrapper.
    Column { wrapper: ComponentKey, column: usize },
    /// The "add column" zone at the right edge of a row.
    NewColumn { wrapper: ComponentKey },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropEvent {
    pub source: DragSource,
    pub target: DropTarget,
}

impl DropEvent {
    /// Decode a drop reported by the builder UI:
    ///
    /// ```json
    /// {"source": {"key": "name"} | {"type": "radio", "label": "…", "options": […]},
    ///  "target": {"parent": null, "index": 0}
    ///          | {"wrapper": "row", "column": 1}
    ///          | {"wrapper": "row", "newColumn": true}}
    /// ```
    pub fn from_value(value: &Value) -> Result<Self, FormError> {
        let source = value
            .get("source")
            .ok_or_else(|| FormError::Invalid("drop is missing `source`".into()))?;
        let target = value
            .get("target")
            .ok_or_else(|| FormError::Invalid("drop is missing `target`".into()))?;

        let source = if let Some(key) = source.get("key").and_then(Value::as_str) {
            DragSource::Existing(ComponentKey::intern(key))
        } else {
            let name = source
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| FormError::Invalid("drop source needs `key` or `type`".into()))?;
            DragSource::Palette {
                ty: ComponentType::parse(name)
                    .ok_or_else(|| FormError::UnknownType(name.to_string()))?,
                label: source
                    .get("label")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                options: source
                    .get("options")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            }
        };

        let index = |name: &str| {
            target
                .get(name)
                .and_then(Value::as_u64)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| FormError::Invalid(format!("drop target needs `{name}`")))
        };
        let target = match target.get("wrapper").and_then(Value::as_str) {
            Some(wrapper) => {
                let wrapper = ComponentKey::intern(wrapper);
                if target.get("newColumn").and_then(Value::as_bool) == Some(true) {
                    DropTarget::NewColumn { wrapper }
                } else {
                    DropTarget::Column {
                        wrapper,
                        column: index("column")?,
                    }
                }
            }
            None => DropTarget::List {
                parent: target
                    .get("parent")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(ComponentKey::intern),
                index: index("index")?,
            },
        };
        Ok(DropEvent { source, target })
    }
}

/// Translate a drop into commands. Nothing is mutated here; an empty plan
/// means the drop changes nothing.
pub fn plan_drop(
    doc: &FormDocument,
    event: &DropEvent,
    config: &EditorConfig,
) -> Result<Vec<EditCommand>, FormError> {
    match (&event.source, event.target) {
        (DragSource::Existing(key), DropTarget::List { parent, index }) => {
            plan_list_move(doc, *key, parent, index, config)
        }
        (DragSource::Existing(key), DropTarget::Column { wrapper, column }) => {
            let owner = existing_owner(doc, *key)?;
            let mut plan = vec![EditCommand::MoveIntoColumn {
                key: owner,
                wrapper,
                column,
                fallback: None,
            }];
            plan.extend(tidy_source(doc, owner, Some(wrapper), config));
            Ok(plan)
        }
        (DragSource::Existing(key), DropTarget::NewColumn { wrapper }) => {
            let owner = existing_owner(doc, *key)?;
            let column = column_count(doc, wrapper, config)?;
            let mut plan = vec![
                EditCommand::AddColumn { wrapper },
                EditCommand::MoveIntoColumn {
                    key: owner,
                    wrapper,
                    column,
                    fallback: None,
                },
            ];
            plan.extend(tidy_source(doc, owner, Some(wrapper), config));
            Ok(plan)
        }
        (
            DragSource::Palette { ty, label, options },
            DropTarget::List { parent, index },
        ) => {
            let len = doc.units_in(parent)?.len();
            let mut plan = vec![EditCommand::Create {
                ty: *ty,
                label: label.clone(),
                options: options.clone(),
                hide_label: false,
                parent,
            }];
            if index < len {
                plan.push(EditCommand::Reorder {
                    parent,
                    from: len,
                    to: index,
                });
            }
            Ok(plan)
        }
        (DragSource::Palette { ty, label, options }, DropTarget::Column { wrapper, column }) => {
            let component = palette_component(doc, *ty, label, options);
            Ok(vec![EditCommand::MoveIntoColumn {
                key: component.key,
                wrapper,
                column,
                fallback: Some(Box::new(component)),
            }])
        }
        (DragSource::Palette { ty, label, options }, DropTarget::NewColumn { wrapper }) => {
            let column = column_count(doc, wrapper, config)?;
            let component = palette_component(doc, *ty, label, options);
            Ok(vec![
                EditCommand::AddColumn { wrapper },
                EditCommand::MoveIntoColumn {
                    key: component.key,
                    wrapper,
                    column,
                    fallback: Some(Box::new(component)),
                },
            ])
        }
    }
}

fn plan_list_move(
    doc: &FormDocument,
    key: ComponentKey,
    parent: Option<ComponentKey>,
    index: usize,
    config: &EditorConfig,
) -> Result<Vec<EditCommand>, FormError> {
    let owner = existing_owner(doc, key)?;
    let from = doc
        .slot_of(owner)
        .ok_or_else(|| FormError::NotFound(owner.to_string()))?;
    let units = doc.units_in(parent)?;

    // Same list: a plain reorder.
    if from.parent == parent && from.column.is_none() {
        let old = units
            .iter()
            .position(|k| *k == owner)
            .ok_or_else(|| FormError::NotFound(owner.to_string()))?;
        let new = index.min(units.len().saturating_sub(1));
        if old == new {
            return Ok(Vec::new());
        }
        return Ok(vec![EditCommand::Reorder {
            parent,
            from: old,
            to: new,
        }]);
    }

    // Another list: append there, then slide into place. A row the move
    // empties is deleted with it, which shifts the list when it sat there.
    let mut len = units.len();
    let mut index = index;
    if let Some(gone) = emptied_wrapper(doc, owner, parent) {
        if let Some(at) = units.iter().position(|k| *k == gone) {
            len -= 1;
            if at < index {
                index -= 1;
            }
        }
    }
    let mut plan = vec![EditCommand::Move {
        key: owner,
        target: parent,
    }];
    if index < len {
        plan.push(EditCommand::Reorder {
            parent,
            from: len,
            to: index,
        });
    }
    plan.extend(tidy_source(doc, owner, None, config));
    Ok(plan)
}

fn existing_owner(doc: &FormDocument, key: ComponentKey) -> Result<ComponentKey, FormError> {
    let owner = doc.unit_owner(key);
    if doc.contains(owner) {
        Ok(owner)
    } else {
        Err(FormError::NotFound(key.to_string()))
    }
}

/// Index the new column will get, or `ColumnLimit` when the row is full.
fn column_count(
    doc: &FormDocument,
    wrapper: ComponentKey,
    config: &EditorConfig,
) -> Result<usize, FormError> {
    let count = doc
        .get(wrapper)?
        .columns()
        .ok_or_else(|| FormError::NotContainer(wrapper.to_string()))?
        .len();
    let max = config.max_columns;
    if count >= max {
        log::debug!("drop: `{wrapper}` already has {count} columns");
        return Err(FormError::ColumnLimit { max });
    }
    Ok(count)
}

/// Tidy the row a component is dragged out of, unless it is the row it
/// lands in or a row the move deletes outright.
fn tidy_source(
    doc: &FormDocument,
    owner: ComponentKey,
    landing: Option<ComponentKey>,
    config: &EditorConfig,
) -> Option<EditCommand> {
    if !config.prune_columns {
        return None;
    }
    let slot = doc.slot_of(owner)?;
    slot.column?;
    let wrapper = slot.parent?;
    if landing == Some(wrapper) || emptied_wrapper(doc, owner, landing).is_some() {
        return None;
    }
    Some(EditCommand::TidyColumns { wrapper })
}

/// The outermost columns wrapper left with nothing in any column once
/// `owner`'s unit is taken out. The document deletes such wrappers as part
/// of the move. `landing` is never reported: the unit goes back into it.
fn emptied_wrapper(
    doc: &FormDocument,
    owner: ComponentKey,
    landing: Option<ComponentKey>,
) -> Option<ComponentKey> {
    let mut leaving = doc.unit_keys(owner);
    let mut slot = doc.slot_of(owner)?;
    let mut emptied = None;
    while let (Some(wrapper), Some(_)) = (slot.parent, slot.column) {
        if landing == Some(wrapper) {
            break;
        }
        let only_leaving = doc
            .find(wrapper)
            .and_then(Component::columns)
            .is_some_and(|columns| {
                columns
                    .iter()
                    .flat_map(|c| &c.components)
                    .all(|c| leaving.contains(&c.key))
            });
        if !only_leaving {
            break;
        }
        emptied = Some(wrapper);
        leaving = vec![wrapper];
        match doc.slot_of(wrapper) {
            Some(outer) => slot = outer,
            None => break,
        }
    }
    emptied
}

/// A palette component with the key the document would give it next.
fn palette_component(
    doc: &FormDocument,
    ty: ComponentType,
    label: &str,
    options: &[String],
) -> Component {
    let key = doc.registry().clone().generate_unique_key(label);
    create_component_with_key(ty, key, label, options, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn k(s: &str) -> ComponentKey {
        ComponentKey::intern(s)
    }

    fn doc_with_row() -> FormDocument {
        let mut doc = FormDocument::new();
        for label in ["A", "B", "C"] {
            doc.create(ComponentType::TextArea, label, &[], false, None)
                .unwrap();
        }
        let path = doc.path_of(k("c")).unwrap();
        doc.wrap_in_columns(&path, 2).unwrap();
        doc
    }

    fn drop(source: DragSource, target: DropTarget) -> DropEvent {
        DropEvent { source, target }
    }

    #[test]
    fn same_list_is_a_reorder() {
        let doc = doc_with_row();
        let plan = plan_drop(
            &doc,
            &drop(
                DragSource::Existing(k("a")),
                DropTarget::List {
                    parent: None,
                    index: 9,
                },
            ),
            &EditorConfig::default(),
        )
        .unwrap();
        assert_eq!(
            plan,
            vec![EditCommand::Reorder {
                parent: None,
                from: 0,
                to: 2
            }]
        );
    }

    #[test]
    fn dropping_in_place_plans_nothing() {
        let doc = doc_with_row();
        let event = drop(
            DragSource::Existing(k("b")),
            DropTarget::List {
                parent: None,
                index: 1,
            },
        );
        assert!(plan_drop(&doc, &event, &EditorConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn out_of_a_column_moves_then_tidies() {
        let mut doc = doc_with_row();
        let wrapper = doc.slot_of(k("c")).unwrap().parent.unwrap();
        doc.create(ComponentType::TextArea, "D", &[], false, Some(wrapper))
            .unwrap();
        let event = drop(
            DragSource::Existing(k("c")),
            DropTarget::List {
                parent: None,
                index: 0,
            },
        );
        let plan = plan_drop(&doc, &event, &EditorConfig::default()).unwrap();
        assert_eq!(
            plan,
            vec![
                EditCommand::Move {
                    key: k("c"),
                    target: None
                },
                EditCommand::Reorder {
                    parent: None,
                    from: 3,
                    to: 0
                },
                EditCommand::TidyColumns { wrapper },
            ]
        );

        let config = EditorConfig {
            prune_columns: false,
            ..EditorConfig::default()
        };
        assert_eq!(plan_drop(&doc, &event, &config).unwrap().len(), 2);
    }

    #[test]
    fn sole_occupant_drag_accounts_for_the_deleted_row() {
        // Root: a, b, row[c | empty]. The move deletes the row.
        let doc = doc_with_row();
        let event = drop(
            DragSource::Existing(k("c")),
            DropTarget::List {
                parent: None,
                index: 3,
            },
        );
        let plan = plan_drop(&doc, &event, &EditorConfig::default()).unwrap();
        assert_eq!(
            plan,
            vec![EditCommand::Move {
                key: k("c"),
                target: None
            }]
        );

        let event = drop(
            DragSource::Existing(k("c")),
            DropTarget::List {
                parent: None,
                index: 1,
            },
        );
        let plan = plan_drop(&doc, &event, &EditorConfig::default()).unwrap();
        assert_eq!(
            plan[1],
            EditCommand::Reorder {
                parent: None,
                from: 2,
                to: 1
            }
        );
    }

    #[test]
    fn new_column_respects_limit() {
        let doc = doc_with_row();
        let wrapper = doc.slot_of(k("c")).unwrap().parent.unwrap();
        let event = drop(
            DragSource::Existing(k("a")),
            DropTarget::NewColumn { wrapper },
        );
        let plan = plan_drop(&doc, &event, &EditorConfig::default()).unwrap();
        assert_eq!(plan[0], EditCommand::AddColumn { wrapper });
        assert!(matches!(
            plan[1],
            EditCommand::MoveIntoColumn { column: 2, .. }
        ));

        let tight = EditorConfig {
            max_columns: 2,
            ..EditorConfig::default()
        };
        assert!(matches!(
            plan_drop(&doc, &event, &tight),
            Err(FormError::ColumnLimit { max: 2 })
        ));
    }

    #[test]
    fn palette_drop_predicts_key() {
        let doc = doc_with_row();
        let wrapper = doc.slot_of(k("c")).unwrap().parent.unwrap();
        let event = drop(
            DragSource::Palette {
                ty: ComponentType::Radio,
                label: "A".into(),
                options: vec!["Yes".into(), "No".into()],
            },
            DropTarget::Column { wrapper, column: 1 },
        );
        let plan = plan_drop(&doc, &event, &EditorConfig::default()).unwrap();
        let [EditCommand::MoveIntoColumn { key, fallback, .. }] = plan.as_slice() else {
            panic!("unexpected plan {plan:?}");
        };
        assert_eq!(key.as_str(), "a1");
        assert_eq!(fallback.as_ref().unwrap().key, *key);
        // Planning reserved nothing.
        assert!(!doc.registry().is_reserved(*key));
    }

    #[test]
    fn decode_ui_drops() {
        let event = DropEvent::from_value(&serde_json::json!({
            "source": {"key": "a"},
            "target": {"wrapper": "row", "newColumn": true}
        }))
        .unwrap();
        assert_eq!(
            event,
            drop(
                DragSource::Existing(k("a")),
                DropTarget::NewColumn { wrapper: k("row") }
            )
        );

        let event = DropEvent::from_value(&serde_json::json!({
            "source": {"type": "selectboxes", "label": "Days", "options": ["Mon", "Tue"]},
            "target": {"parent": null, "index": 2}
        }))
        .unwrap();
        assert!(matches!(
            event.source,
            DragSource::Palette { ty: ComponentType::SelectBoxes, .. }
        ));
        assert_eq!(
            event.target,
            DropTarget::List {
                parent: None,
                index: 2
            }
        );

        assert!(DropEvent::from_value(&serde_json::json!({
            "source": {"key": "a"},
            "target": {"wrapper": "row"}
        }))
        .is_err());
    }

    #[test]
    fn unknown_source_is_a_lookup_failure() {
        let doc = doc_with_row();
        let event = drop(
            DragSource::Existing(k("ghost")),
            DropTarget::List {
                parent: None,
                index: 0,
            },
        );
        assert!(plan_drop(&doc, &event, &EditorConfig::default())
            .unwrap_err()
            .is_lookup());
    }
}
