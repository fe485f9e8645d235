//! Ingest: fold externally generated component objects into the tree.
//!
//! A candidate whose key is already in the tree patches that component in
//! place. A new fieldset adopts the target's siblings it names, then takes
//! its new children. Anything else is built by the factory, overlaid with
//! the candidate's fields, and appended together with its nested children.
//! Running the same candidate twice leaves the tree as running it once.

use crate::codec::{decode_component, decode_quiz_child, encode_component};
use crate::document::FormDocument;
use crate::error::FormError;
use crate::factory::{create_component_with_key, empty_columns};
use crate::key::ComponentKey;
use crate::model::{Column, Component, ComponentKind, ComponentType, MAX_COLUMNS, MIN_COLUMNS};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Fields a patch never touches.
const STRUCTURAL_FIELDS: [&str; 4] = ["key", "type", "components", "columns"];

/// Where new components go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestTarget {
    /// A container's children, or the root for `None`. A columns wrapper
    /// takes new components in its first empty column (else its last).
    List(Option<ComponentKey>),
    Column { wrapper: ComponentKey, column: usize },
}

/// What an ingest did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub patched: Vec<ComponentKey>,
    pub created: Vec<ComponentKey>,
    /// Existing components moved into a newly created fieldset.
    pub rehomed: Vec<ComponentKey>,
    /// Candidates skipped for an unrecognized `type`.
    pub dropped: usize,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.patched.is_empty()
            && self.created.is_empty()
            && self.rehomed.is_empty()
            && self.dropped == 0
    }
}

impl FormDocument {
    /// Ingest one candidate into `target` (`None` = root).
    pub fn ingest(
        &mut self,
        candidate: &Value,
        target: Option<ComponentKey>,
    ) -> Result<IngestReport, FormError> {
        self.ingest_at(candidate, IngestTarget::List(target))
    }

    pub fn ingest_into_column(
        &mut self,
        candidate: &Value,
        wrapper: ComponentKey,
        column: usize,
    ) -> Result<IngestReport, FormError> {
        self.ingest_at(candidate, IngestTarget::Column { wrapper, column })
    }

    /// Ingest one candidate. All or nothing: on error the document is
    /// restored to its prior state.
    pub fn ingest_at(
        &mut self,
        candidate: &Value,
        target: IngestTarget,
    ) -> Result<IngestReport, FormError> {
        let backup = self.clone();
        let mut report = IngestReport::default();
        match self.ingest_one(candidate, target, &mut report) {
            Ok(()) => {
                self.compact_bundles();
                Ok(report)
            }
            Err(e) => {
                *self = backup;
                Err(e)
            }
        }
    }

    /// Ingest a generator's output. Candidates with an unrecognized `type`
    /// are skipped and counted; any other failure restores the document
    /// and fails the batch.
    pub fn ingest_batch(
        &mut self,
        candidates: &[Value],
        target: IngestTarget,
    ) -> Result<IngestReport, FormError> {
        let backup = self.clone();
        let mut report = IngestReport::default();
        for candidate in candidates {
            match self.ingest_one(candidate, target, &mut report) {
                Ok(()) => {}
                Err(FormError::UnknownType(ty)) => {
                    log::warn!("ingest: dropped candidate of unknown type `{ty}`");
                    report.dropped += 1;
                }
                Err(e) => {
                    *self = backup;
                    return Err(e);
                }
            }
        }
        self.compact_bundles();
        log::debug!(
            "ingest: batch of {} → {} created, {} patched, {} dropped",
            candidates.len(),
            report.created.len(),
            report.patched.len(),
            report.dropped
        );
        Ok(report)
    }

    fn ingest_one(
        &mut self,
        candidate: &Value,
        target: IngestTarget,
        report: &mut IngestReport,
    ) -> Result<(), FormError> {
        let Value::Object(map) = candidate else {
            return Err(FormError::Invalid("candidate must be a JSON object".into()));
        };
        let mut fields = map.clone();
        fields.retain(|k, _| !k.starts_with('_'));

        let key = fields
            .get("key")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .map(ComponentKey::intern);
        if let Some(key) = key {
            if self.contains(key) {
                self.patch(key, &fields)?;
                report.patched.push(key);
                return Ok(());
            }
        }

        let type_name = fields
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| FormError::Invalid("candidate is missing `type`".into()))?;
        let ty = ComponentType::parse(type_name)
            .ok_or_else(|| FormError::UnknownType(type_name.to_string()))?;

        if ty == ComponentType::Fieldset {
            self.ingest_fieldset(key, &fields, target, report)
        } else {
            self.ingest_new(ty, key, &fields, target, report)
        }
    }

    /// Nested candidates: unknown types are dropped, not fatal.
    fn ingest_child(
        &mut self,
        candidate: &Value,
        target: IngestTarget,
        report: &mut IngestReport,
    ) -> Result<(), FormError> {
        match self.ingest_one(candidate, target, report) {
            Err(FormError::UnknownType(ty)) => {
                log::warn!("ingest: dropped nested candidate of unknown type `{ty}`");
                report.dropped += 1;
                Ok(())
            }
            other => other,
        }
    }

    /// Shallow merge of `fields` into the component with `key`.
    fn patch(&mut self, key: ComponentKey, fields: &Map<String, Value>) -> Result<(), FormError> {
        let merged = merge_fields(self.get(key)?, fields)?;
        *self.get_mut(key)? = merged;
        self.sync_answer_row(key)?;
        log::debug!("ingest: patched `{key}`");
        Ok(())
    }

    fn ingest_fieldset(
        &mut self,
        key: Option<ComponentKey>,
        fields: &Map<String, Value>,
        target: IngestTarget,
        report: &mut IngestReport,
    ) -> Result<(), FormError> {
        let (parent, column) = self.resolve_ingest_target(target)?;
        let label = label_of(fields, ComponentType::Fieldset);
        let claimed = self.claim_key(key, &label);
        let base = create_component_with_key(ComponentType::Fieldset, claimed, &label, &[], false);
        let mut fieldset = merge_fields(&base, fields)?;

        let children: Vec<Value> = fields
            .get("components")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let named: HashSet<ComponentKey> = children
            .iter()
            .filter_map(|c| match c {
                Value::String(k) => Some(k.as_str()),
                Value::Object(o) => o.get("key").and_then(Value::as_str),
                _ => None,
            })
            .map(ComponentKey::intern)
            .collect();

        let siblings: Vec<ComponentKey> = self
            .child_list(parent, column)?
            .iter()
            .map(|c| c.key)
            .filter(|k| named.contains(k) && !self.bundles.is_member(*k))
            .collect();
        for sibling in siblings {
            let (_, unit) = self.take_unit(sibling)?;
            if let Some(list) = fieldset.children_mut() {
                list.extend(unit);
            }
            report.rehomed.push(sibling);
        }

        self.child_list_mut(parent, column)?.push(fieldset);
        report.created.push(claimed);
        log::debug!("ingest: created fieldset `{claimed}`");

        for child in children.iter().filter(|c| c.is_object()) {
            self.ingest_child(child, IngestTarget::List(Some(claimed)), report)?;
        }
        Ok(())
    }

    fn ingest_new(
        &mut self,
        ty: ComponentType,
        key: Option<ComponentKey>,
        fields: &Map<String, Value>,
        target: IngestTarget,
        report: &mut IngestReport,
    ) -> Result<(), FormError> {
        let (parent, column) = self.resolve_ingest_target(target)?;
        let label = label_of(fields, ty);
        let claimed = self.claim_key(key, &label);
        let base = create_component_with_key(ty, claimed, &label, &[], false);
        let mut component = merge_fields(&base, fields)?;

        let column_values: Vec<Value> = fields
            .get("columns")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if let ComponentKind::Columns { columns } = &mut component.kind {
            let n = column_values.len().clamp(MIN_COLUMNS, MAX_COLUMNS);
            *columns = empty_columns(n);
        }
        let is_container = component.is_container();

        self.child_list_mut(parent, column)?.push(component);
        report.created.push(claimed);
        log::debug!("ingest: created {} `{claimed}`", ty.as_str());

        if is_container {
            let children = fields.get("components").and_then(Value::as_array);
            for child in children.into_iter().flatten() {
                self.ingest_child(child, IngestTarget::List(Some(claimed)), report)?;
            }
        }
        for (i, column_value) in column_values.iter().take(MAX_COLUMNS).enumerate() {
            let children = column_value.get("components").and_then(Value::as_array);
            for child in children.into_iter().flatten() {
                let target = IngestTarget::Column {
                    wrapper: claimed,
                    column: i,
                };
                self.ingest_child(child, target, report)?;
            }
        }
        Ok(())
    }

    /// Prefer the candidate's own key; otherwise derive one from the label.
    ///
    /// A key no live component holds is taken verbatim even when an earlier
    /// delete spent it, so regenerating after an undo patches instead of
    /// duplicating. Only a live holder forces a suffix.
    fn claim_key(&mut self, key: Option<ComponentKey>, label: &str) -> ComponentKey {
        match key {
            Some(k) if !self.contains(k) => {
                self.registry.register(k);
                k
            }
            Some(k) => self.registry.ensure_globally_unique_key(k.as_str(), ""),
            None => self.registry.generate_unique_key(label),
        }
    }

    fn resolve_ingest_target(
        &self,
        target: IngestTarget,
    ) -> Result<(Option<ComponentKey>, Option<usize>), FormError> {
        match target {
            IngestTarget::List(None) => Ok((None, None)),
            IngestTarget::List(Some(key)) => {
                let owner = self.get(key)?;
                if let Some(columns) = owner.columns() {
                    let column = columns
                        .iter()
                        .position(Column::is_empty)
                        .unwrap_or(columns.len().saturating_sub(1));
                    self.child_list(Some(key), Some(column))?;
                    return Ok((Some(key), Some(column)));
                }
                self.child_list(Some(key), None)?;
                Ok((Some(key), None))
            }
            IngestTarget::Column { wrapper, column } => {
                self.child_list(Some(wrapper), Some(column))?;
                Ok((Some(wrapper), Some(column)))
            }
        }
    }
}

fn label_of(fields: &Map<String, Value>, ty: ComponentType) -> String {
    fields
        .get("label")
        .and_then(Value::as_str)
        .filter(|l| !l.is_empty())
        .map_or_else(|| ty.as_str().to_string(), str::to_string)
}

/// Overlay the candidate's non-structural fields on `base` and decode the
/// result. The key of `base` is kept.
fn merge_fields(base: &Component, fields: &Map<String, Value>) -> Result<Component, FormError> {
    let Value::Object(mut merged) = encode_component(base, None) else {
        return Err(FormError::Invalid("component did not encode to an object".into()));
    };
    // Candidate options replace select's `data.values` too.
    if fields.contains_key("values") {
        if let Some(Value::Object(data)) = merged.get_mut("data") {
            data.remove("values");
        }
    }
    for (k, v) in fields {
        if !STRUCTURAL_FIELDS.contains(&k.as_str()) {
            merged.insert(k.clone(), v.clone());
        }
    }
    let merged = Value::Object(merged);
    let mut component = if base.component_type() == ComponentType::AnswerKey {
        decode_quiz_child(&merged)?
    } else {
        decode_component(&merged)?
    };
    component.key = base.key;
    Ok(component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn k(s: &str) -> ComponentKey {
        ComponentKey::intern(s)
    }

    #[test]
    fn known_key_is_patched_in_place() {
        let mut doc = FormDocument::new();
        let radio = doc
            .create(ComponentType::Radio, "Q", &["A".into()], false, None)
            .unwrap();
        let report = doc
            .ingest(
                &json!({"key": "q", "type": "select", "label": "Question", "components": []}),
                None,
            )
            .unwrap();
        assert_eq!(report.patched, vec![radio]);
        let c = doc.find(radio).unwrap();
        assert_eq!(c.label, "Question");
        assert_eq!(c.component_type(), ComponentType::Radio);
        assert_eq!(c.choice().unwrap().options.len(), 1);
    }

    #[test]
    fn textfield_becomes_textarea_with_fields() {
        let mut doc = FormDocument::new();
        doc.ingest(
            &json!({
                "type": "textfield", "key": "email", "label": "Email",
                "placeholder": "you@example.com",
                "validate": {"required": true}
            }),
            None,
        )
        .unwrap();
        let c = doc.find(k("email")).unwrap();
        assert_eq!(c.component_type(), ComponentType::TextArea);
        assert!(c.validate.required);
        assert_eq!(
            c.kind,
            ComponentKind::TextArea {
                placeholder: Some("you@example.com".into())
            }
        );
    }

    #[test]
    fn new_fieldset_adopts_named_siblings() {
        let mut doc = FormDocument::new();
        for label in ["First", "Second", "Third"] {
            doc.create(ComponentType::TextArea, label, &[], false, None)
                .unwrap();
        }
        let report = doc
            .ingest(
                &json!({
                    "type": "fieldset", "key": "person", "label": "Person",
                    "components": [
                        {"key": "third"},
                        {"key": "first"},
                        {"type": "number", "key": "age", "label": "Age"}
                    ]
                }),
                None,
            )
            .unwrap();
        assert_eq!(report.rehomed, vec![k("first"), k("third")]);
        assert_eq!(report.created, vec![k("person"), k("age")]);
        let root: Vec<_> = doc.components().iter().map(|c| c.key.to_string()).collect();
        assert_eq!(root, ["second", "person"]);
        let inside: Vec<_> = doc
            .find(k("person"))
            .unwrap()
            .children()
            .unwrap()
            .iter()
            .map(|c| c.key.to_string())
            .collect();
        assert_eq!(inside, ["first", "third", "age"]);
    }

    #[test]
    fn nested_unknown_types_are_dropped() {
        let mut doc = FormDocument::new();
        let report = doc
            .ingest(
                &json!({
                    "type": "editgrid", "key": "items",
                    "components": [
                        {"type": "hologram", "key": "h"},
                        {"type": "number", "key": "qty"}
                    ]
                }),
                None,
            )
            .unwrap();
        assert_eq!(report.dropped, 1);
        assert!(doc.contains(k("qty")));
        assert!(!doc.contains(k("h")));
    }

    #[test]
    fn columns_candidates_fill_their_slots() {
        let mut doc = FormDocument::new();
        doc.ingest(
            &json!({
                "type": "columns", "key": "row",
                "columns": [
                    {"components": [{"type": "textarea", "key": "left"}]},
                    {"components": [{"type": "textarea", "key": "mid"}]},
                    {"components": [{"type": "textarea", "key": "right"}]}
                ]
            }),
            None,
        )
        .unwrap();
        let cols = doc.find(k("row")).unwrap().columns().unwrap();
        assert_eq!(cols.len(), 3);
        assert_eq!(cols[2].components[0].key, k("right"));
        assert!(cols.iter().all(|c| c.width == 4));
    }

    #[test]
    fn batch_filters_schema_drift() {
        let mut doc = FormDocument::new();
        let report = doc
            .ingest_batch(
                &[
                    json!({"type": "radio", "key": "r", "values": ["Yes", "No"]}),
                    json!({"type": "teleporter", "key": "t"}),
                    json!({"type": "content", "key": "c", "content": "<b>hi</b>"}),
                ],
                IngestTarget::List(None),
            )
            .unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(report.created, vec![k("r"), k("c")]);
        assert_eq!(
            doc.find(k("c")).unwrap().kind,
            ComponentKind::Content {
                html: "<b>hi</b>".into()
            }
        );
    }

    #[test]
    fn spent_key_is_reclaimed_verbatim() {
        let mut doc = FormDocument::new();
        let candidate = json!({"type": "textarea", "key": "email", "label": "Email"});
        doc.ingest(&candidate, None).unwrap();
        doc.delete_by_key(k("email")).unwrap();
        assert!(doc.registry().is_reserved(k("email")));

        let report = doc.ingest(&candidate, None).unwrap();
        assert_eq!(report.created, vec![k("email")]);
        let again = doc.ingest(&candidate, None).unwrap();
        assert_eq!(again.patched, vec![k("email")]);
        assert_eq!(doc.keys(), vec![k("email")]);
    }

    #[test]
    fn failure_restores_document() {
        let mut doc = FormDocument::new();
        doc.create(ComponentType::TextArea, "Leaf", &[], false, None)
            .unwrap();
        let before = doc.to_value();
        let err = doc
            .ingest(&json!({"type": "number", "key": "n"}), Some(k("leaf")))
            .unwrap_err();
        assert!(matches!(err, FormError::NotContainer(_)));
        assert_eq!(doc.to_value(), before);
        assert!(doc.ingest(&json!({"key": "nokind"}), None).is_err());
    }
}
