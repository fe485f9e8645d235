//! Preview projection: what the live preview and the palette counters show.
//!
//! The preview is the wire tree without the bundle markers. Other fields,
//! `_`-prefixed ones included, pass through untouched. Actions drivers are
//! listed nowhere but the preview itself.

use crate::bundle::{DRIVER_FLAG, DRIVER_KEY_FIELD};
use crate::codec::encode_components;
use crate::document::FormDocument;
use crate::key::ComponentKey;
use crate::locate::{self, ComponentPath};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-kind component counts, actions drivers excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentCounts {
    pub total: usize,
    /// Input components.
    pub fields: usize,
    pub containers: usize,
    /// Columns wrappers and static content.
    pub layouts: usize,
    /// Owners with actions enabled.
    pub bundles: usize,
    pub by_type: BTreeMap<&'static str, usize>,
}

/// One row of the structure outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineEntry {
    pub key: ComponentKey,
    pub label: String,
    #[serde(rename = "type")]
    pub ty: &'static str,
    pub depth: usize,
    pub path: String,
    pub has_actions: bool,
}

impl FormDocument {
    /// The display form of the tree: `{components: [...]}` plus the form's
    /// top-level fields, bundle markers stripped at every level.
    pub fn project_preview(&self) -> Value {
        let mut out = self.extra.clone();
        out.insert(
            "components".into(),
            Value::Array(encode_components(&self.components, None)),
        );
        let mut preview = Value::Object(out);
        strip_markers(&mut preview);
        preview
    }

    pub fn counts(&self) -> ComponentCounts {
        let mut counts = ComponentCounts {
            bundles: self.bundles.len(),
            ..ComponentCounts::default()
        };
        locate::walk(&self.components, &mut |_, c| {
            if self.bundles.owner_of_driver(c.key).is_some() {
                return;
            }
            let ty = c.component_type();
            counts.total += 1;
            if ty.is_container() {
                counts.containers += 1;
            } else if ty.is_layout() {
                counts.layouts += 1;
            } else {
                counts.fields += 1;
            }
            *counts.by_type.entry(ty.as_str()).or_default() += 1;
        });
        counts
    }

    /// Pre-order outline of the tree, actions drivers excluded.
    pub fn outline(&self) -> Vec<OutlineEntry> {
        let mut entries = Vec::new();
        locate::walk(&self.components, &mut |path: &ComponentPath, c| {
            if self.bundles.owner_of_driver(c.key).is_some() {
                return;
            }
            entries.push(OutlineEntry {
                key: c.key,
                label: c.label.clone(),
                ty: c.component_type().as_str(),
                depth: path.depth().saturating_sub(1),
                path: path.to_string(),
                has_actions: self.bundles.get(c.key).is_some(),
            });
        });
        entries
    }
}

/// Walk the component lists (`components`, `columns[].components`) and drop
/// the bundle markers. Field values are never descended into.
fn strip_markers(value: &mut Value) {
    let Value::Object(map) = value else {
        return;
    };
    map.remove(DRIVER_KEY_FIELD);
    map.remove(DRIVER_FLAG);
    if let Some(Value::Array(children)) = map.get_mut("components") {
        children.iter_mut().for_each(strip_markers);
    }
    if let Some(Value::Array(columns)) = map.get_mut("columns") {
        for column in columns {
            if let Some(Value::Array(children)) = column.get_mut("components") {
                children.iter_mut().for_each(strip_markers);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ComponentType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc_with_actions() -> FormDocument {
        let mut doc = FormDocument::new();
        let q = doc
            .create(ComponentType::TextArea, "Question", &[], false, None)
            .unwrap();
        doc.toggle_actions(q, true).unwrap();
        let group = doc
            .create(ComponentType::Fieldset, "Group", &[], false, None)
            .unwrap();
        doc.create(ComponentType::Number, "Age", &[], false, Some(group))
            .unwrap();
        doc
    }

    #[test]
    fn preview_has_no_internal_fields() {
        let doc = doc_with_actions();
        let preview = doc.project_preview().to_string();
        assert!(!preview.contains("_actionsDriver"));
        assert!(doc.to_value().to_string().contains("_actionsDriverKey"));
    }

    #[test]
    fn preview_keeps_user_underscore_fields() {
        let doc = FormDocument::from_value(&json!({
            "components": [{"type": "fieldset", "key": "g", "components": [
                {"type": "textarea", "key": "t", "_draft": true, "tooltip": "hi",
                 "properties": {"_source": "crm"}}
            ]}]
        }))
        .unwrap();
        let preview = doc.project_preview();
        let inner = &preview["components"][0]["components"][0];
        assert_eq!(inner["_draft"], true);
        assert_eq!(inner["properties"]["_source"], "crm");
        assert_eq!(inner["tooltip"], "hi");
    }

    #[test]
    fn preview_strips_markers_inside_columns() {
        let mut doc = FormDocument::from_value(&json!({
            "components": [{"type": "columns", "key": "row", "columns": [
                {"width": 6, "components": [
                    {"type": "radio", "key": "pick", "label": "Pick",
                     "values": [{"label": "A", "value": "a"}]}
                ]},
                {"width": 6, "components": [{"type": "textarea", "key": "other"}]}
            ]}]
        }))
        .unwrap();
        doc.toggle_actions(ComponentKey::intern("pick"), true).unwrap();
        assert!(doc.to_value().to_string().contains("_actionsDriverKey"));
        let preview = doc.project_preview().to_string();
        assert!(!preview.contains("_actionsDriver"));
    }

    #[test]
    fn counts_skip_drivers() {
        let counts = doc_with_actions().counts();
        // question, comment follower, group, age
        assert_eq!(counts.total, 4);
        assert_eq!(counts.fields, 3);
        assert_eq!(counts.containers, 1);
        assert_eq!(counts.bundles, 1);
        assert_eq!(counts.by_type.get("radio"), None);
        assert_eq!(counts.by_type["textarea"], 2);
    }

    #[test]
    fn outline_reports_depth_and_actions() {
        let outline = doc_with_actions().outline();
        let rows: Vec<(&str, usize, bool)> = outline
            .iter()
            .map(|e| (e.key.as_str(), e.depth, e.has_actions))
            .collect();
        assert_eq!(
            rows,
            [
                ("question", 0, true),
                ("comment", 0, false),
                ("group", 0, false),
                ("age", 1, false),
            ]
        );
    }
}
