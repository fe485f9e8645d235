//! Import/export of whole forms and single components.
//!
//! A form on the wire is `{"components": [...], ...}`; any other top-level
//! fields are kept and written back. Bundle markers are absorbed into the
//! bundle table on import and emitted again on export.

use crate::bundle::{DRIVER_FLAG, DRIVER_KEY_FIELD};
use crate::codec::{decode_component, decode_components, encode_components};
use crate::document::FormDocument;
use crate::error::FormError;
use crate::key::ComponentKey;
use crate::locate;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// What [`FormDocument::import_json`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// A full form replaced the document.
    Replaced { components: usize },
    /// A single component was appended to the root.
    Appended(ComponentKey),
}

impl FormDocument {
    /// Parse a full form.
    pub fn from_json(src: &str) -> Result<Self, FormError> {
        let value: Value = serde_json::from_str(src)?;
        Self::from_value(&value)
    }

    /// Build a document from a full form object.
    ///
    /// Every key is registered before anything else is allocated. A key
    /// seen twice keeps its first (pre-order) holder; later holders and
    /// components without a key get fresh keys.
    pub fn from_value(value: &Value) -> Result<Self, FormError> {
        let Value::Object(map) = value else {
            return Err(FormError::Invalid("form must be a JSON object".into()));
        };
        let Some(Value::Array(items)) = map.get("components") else {
            return Err(FormError::Invalid(
                "form is missing a `components` array".into(),
            ));
        };
        let components = decode_components(items)?;
        let mut extra = map.clone();
        extra.remove("components");

        let mut doc = FormDocument {
            components,
            extra,
            ..FormDocument::default()
        };
        let duplicates = doc.registry.register_tree(&doc.components);
        let unkeyed = doc.registry.release(ComponentKey::intern(""));
        if !duplicates.is_empty() || unkeyed {
            doc.rekey_imported();
        }
        doc.absorb_bundle_markers();
        log::debug!("import: {} component(s)", doc.len());
        Ok(doc)
    }

    fn rekey_imported(&mut self) {
        let mut seen: HashSet<ComponentKey> = HashSet::new();
        let registry = &mut self.registry;
        locate::walk_mut(&mut self.components, &mut |c| {
            if c.key.is_empty() {
                c.key = registry.generate_unique_key(&c.label);
            } else if seen.contains(&c.key) {
                let fresh = registry.generate_prefixed_key(c.key.as_str());
                log::warn!("import: duplicate key `{}` re-keyed to `{fresh}`", c.key);
                c.key = fresh;
            }
            seen.insert(c.key);
        });
    }

    /// The wire form, bundle markers included.
    pub fn to_value(&self) -> Value {
        let mut out = self.extra.clone();
        out.insert(
            "components".into(),
            Value::Array(encode_components(&self.components, Some(&self.bundles))),
        );
        Value::Object(out)
    }

    pub fn to_json_pretty(&self) -> Result<String, FormError> {
        Ok(serde_json::to_string_pretty(&self.to_value())?)
    }

    /// Import either a full form (replaces the document, fresh registry)
    /// or a single component with a `type` (appended to the root, colliding
    /// keys replaced). Nothing changes on error.
    pub fn import_json(&mut self, src: &str) -> Result<ImportOutcome, FormError> {
        let value: Value = serde_json::from_str(src)?;
        self.import_value(&value)
    }

    pub fn import_value(&mut self, value: &Value) -> Result<ImportOutcome, FormError> {
        let Value::Object(map) = value else {
            return Err(FormError::Invalid("import must be a JSON object".into()));
        };
        if map.contains_key("type") {
            let mut component = decode_component(value)?;
            locate::walk_mut(std::slice::from_mut(&mut component), &mut |c| {
                strip_markers(&mut c.extra);
            });
            self.adopt(&mut component);
            let key = component.key;
            self.components.push(component);
            self.compact_bundles();
            return Ok(ImportOutcome::Appended(key));
        }
        if map.contains_key("components") {
            let mut doc = FormDocument::from_value(value)?;
            doc.actions = std::mem::take(&mut self.actions);
            *self = doc;
            return Ok(ImportOutcome::Replaced {
                components: self.len(),
            });
        }
        Err(FormError::Invalid(
            "expected a form with `components` or a component with `type`".into(),
        ))
    }
}

fn strip_markers(extra: &mut Map<String, Value>) {
    extra.remove(DRIVER_KEY_FIELD);
    extra.remove(DRIVER_FLAG);
}
