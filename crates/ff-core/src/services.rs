//! Seams to the collaborators the engine does not implement: template
//! persistence, component generation and audio transcription.
//!
//! All seams are synchronous. An async host awaits its service outside the
//! core and then hands the result over; the document is whatever it is at
//! that moment (last writer wins).

use crate::document::FormDocument;
use crate::error::FormError;
use crate::ingest::{IngestReport, IngestTarget};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier handed out by a [`TemplateStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub u64);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template#{}", self.0)
    }
}

/// A stored form tree with its listing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTemplate {
    pub name: String,
    pub folder: String,
    pub tree: Value,
}

/// Persistence of whole form trees.
pub trait TemplateStore {
    fn save(&mut self, name: &str, folder: &str, tree: &Value) -> Result<TemplateId, FormError>;
    fn load(&self, id: TemplateId) -> Result<Value, FormError>;
    fn delete(&mut self, id: TemplateId) -> Result<(), FormError>;
    /// Delete every template in `folder`; returns how many went.
    fn delete_folder(&mut self, folder: &str) -> Result<usize, FormError>;
}

/// Produces candidate component objects from a natural-language
/// instruction and the current tree.
pub trait ComponentGenerator {
    fn generate(&mut self, instruction: &str, context: &Value) -> Result<Vec<Value>, FormError>;
}

/// Turns recorded audio into text.
pub trait Transcriber {
    fn transcribe(&mut self, audio: &[u8]) -> Result<String, FormError>;
}

/// In-process [`TemplateStore`], used by tests and the browser demo.
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateStore {
    templates: BTreeMap<TemplateId, StoredTemplate>,
    next_id: u64,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Templates in `folder`, oldest first.
    pub fn list(&self, folder: &str) -> Vec<(TemplateId, &str)> {
        self.templates
            .iter()
            .filter(|(_, t)| t.folder == folder)
            .map(|(id, t)| (*id, t.name.as_str()))
            .collect()
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn save(&mut self, name: &str, folder: &str, tree: &Value) -> Result<TemplateId, FormError> {
        if !matches!(tree.get("components"), Some(Value::Array(_))) {
            return Err(FormError::Invalid(
                "template is missing a `components` array".into(),
            ));
        }
        self.next_id += 1;
        let id = TemplateId(self.next_id);
        self.templates.insert(
            id,
            StoredTemplate {
                name: name.to_string(),
                folder: folder.to_string(),
                tree: tree.clone(),
            },
        );
        log::debug!("templates: saved `{name}` in `{folder}` as {id}");
        Ok(id)
    }

    fn load(&self, id: TemplateId) -> Result<Value, FormError> {
        self.templates
            .get(&id)
            .map(|t| t.tree.clone())
            .ok_or_else(|| FormError::Service(format!("{id} does not exist")))
    }

    fn delete(&mut self, id: TemplateId) -> Result<(), FormError> {
        self.templates
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| FormError::Service(format!("{id} does not exist")))
    }

    fn delete_folder(&mut self, folder: &str) -> Result<usize, FormError> {
        let before = self.templates.len();
        self.templates.retain(|_, t| t.folder != folder);
        Ok(before - self.templates.len())
    }
}

impl FormDocument {
    pub fn save_template(
        &self,
        store: &mut dyn TemplateStore,
        name: &str,
        folder: &str,
    ) -> Result<TemplateId, FormError> {
        store.save(name, folder, &self.to_value())
    }

    /// Load a stored template as a fresh document.
    pub fn load_template(store: &dyn TemplateStore, id: TemplateId) -> Result<Self, FormError> {
        FormDocument::from_value(&store.load(id)?)
    }

    /// Ask `generator` for components and ingest them into `target`.
    /// The generator sees the preview form of the tree.
    pub fn generate_into(
        &mut self,
        generator: &mut dyn ComponentGenerator,
        instruction: &str,
        target: IngestTarget,
    ) -> Result<IngestReport, FormError> {
        let candidates = generator.generate(instruction, &self.project_preview())?;
        self.ingest_batch(&candidates, target)
    }
}
