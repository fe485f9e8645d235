//! WASM bridge for FormForge: exposes the form editing engine to the
//! browser builder.
//!
//! Compiled via `wasm-pack build --target web`. Structured values cross
//! the boundary as JSON strings; calls that can fail answer
//! `{"ok":true,…}` or `{"ok":false,"error":"…"}`.

use ff_core::error::FormError;
use ff_core::ingest::{IngestReport, IngestTarget};
use ff_core::key::ComponentKey;
use ff_core::lint::lint_document;
use ff_core::services::{
    ComponentGenerator, MemoryTemplateStore, TemplateId, TemplateStore, Transcriber,
};
use ff_core::{FormDocument, ImportOutcome};
use ff_editor::{CommandOutcome, DropEvent, EditCommand, EditorConfig, EditorSession};
use serde_json::{Value, json};
use wasm_bindgen::prelude::*;

/// The builder's editing controller.
///
/// Holds the editor session and an in-page template shelf. All edits from
/// the builder UI go through this struct.
#[wasm_bindgen]
pub struct FormEditor {
    session: EditorSession,
    templates: MemoryTemplateStore,
}

#[wasm_bindgen]
impl FormEditor {
    /// Create an editor with an empty form. `config_json` may be empty.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Self {
        // Set up panic hook for better error messages in console
        console_error_panic_hook_setup();

        let config = if config_json.trim().is_empty() {
            EditorConfig::default()
        } else {
            EditorConfig::from_json(config_json).unwrap_or_else(|err| {
                log::warn!("editor config ignored: {err}");
                EditorConfig::default()
            })
        };
        Self {
            session: EditorSession::new(config),
            templates: MemoryTemplateStore::new(),
        }
    }

    /// Replace the form. Returns `true` on success; the old form stays
    /// otherwise.
    pub fn load_json(&mut self, json: &str) -> bool {
        self.session.load_json(json).is_ok()
    }

    pub fn export_json(&self) -> String {
        reply(self.session.export_json().map(|form| json!({ "form": form })))
    }

    /// Run one command, e.g. `{"op":"delete","key":"name"}`.
    pub fn apply(&mut self, command_json: &str) -> String {
        let result = parse(command_json)
            .and_then(|v| EditCommand::from_value(&v))
            .and_then(|command| self.session.apply(command));
        reply(result.map(|outcome| json!({ "outcome": outcome_to_value(&outcome) })))
    }

    /// Apply a finished drag.
    pub fn drop_component(&mut self, event_json: &str) -> String {
        let result = parse(event_json)
            .and_then(|v| DropEvent::from_value(&v))
            .and_then(|event| self.session.drop(&event));
        reply(result.map(|outcomes| {
            json!({ "outcomes": outcomes.iter().map(outcome_to_value).collect::<Vec<_>>() })
        }))
    }

    pub fn undo(&mut self) -> bool {
        self.session.undo().is_some()
    }

    pub fn redo(&mut self) -> bool {
        self.session.redo().is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.session.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.session.can_redo()
    }

    // ─── Views ───────────────────────────────────────────────────────────

    pub fn preview_json(&mut self) -> String {
        self.session.preview().to_string()
    }

    pub fn counts_json(&self) -> String {
        to_json(self.session.counts())
    }

    pub fn outline_json(&self) -> String {
        to_json(&self.session.outline())
    }

    pub fn lint_json(&self) -> String {
        to_json(&self.session.lint())
    }

    /// Pending notices, oldest first. Each is returned once.
    pub fn take_notices_json(&mut self) -> String {
        to_json(&self.session.take_notices())
    }

    // ─── Generation ──────────────────────────────────────────────────────

    pub fn set_instruction(&mut self, instruction: &str) {
        self.session.set_instruction(instruction);
    }

    pub fn instruction(&self) -> String {
        self.session.instruction().to_string()
    }

    /// Put transcribed speech in front of the pending instruction.
    pub fn prepend_transcript(&mut self, text: &str) -> bool {
        let mut transcript = Transcript(text.to_string());
        self.session
            .prepend_transcription(&mut transcript, &[])
            .is_ok()
    }

    /// Ingest components the page fetched for the pending instruction.
    /// `parent` is a container key (empty for the root); a non-negative
    /// `column` targets that column of `parent` instead.
    pub fn ingest_generated(&mut self, candidates_json: &str, parent: &str, column: i32) -> String {
        let result = parse(candidates_json).and_then(|value| {
            let candidates = match value {
                Value::Array(items) => items,
                single => vec![single],
            };
            let target = ingest_target(parent, column);
            self.session.generate(&mut Fetched(Some(candidates)), target)
        });
        reply(result.map(|report| json!({ "report": report_to_value(&report) })))
    }

    // ─── Templates ───────────────────────────────────────────────────────

    pub fn save_template(&mut self, name: &str, folder: &str) -> String {
        let result = self.session.save_template(&mut self.templates, name, folder);
        reply(result.map(|id| json!({ "id": id })))
    }

    pub fn load_template(&mut self, id: u64) -> bool {
        self.session
            .load_template(&self.templates, TemplateId(id))
            .is_ok()
    }

    pub fn delete_template(&mut self, id: u64) -> bool {
        self.templates.delete(TemplateId(id)).is_ok()
    }

    pub fn delete_template_folder(&mut self, folder: &str) -> usize {
        self.templates.delete_folder(folder).unwrap_or(0)
    }

    pub fn list_templates_json(&self, folder: &str) -> String {
        let listing: Vec<Value> = self
            .templates
            .list(folder)
            .into_iter()
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect();
        Value::Array(listing).to_string()
    }
}

/// Candidates already fetched by the page, handed over once.
struct Fetched(Option<Vec<Value>>);

impl ComponentGenerator for Fetched {
    fn generate(&mut self, _: &str, _: &Value) -> Result<Vec<Value>, FormError> {
        self.0
            .take()
            .ok_or_else(|| FormError::Service("generated components were already used".into()))
    }
}

/// Speech the page transcribed already.
struct Transcript(String);

impl Transcriber for Transcript {
    fn transcribe(&mut self, _: &[u8]) -> Result<String, FormError> {
        Ok(std::mem::take(&mut self.0))
    }
}

fn ingest_target(parent: &str, column: i32) -> IngestTarget {
    let parent = (!parent.is_empty()).then(|| ComponentKey::intern(parent));
    match (parent, usize::try_from(column)) {
        (Some(wrapper), Ok(column)) => IngestTarget::Column { wrapper, column },
        (parent, _) => IngestTarget::List(parent),
    }
}

fn parse(src: &str) -> Result<Value, FormError> {
    Ok(serde_json::from_str(src)?)
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        json!({ "ok": false, "error": format!("Serialization error: {e}") }).to_string()
    })
}

/// `{"ok":true, …fields}` or `{"ok":false,"error":"…"}`.
fn reply(result: Result<Value, FormError>) -> String {
    match result {
        Ok(Value::Object(fields)) => {
            let mut out = serde_json::Map::new();
            out.insert("ok".into(), Value::Bool(true));
            out.extend(fields);
            Value::Object(out).to_string()
        }
        Ok(_) => json!({ "ok": true }).to_string(),
        Err(e) => json!({ "ok": false, "error": e.to_string() }).to_string(),
    }
}

fn outcome_to_value(outcome: &CommandOutcome) -> Value {
    match outcome {
        CommandOutcome::Done => json!({ "kind": "done" }),
        CommandOutcome::Created(key) => json!({ "kind": "created", "key": key }),
        CommandOutcome::Removed(keys) => json!({ "kind": "removed", "keys": keys }),
        CommandOutcome::Displaced(keys) => json!({ "kind": "displaced", "keys": keys }),
        CommandOutcome::Renamed(key) => json!({ "kind": "renamed", "key": key }),
        CommandOutcome::Column(index) => json!({ "kind": "column", "index": index }),
        CommandOutcome::Actions(enabled) => json!({ "kind": "actions", "enabled": enabled }),
        CommandOutcome::Ingested(report) => {
            json!({ "kind": "ingested", "report": report_to_value(report) })
        }
        CommandOutcome::Imported(ImportOutcome::Replaced { components }) => {
            json!({ "kind": "replaced", "components": components })
        }
        CommandOutcome::Imported(ImportOutcome::Appended(key)) => {
            json!({ "kind": "appended", "key": key })
        }
    }
}

fn report_to_value(report: &IngestReport) -> Value {
    json!({
        "patched": report.patched,
        "created": report.created,
        "rehomed": report.rehomed,
        "dropped": report.dropped,
    })
}

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("FormForge WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

// ─── Standalone functions (no editor needed) ─────────────────────────────

/// Check a form. Returns JSON `{"ok":true,"diagnostics":[...]}` or
/// `{"ok":false,"error":"..."}`.
#[wasm_bindgen]
pub fn validate(source: &str) -> String {
    let result = FormDocument::from_json(source).map(|doc| {
        let diagnostics = lint_document(&doc);
        json!({ "diagnostics": diagnostics })
    });
    reply(result)
}

/// Preview tree of a form, internal fields stripped.
/// Returns JSON `{"ok":true,"preview":{...}}` or `{"ok":false,"error":"..."}`.
#[wasm_bindgen]
pub fn preview_form(source: &str) -> String {
    reply(FormDocument::from_json(source).map(|doc| json!({ "preview": doc.project_preview() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reply_of(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn validate_reports_ok_and_errors() {
        let ok = reply_of(&validate(r#"{"components": [{"type": "textarea", "key": "a"}]}"#));
        assert_eq!(ok["ok"], true);
        assert_eq!(ok["diagnostics"], json!([]));

        let bad = reply_of(&validate(r#"{"components": [{"key": "a"}]}"#));
        assert_eq!(bad["ok"], false);
        assert!(bad["error"].as_str().unwrap().contains("type"));
    }

    #[test]
    fn editor_round_trip_through_json() {
        let mut editor = FormEditor::new(r#"{"undoDepth": 5}"#);
        let out = reply_of(&editor.apply(
            r#"{"op": "create", "type": "radio", "label": "Smoker", "options": ["Yes", "No"]}"#,
        ));
        assert_eq!(out["outcome"], json!({"kind": "created", "key": "smoker"}));

        let out = reply_of(&editor.apply(r#"{"op": "toggleActions", "owner": "smoker", "enable": true}"#));
        assert_eq!(out["outcome"]["enabled"], true);
        let counts = reply_of(&editor.counts_json());
        assert_eq!(counts["bundles"], 1);

        assert!(editor.undo());
        assert_eq!(reply_of(&editor.counts_json())["bundles"], 0);

        let err = reply_of(&editor.apply(r#"{"op": "delete", "key": "ghost"}"#));
        assert_eq!(err["ok"], false);
        let notices = reply_of(&editor.take_notices_json());
        assert_eq!(notices[0]["level"], "info");
    }

    #[test]
    fn generated_components_arrive_as_json() {
        let mut editor = FormEditor::new("");
        editor.set_instruction("add contact fields");
        let out = reply_of(&editor.ingest_generated(
            r#"[{"type": "textfield", "key": "email", "label": "Email"}, {"type": "laser"}]"#,
            "",
            -1,
        ));
        assert_eq!(out["report"]["created"], json!(["email"]));
        assert_eq!(out["report"]["dropped"], 1);
        assert_eq!(editor.instruction(), "");
    }

    #[test]
    fn template_shelf() {
        let mut editor = FormEditor::new("");
        editor.apply(r#"{"op": "create", "type": "textarea", "label": "Notes"}"#);
        let saved = reply_of(&editor.save_template("Notes form", "drafts"));
        let id = saved["id"].as_u64().unwrap();
        let listing = reply_of(&editor.list_templates_json("drafts"));
        assert_eq!(listing, json!([{"id": id, "name": "Notes form"}]));

        assert!(editor.load_json(r#"{"components": []}"#));
        assert!(editor.load_template(id));
        assert_eq!(reply_of(&editor.counts_json())["total"], 1);
        assert_eq!(editor.delete_template_folder("drafts"), 1);
        assert!(!editor.delete_template(id));
    }
}
