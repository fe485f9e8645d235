//! Editor session: the document being edited plus everything the builder
//! UI shows around it.
//!
//! Every edit goes through the command stack. Failures never escape as
//! panics or half-applied trees; they become transient notices the UI
//! shows and then takes.

use crate::commands::{CommandOutcome, CommandStack, EditCommand};
use crate::config::EditorConfig;
use crate::dnd::{DropEvent, plan_drop};
use ff_core::error::FormError;
use ff_core::ingest::{IngestReport, IngestTarget};
use ff_core::key::ComponentKey;
use ff_core::lint::{LintDiagnostic, lint_document};
use ff_core::project::{ComponentCounts, OutlineEntry};
use ff_core::services::{ComponentGenerator, TemplateId, TemplateStore, Transcriber};
use ff_core::FormDocument;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Nothing happened, e.g. the component was already gone.
    Info,
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn from_error(err: &FormError) -> Self {
        let level = if err.is_lookup() {
            NoticeLevel::Info
        } else {
            NoticeLevel::Error
        };
        Notice {
            level,
            message: err.to_string(),
        }
    }
}

pub struct EditorSession {
    doc: FormDocument,
    config: EditorConfig,
    stack: CommandStack,
    notices: Vec<Notice>,
    /// Instruction for the next generation request.
    pending_instruction: String,
    /// Preview of the current tree; `None` after any change.
    preview: Option<Value>,
    counts: ComponentCounts,
}

impl EditorSession {
    pub fn new(config: EditorConfig) -> Self {
        let config = config.clamped();
        let doc = FormDocument::with_actions(config.actions.clone());
        Self::with_document(doc, config)
    }

    /// Open a saved form.
    pub fn from_json(src: &str, config: EditorConfig) -> Result<Self, FormError> {
        let config = config.clamped();
        let mut doc = FormDocument::from_json(src)?;
        doc.set_actions(config.actions.clone());
        Ok(Self::with_document(doc, config))
    }

    fn with_document(doc: FormDocument, config: EditorConfig) -> Self {
        let stack = CommandStack::new(config.undo_depth).with_quiz_sync(config.sync_quizzes);
        let counts = doc.counts();
        Self {
            doc,
            config,
            stack,
            notices: Vec::new(),
            pending_instruction: String::new(),
            preview: None,
            counts,
        }
    }

    pub fn document(&self) -> &FormDocument {
        &self.doc
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    // ─── Editing ─────────────────────────────────────────────────────────

    /// Run one command. A failure leaves the tree as it was and is also
    /// recorded as a notice.
    pub fn apply(&mut self, command: EditCommand) -> Result<CommandOutcome, FormError> {
        let result = self.stack.execute(&mut self.doc, command);
        self.after(result)
    }

    /// Wrap a component in the configured number of columns.
    pub fn wrap_in_columns(&mut self, key: ComponentKey) -> Result<CommandOutcome, FormError> {
        self.apply(EditCommand::WrapInColumns {
            key,
            count: self.config.wrap_columns,
        })
    }

    /// Apply a finished drag as one undo step.
    pub fn drop(&mut self, event: &DropEvent) -> Result<Vec<CommandOutcome>, FormError> {
        let result = self.run_drop(event);
        self.after(result)
    }

    fn run_drop(&mut self, event: &DropEvent) -> Result<Vec<CommandOutcome>, FormError> {
        let plan = plan_drop(&self.doc, event, &self.config)?;
        if plan.is_empty() {
            return Ok(Vec::new());
        }
        self.stack.begin_batch(&self.doc, "move")?;
        let mut outcomes = Vec::with_capacity(plan.len());
        for command in plan {
            match self.stack.execute(&mut self.doc, command) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    self.stack.cancel_batch(&mut self.doc)?;
                    return Err(err);
                }
            }
        }
        self.stack.end_batch(&self.doc)?;
        Ok(outcomes)
    }

    pub fn undo(&mut self) -> Option<String> {
        let result = self.stack.undo(&mut self.doc);
        self.after(result).ok().flatten()
    }

    pub fn redo(&mut self) -> Option<String> {
        let result = self.stack.redo(&mut self.doc);
        self.after(result).ok().flatten()
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    /// Record a failure as a notice and refresh derived state.
    fn after<T>(&mut self, result: Result<T, FormError>) -> Result<T, FormError> {
        match &result {
            Ok(_) => self.changed(),
            Err(err) => {
                log::warn!("session: {err}");
                self.notices.push(Notice::from_error(err));
            }
        }
        result
    }

    fn changed(&mut self) {
        self.preview = None;
        self.counts = self.doc.counts();
    }

    // ─── Whole-form I/O ──────────────────────────────────────────────────

    /// Replace the form with `src`. History is dropped.
    pub fn load_json(&mut self, src: &str) -> Result<(), FormError> {
        let result = FormDocument::from_json(src).map(|doc| self.replace(doc));
        self.after(result)
    }

    pub fn export_json(&self) -> Result<String, FormError> {
        self.doc.to_json_pretty()
    }

    pub fn save_template(
        &mut self,
        store: &mut dyn TemplateStore,
        name: &str,
        folder: &str,
    ) -> Result<TemplateId, FormError> {
        let result = self.doc.save_template(store, name, folder);
        self.after(result)
    }

    pub fn load_template(
        &mut self,
        store: &dyn TemplateStore,
        id: TemplateId,
    ) -> Result<(), FormError> {
        let result = FormDocument::load_template(store, id).map(|doc| self.replace(doc));
        self.after(result)
    }

    fn replace(&mut self, mut doc: FormDocument) {
        doc.set_actions(self.config.actions.clone());
        self.doc = doc;
        self.stack.clear();
    }

    // ─── Generation ──────────────────────────────────────────────────────

    pub fn instruction(&self) -> &str {
        &self.pending_instruction
    }

    pub fn set_instruction(&mut self, instruction: &str) {
        self.pending_instruction = instruction.to_string();
    }

    /// Transcribe a recording and put the text in front of the pending
    /// instruction.
    pub fn prepend_transcription(
        &mut self,
        transcriber: &mut dyn Transcriber,
        audio: &[u8],
    ) -> Result<(), FormError> {
        let result = transcriber.transcribe(audio).map(|text| {
            let text = text.trim();
            if text.is_empty() {
                return;
            }
            self.pending_instruction = if self.pending_instruction.is_empty() {
                text.to_string()
            } else {
                format!("{text} {}", self.pending_instruction)
            };
        });
        self.after(result)
    }

    /// Ask `generator` for components from the pending instruction and
    /// ingest them into `target` as one undo step. The instruction is
    /// cleared once the components are in.
    pub fn generate(
        &mut self,
        generator: &mut dyn ComponentGenerator,
        target: IngestTarget,
    ) -> Result<IngestReport, FormError> {
        let instruction = self.pending_instruction.trim().to_string();
        if instruction.is_empty() {
            return self.after(Err(FormError::Invalid("the instruction is empty".into())));
        }
        let context = self.preview().clone();
        let result = generator
            .generate(&instruction, &context)
            .and_then(|candidates| {
                self.stack.execute(
                    &mut self.doc,
                    EditCommand::Ingest { candidates, target },
                )
            })
            .and_then(|outcome| match outcome {
                CommandOutcome::Ingested(report) => Ok(report),
                other => Err(FormError::Invalid(format!("unexpected outcome {other:?}"))),
            });
        let report = self.after(result)?;
        if report.dropped > 0 {
            self.notices.push(Notice {
                level: NoticeLevel::Info,
                message: format!("{} generated component(s) were not recognized", report.dropped),
            });
        }
        self.pending_instruction.clear();
        Ok(report)
    }

    // ─── Views ───────────────────────────────────────────────────────────

    /// The live preview tree, cached until the next change.
    pub fn preview(&mut self) -> &Value {
        let doc = &self.doc;
        self.preview.get_or_insert_with(|| doc.project_preview())
    }

    pub fn counts(&self) -> &ComponentCounts {
        &self.counts
    }

    pub fn outline(&self) -> Vec<OutlineEntry> {
        self.doc.outline()
    }

    pub fn lint(&self) -> Vec<LintDiagnostic> {
        lint_document(&self.doc)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Hand the pending notices to the UI.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
