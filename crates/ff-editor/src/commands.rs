//! Edit commands and the undo/redo command stack.
//!
//! Every mutation of the document is an `EditCommand`. Commands run
//! all-or-nothing: the stack keeps a clone of the document while a command
//! runs and puts it back if the command fails.
//!
//! History uses **snapshot entries**: the MessagePack encoding of the tree
//! is captured before and after a command (or a whole batch, such as one
//! drop gesture), so undo/redo replaces the whole tree in a single step.

use ff_core::codec::{
    conditional_from_value, decode_component, options_from_value, validation_from_value,
};
use ff_core::error::FormError;
use ff_core::exchange::ImportOutcome;
use ff_core::ingest::{IngestReport, IngestTarget};
use ff_core::key::ComponentKey;
use ff_core::locate::ComponentPath;
use ff_core::model::{ChoiceOption, Component, ComponentType, Conditional, Validation};
use ff_core::FormDocument;
use serde_json::Value;

/// One edit of the form tree.
///
/// Components are addressed by key; keys survive the index shifts that
/// earlier commands in a batch cause.
#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    Create {
        ty: ComponentType,
        label: String,
        options: Vec<String>,
        hide_label: bool,
        parent: Option<ComponentKey>,
    },
    Insert {
        parent: Option<ComponentKey>,
        column: Option<usize>,
        index: usize,
        component: Box<Component>,
    },
    Delete {
        key: ComponentKey,
    },
    Move {
        key: ComponentKey,
        target: Option<ComponentKey>,
    },
    Reorder {
        parent: Option<ComponentKey>,
        from: usize,
        to: usize,
    },
    WrapInColumns {
        key: ComponentKey,
        count: usize,
    },
    MoveIntoColumn {
        key: ComponentKey,
        wrapper: ComponentKey,
        column: usize,
        /// Used when `key` is not in the tree (a palette drop).
        fallback: Option<Box<Component>>,
    },
    RemoveFromColumn {
        wrapper: ComponentKey,
        column: usize,
        prune: bool,
    },
    AddColumn {
        wrapper: ComponentKey,
    },
    MergeColumns {
        wrapper: ComponentKey,
        from: usize,
        into: usize,
    },
    TidyColumns {
        wrapper: ComponentKey,
    },
    RenameKey {
        key: ComponentKey,
        new_key: String,
    },
    RekeyFromLabel {
        key: ComponentKey,
        label: String,
    },
    SetLabel {
        key: ComponentKey,
        label: String,
    },
    SetHideLabel {
        key: ComponentKey,
        hide: bool,
    },
    SetDescription {
        key: ComponentKey,
        description: Option<String>,
    },
    ChangeType {
        key: ComponentKey,
        to: ComponentType,
    },
    SetOptions {
        key: ComponentKey,
        options: Vec<ChoiceOption>,
    },
    SetValidation {
        key: ComponentKey,
        validation: Validation,
    },
    SetDefaultValue {
        key: ComponentKey,
        values: Vec<String>,
    },
    SetCalculateValue {
        key: ComponentKey,
        formula: Option<String>,
    },
    SetHtml {
        key: ComponentKey,
        html: String,
    },
    SetConditional {
        key: ComponentKey,
        conditional: Option<Conditional>,
    },
    ToggleActions {
        owner: ComponentKey,
        enable: bool,
    },
    AddFollower {
        owner: ComponentKey,
        label: String,
        eq: String,
    },
    SyncAnswerKey {
        quiz: ComponentKey,
    },
    Ingest {
        candidates: Vec<Value>,
        target: IngestTarget,
    },
    Import {
        json: String,
    },
}

/// What a successful command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Done,
    /// Key of a new (or wrapping) component.
    Created(ComponentKey),
    /// Keys of every component removed.
    Removed(Vec<ComponentKey>),
    /// Former occupants re-homed by a column drop.
    Displaced(Vec<ComponentKey>),
    Renamed(ComponentKey),
    /// Index of a new column.
    Column(usize),
    /// Whether actions are now enabled.
    Actions(bool),
    Ingested(IngestReport),
    Imported(ImportOutcome),
}

impl EditCommand {
    /// Run the command against `doc`.
    ///
    /// A failing command may leave `doc` half-edited; callers that need
    /// atomicity go through [`CommandStack::execute`].
    pub fn apply(self, doc: &mut FormDocument) -> Result<CommandOutcome, FormError> {
        use CommandOutcome as Out;
        let outcome = match self {
            EditCommand::Create {
                ty,
                label,
                options,
                hide_label,
                parent,
            } => Out::Created(doc.create(ty, &label, &options, hide_label, parent)?),
            EditCommand::Insert {
                parent,
                column,
                index,
                component,
            } => Out::Created(doc.insert(parent, column, index, *component)?),
            EditCommand::Delete { key } => {
                Out::Removed(doc.delete_by_key(key)?.iter().flat_map(subtree_keys).collect())
            }
            EditCommand::Move { key, target } => {
                doc.move_key_to(key, target)?;
                Out::Done
            }
            EditCommand::Reorder { parent, from, to } => {
                doc.reorder(parent, from, to)?;
                Out::Done
            }
            EditCommand::WrapInColumns { key, count } => {
                let path = path_of(doc, key)?;
                Out::Created(doc.wrap_in_columns(&path, count)?)
            }
            EditCommand::MoveIntoColumn {
                key,
                wrapper,
                column,
                fallback,
            } => Out::Displaced(doc.move_into_column(key, wrapper, column, fallback.map(|c| *c))?),
            EditCommand::RemoveFromColumn {
                wrapper,
                column,
                prune,
            } => Out::Removed(
                doc.remove_from_column(wrapper, column, prune)?
                    .iter()
                    .flat_map(subtree_keys)
                    .collect(),
            ),
            EditCommand::AddColumn { wrapper } => Out::Column(doc.add_column(wrapper)?),
            EditCommand::MergeColumns {
                wrapper,
                from,
                into,
            } => {
                doc.merge_columns(wrapper, from, into)?;
                Out::Done
            }
            EditCommand::TidyColumns { wrapper } => {
                doc.tidy_columns(wrapper)?;
                Out::Done
            }
            EditCommand::RenameKey { key, new_key } => Out::Renamed(doc.rename_key(key, &new_key)?),
            EditCommand::RekeyFromLabel { key, label } => {
                Out::Renamed(doc.rekey_from_label(key, &label)?)
            }
            EditCommand::SetLabel { key, label } => {
                doc.set_label(key, &label)?;
                Out::Done
            }
            EditCommand::SetHideLabel { key, hide } => {
                doc.set_hide_label(key, hide)?;
                Out::Done
            }
            EditCommand::SetDescription { key, description } => {
                doc.set_description(key, description)?;
                Out::Done
            }
            EditCommand::ChangeType { key, to } => {
                doc.change_type(key, to)?;
                Out::Done
            }
            EditCommand::SetOptions { key, options } => {
                doc.set_options(key, options)?;
                Out::Done
            }
            EditCommand::SetValidation { key, validation } => {
                doc.set_validation(key, validation)?;
                Out::Done
            }
            EditCommand::SetDefaultValue { key, values } => {
                doc.set_default_value(key, values)?;
                Out::Done
            }
            EditCommand::SetCalculateValue { key, formula } => {
                doc.set_calculate_value(key, formula)?;
                Out::Done
            }
            EditCommand::SetHtml { key, html } => {
                doc.set_html(key, &html)?;
                Out::Done
            }
            EditCommand::SetConditional { key, conditional } => {
                doc.set_conditional(key, conditional)?;
                Out::Done
            }
            EditCommand::ToggleActions { owner, enable } => {
                Out::Actions(doc.toggle_actions(owner, enable)?)
            }
            EditCommand::AddFollower { owner, label, eq } => {
                Out::Created(doc.add_follower(owner, &label, &eq)?)
            }
            EditCommand::SyncAnswerKey { quiz } => {
                doc.sync_answer_key(quiz)?;
                Out::Done
            }
            EditCommand::Ingest { candidates, target } => {
                Out::Ingested(doc.ingest_batch(&candidates, target)?)
            }
            EditCommand::Import { json } => Out::Imported(doc.import_json(&json)?),
        };
        Ok(outcome)
    }

    /// Short label for the undo/redo menu.
    pub fn describe(&self) -> String {
        match self {
            EditCommand::Create { ty, .. } => format!("add {}", ty.as_str()),
            EditCommand::Insert { component, .. } => {
                format!("insert {}", component.component_type().as_str())
            }
            EditCommand::Delete { key } => format!("delete {key}"),
            EditCommand::Move { key, .. } => format!("move {key}"),
            EditCommand::Reorder { .. } => "reorder".to_string(),
            EditCommand::WrapInColumns { key, count } => format!("wrap {key} in {count} columns"),
            EditCommand::MoveIntoColumn { key, .. } => format!("move {key} into column"),
            EditCommand::RemoveFromColumn { .. } => "clear column".to_string(),
            EditCommand::AddColumn { .. } => "add column".to_string(),
            EditCommand::MergeColumns { .. } => "merge columns".to_string(),
            EditCommand::TidyColumns { .. } => "tidy columns".to_string(),
            EditCommand::RenameKey { key, .. } | EditCommand::RekeyFromLabel { key, .. } => {
                format!("rename {key}")
            }
            EditCommand::SetLabel { key, .. } | EditCommand::SetHideLabel { key, .. } => {
                format!("edit label of {key}")
            }
            EditCommand::SetDescription { key, .. } => format!("edit description of {key}"),
            EditCommand::ChangeType { key, to } => format!("change {key} to {}", to.as_str()),
            EditCommand::SetOptions { key, .. } | EditCommand::SetDefaultValue { key, .. } => {
                format!("edit options of {key}")
            }
            EditCommand::SetValidation { key, .. } => format!("edit validation of {key}"),
            EditCommand::SetCalculateValue { key, .. } => format!("edit formula of {key}"),
            EditCommand::SetHtml { key, .. } => format!("edit content of {key}"),
            EditCommand::SetConditional { key, .. } => format!("edit condition of {key}"),
            EditCommand::ToggleActions { owner, enable: true } => format!("add actions to {owner}"),
            EditCommand::ToggleActions { owner, .. } => format!("remove actions from {owner}"),
            EditCommand::AddFollower { owner, .. } => format!("add follower to {owner}"),
            EditCommand::SyncAnswerKey { quiz } => format!("rebuild answer key of {quiz}"),
            EditCommand::Ingest { .. } => "generate components".to_string(),
            EditCommand::Import { .. } => "import".to_string(),
        }
    }

    /// Decode a command sent by the builder UI:
    /// `{"op": "setLabel", "key": "name", "label": "Full name"}`.
    pub fn from_value(value: &Value) -> Result<Self, FormError> {
        let op = str_field(value, "op")?;
        let command = match op {
            "create" => EditCommand::Create {
                ty: type_field(value, "type")?,
                label: opt_str(value, "label").unwrap_or_default().to_string(),
                options: value
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
                hide_label: bool_field(value, "hideLabel"),
                parent: opt_key(value, "parent"),
            },
            "insert" => EditCommand::Insert {
                parent: opt_key(value, "parent"),
                column: opt_usize(value, "column"),
                index: usize_field(value, "index")?,
                component: Box::new(decode_component(field(value, "component")?)?),
            },
            "delete" => EditCommand::Delete {
                key: key_field(value, "key")?,
            },
            "move" => EditCommand::Move {
                key: key_field(value, "key")?,
                target: opt_key(value, "target"),
            },
            "reorder" => EditCommand::Reorder {
                parent: opt_key(value, "parent"),
                from: usize_field(value, "from")?,
                to: usize_field(value, "to")?,
            },
            "wrapInColumns" => EditCommand::WrapInColumns {
                key: key_field(value, "key")?,
                count: opt_usize(value, "count").unwrap_or(2),
            },
            "moveIntoColumn" => EditCommand::MoveIntoColumn {
                key: key_field(value, "key")?,
                wrapper: key_field(value, "wrapper")?,
                column: usize_field(value, "column")?,
                fallback: match value.get("component") {
                    Some(c) => Some(Box::new(decode_component(c)?)),
                    None => None,
                },
            },
            "removeFromColumn" => EditCommand::RemoveFromColumn {
                wrapper: key_field(value, "wrapper")?,
                column: usize_field(value, "column")?,
                prune: value.get("prune").and_then(Value::as_bool).unwrap_or(true),
            },
            "addColumn" => EditCommand::AddColumn {
                wrapper: key_field(value, "wrapper")?,
            },
            "mergeColumns" => EditCommand::MergeColumns {
                wrapper: key_field(value, "wrapper")?,
                from: usize_field(value, "from")?,
                into: usize_field(value, "into")?,
            },
            "tidyColumns" => EditCommand::TidyColumns {
                wrapper: key_field(value, "wrapper")?,
            },
            "renameKey" => EditCommand::RenameKey {
                key: key_field(value, "key")?,
                new_key: str_field(value, "newKey")?.to_string(),
            },
            "rekeyFromLabel" => EditCommand::RekeyFromLabel {
                key: key_field(value, "key")?,
                label: str_field(value, "label")?.to_string(),
            },
            "setLabel" => EditCommand::SetLabel {
                key: key_field(value, "key")?,
                label: str_field(value, "label")?.to_string(),
            },
            "setHideLabel" => EditCommand::SetHideLabel {
                key: key_field(value, "key")?,
                hide: bool_field(value, "hide"),
            },
            "setDescription" => EditCommand::SetDescription {
                key: key_field(value, "key")?,
                description: opt_str(value, "description").map(str::to_string),
            },
            "changeType" => EditCommand::ChangeType {
                key: key_field(value, "key")?,
                to: type_field(value, "to")?,
            },
            "setOptions" => EditCommand::SetOptions {
                key: key_field(value, "key")?,
                options: options_from_value(field(value, "options")?)?,
            },
            "setValidation" => EditCommand::SetValidation {
                key: key_field(value, "key")?,
                validation: validation_from_value(value.get("validate").unwrap_or(&Value::Null))?,
            },
            "setDefaultValue" => EditCommand::SetDefaultValue {
                key: key_field(value, "key")?,
                values: match value.get("values") {
                    Some(Value::String(s)) => vec![s.clone()],
                    Some(Value::Array(items)) => items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                    _ => Vec::new(),
                },
            },
            "setCalculateValue" => EditCommand::SetCalculateValue {
                key: key_field(value, "key")?,
                formula: opt_str(value, "formula").map(str::to_string),
            },
            "setHtml" => EditCommand::SetHtml {
                key: key_field(value, "key")?,
                html: str_field(value, "html")?.to_string(),
            },
            "setConditional" => EditCommand::SetConditional {
                key: key_field(value, "key")?,
                conditional: conditional_from_value(
                    value.get("conditional").unwrap_or(&Value::Null),
                )?,
            },
            "toggleActions" => EditCommand::ToggleActions {
                owner: key_field(value, "owner")?,
                enable: bool_field(value, "enable"),
            },
            "addFollower" => EditCommand::AddFollower {
                owner: key_field(value, "owner")?,
                label: str_field(value, "label")?.to_string(),
                eq: str_field(value, "eq")?.to_string(),
            },
            "syncAnswerKey" => EditCommand::SyncAnswerKey {
                quiz: key_field(value, "quiz")?,
            },
            "ingest" => EditCommand::Ingest {
                candidates: match field(value, "candidates")? {
                    Value::Array(items) => items.clone(),
                    single => vec![single.clone()],
                },
                target: match opt_key(value, "wrapper") {
                    Some(wrapper) => IngestTarget::Column {
                        wrapper,
                        column: usize_field(value, "column")?,
                    },
                    None => IngestTarget::List(opt_key(value, "parent")),
                },
            },
            "import" => EditCommand::Import {
                json: match field(value, "form")? {
                    Value::String(s) => s.clone(),
                    other => serde_json::to_string(other)?,
                },
            },
            other => return Err(FormError::Invalid(format!("unknown command `{other}`"))),
        };
        Ok(command)
    }
}

fn subtree_keys(component: &Component) -> Vec<ComponentKey> {
    ff_core::locate::keys(std::slice::from_ref(component))
}

fn path_of(doc: &FormDocument, key: ComponentKey) -> Result<ComponentPath, FormError> {
    doc.path_of(key)
        .ok_or_else(|| FormError::NotFound(key.to_string()))
}

// ─── Command decoding helpers ────────────────────────────────────────────

fn field<'a>(value: &'a Value, name: &str) -> Result<&'a Value, FormError> {
    value
        .get(name)
        .ok_or_else(|| FormError::Invalid(format!("command is missing `{name}`")))
}

fn str_field<'a>(value: &'a Value, name: &str) -> Result<&'a str, FormError> {
    field(value, name)?
        .as_str()
        .ok_or_else(|| FormError::Invalid(format!("`{name}` must be a string")))
}

fn opt_str<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    value.get(name).and_then(Value::as_str)
}

fn key_field(value: &Value, name: &str) -> Result<ComponentKey, FormError> {
    Ok(ComponentKey::intern(str_field(value, name)?))
}

/// Absent, `null` and `""` all mean the root.
fn opt_key(value: &Value, name: &str) -> Option<ComponentKey> {
    opt_str(value, name)
        .filter(|s| !s.is_empty())
        .map(ComponentKey::intern)
}

fn usize_field(value: &Value, name: &str) -> Result<usize, FormError> {
    opt_usize(value, name)
        .ok_or_else(|| FormError::Invalid(format!("`{name}` must be a non-negative integer")))
}

fn opt_usize(value: &Value, name: &str) -> Option<usize> {
    value
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
}

fn bool_field(value: &Value, name: &str) -> bool {
    value.get(name).and_then(Value::as_bool).unwrap_or(false)
}

fn type_field(value: &Value, name: &str) -> Result<ComponentType, FormError> {
    let s = str_field(value, name)?;
    ComponentType::parse(s).ok_or_else(|| FormError::UnknownType(s.to_string()))
}

// ─── Command stack ───────────────────────────────────────────────────────

/// One undo step: the tree before and after, as MessagePack snapshots.
#[derive(Debug, Clone)]
struct Snapshot {
    before: Vec<u8>,
    after: Vec<u8>,
    description: String,
}

/// Manages undo/redo stacks with batch grouping for drag gestures.
pub struct CommandStack {
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    /// Maximum undo depth.
    max_depth: usize,
    /// Batch nesting depth (0 = not batching).
    batch_depth: usize,
    /// Snapshot and label captured at the start of a batch.
    batch_snapshot: Option<(Vec<u8>, String)>,
    /// Whether any command ran during the current batch.
    batch_dirty: bool,
    /// Rebuild quiz answer keys after each command.
    sync_quizzes: bool,
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth.min(64)),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
            batch_depth: 0,
            batch_snapshot: None,
            batch_dirty: false,
            sync_quizzes: true,
        }
    }

    /// Skip the full quiz sync after each command. Bundle numbering is
    /// still compacted.
    pub fn with_quiz_sync(mut self, enabled: bool) -> Self {
        self.sync_quizzes = enabled;
        self
    }

    /// Start a batch group. Captures the current tree for undo. All
    /// commands until `end_batch()` are applied live but tracked as one
    /// undo step.
    pub fn begin_batch(&mut self, doc: &FormDocument, description: &str) -> Result<(), FormError> {
        if self.batch_depth == 0 {
            self.batch_snapshot = Some((doc.snapshot()?, description.to_string()));
            self.batch_dirty = false;
        }
        self.batch_depth += 1;
        Ok(())
    }

    /// End a batch group. When the outermost batch closes and the tree
    /// changed, one snapshot entry is pushed.
    pub fn end_batch(&mut self, doc: &FormDocument) -> Result<(), FormError> {
        if self.batch_depth == 0 {
            return Ok(());
        }
        self.batch_depth -= 1;
        if self.batch_depth > 0 {
            return Ok(());
        }
        let started = self.batch_snapshot.take();
        let dirty = std::mem::take(&mut self.batch_dirty);
        if let (true, Some((before, description))) = (dirty, started) {
            let after = doc.snapshot()?;
            self.push(Snapshot {
                before,
                after,
                description,
            });
        }
        Ok(())
    }

    /// Abandon every open batch and put the tree back as it was when the
    /// outermost batch began.
    pub fn cancel_batch(&mut self, doc: &mut FormDocument) -> Result<(), FormError> {
        self.batch_depth = 0;
        self.batch_dirty = false;
        match self.batch_snapshot.take() {
            Some((before, _)) => doc.restore(&before),
            None => Ok(()),
        }
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    /// Run `command` against `doc` and record it.
    ///
    /// On error the document is exactly as it was before the call.
    pub fn execute(
        &mut self,
        doc: &mut FormDocument,
        command: EditCommand,
    ) -> Result<CommandOutcome, FormError> {
        let description = command.describe();
        let backup = doc.clone();
        let before = if self.batch_depth == 0 {
            Some(doc.snapshot()?)
        } else {
            None
        };

        let outcome = match command.apply(doc) {
            Ok(outcome) => outcome,
            Err(err) => {
                log::debug!("command: `{description}` rejected: {err}");
                *doc = backup;
                return Err(err);
            }
        };
        if self.sync_quizzes {
            doc.settle();
        } else {
            doc.compact_bundles();
        }

        let Some(before) = before else {
            // Inside a batch: end_batch() captures the cumulative effect.
            self.batch_dirty = true;
            return Ok(outcome);
        };
        let after = match doc.snapshot() {
            Ok(after) => after,
            Err(err) => {
                *doc = backup;
                return Err(err);
            }
        };
        if before != after {
            log::debug!("command: `{description}`");
            self.push(Snapshot {
                before,
                after,
                description,
            });
        }
        Ok(outcome)
    }

    fn push(&mut self, entry: Snapshot) {
        self.undo_stack.push(entry);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        // Clear redo stack on new action
        self.redo_stack.clear();
    }

    /// Undo the last command (or batch). Returns its description.
    pub fn undo(&mut self, doc: &mut FormDocument) -> Result<Option<String>, FormError> {
        if self.is_batching() {
            return Ok(None);
        }
        let Some(entry) = self.undo_stack.pop() else {
            return Ok(None);
        };
        if let Err(err) = doc.restore(&entry.before) {
            self.undo_stack.push(entry);
            return Err(err);
        }
        let description = entry.description.clone();
        self.redo_stack.push(entry);
        Ok(Some(description))
    }

    /// Redo the last undone command (or batch).
    pub fn redo(&mut self, doc: &mut FormDocument) -> Result<Option<String>, FormError> {
        if self.is_batching() {
            return Ok(None);
        }
        let Some(entry) = self.redo_stack.pop() else {
            return Ok(None);
        };
        if let Err(err) = doc.restore(&entry.after) {
            self.redo_stack.push(entry);
            return Err(err);
        }
        let description = entry.description.clone();
        self.undo_stack.push(entry);
        Ok(Some(description))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Drop all history, e.g. after loading another form.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch_depth = 0;
        self.batch_snapshot = None;
        self.batch_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn k(s: &str) -> ComponentKey {
        ComponentKey::intern(s)
    }

    fn create(label: &str, parent: Option<ComponentKey>) -> EditCommand {
        EditCommand::Create {
            ty: ComponentType::TextArea,
            label: label.to_string(),
            options: Vec::new(),
            hide_label: false,
            parent,
        }
    }

    #[test]
    fn undo_redo_create() {
        let mut doc = FormDocument::new();
        let mut stack = CommandStack::new(100);

        let out = stack.execute(&mut doc, create("Name", None)).unwrap();
        assert_eq!(out, CommandOutcome::Created(k("name")));
        assert!(stack.can_undo());
        assert_eq!(doc.len(), 1);

        assert_eq!(stack.undo(&mut doc).unwrap().as_deref(), Some("add textarea"));
        assert!(doc.is_empty());
        assert!(stack.can_redo());

        stack.redo(&mut doc).unwrap();
        assert!(doc.contains(k("name")));
    }

    #[test]
    fn failed_command_leaves_no_trace() {
        let mut doc = FormDocument::new();
        let mut stack = CommandStack::new(100);
        stack.execute(&mut doc, create("Name", None)).unwrap();
        let before = doc.to_value();

        let err = stack
            .execute(&mut doc, EditCommand::Delete { key: k("ghost") })
            .unwrap_err();
        assert!(err.is_lookup());
        assert_eq!(doc.to_value(), before);
        assert_eq!(stack.undo_len(), 1);
    }

    #[test]
    fn no_op_command_is_not_recorded() {
        let mut doc = FormDocument::new();
        let mut stack = CommandStack::new(100);
        stack.execute(&mut doc, create("Name", None)).unwrap();
        stack
            .execute(
                &mut doc,
                EditCommand::SetLabel {
                    key: k("name"),
                    label: "Name".into(),
                },
            )
            .unwrap();
        assert_eq!(stack.undo_len(), 1);
    }

    #[test]
    fn batch_is_one_undo_step() {
        let mut doc = FormDocument::new();
        let mut stack = CommandStack::new(100);

        stack.begin_batch(&doc, "drop").unwrap();
        stack.execute(&mut doc, create("A", None)).unwrap();
        stack.execute(&mut doc, create("B", None)).unwrap();
        stack
            .execute(
                &mut doc,
                EditCommand::Reorder {
                    parent: None,
                    from: 1,
                    to: 0,
                },
            )
            .unwrap();
        stack.end_batch(&doc).unwrap();
        assert_eq!(stack.undo_len(), 1);
        assert_eq!(doc.keys(), vec![k("b"), k("a")]);

        assert_eq!(stack.undo(&mut doc).unwrap().as_deref(), Some("drop"));
        assert!(doc.is_empty());
    }

    #[test]
    fn cancel_batch_restores_start() {
        let mut doc = FormDocument::new();
        let mut stack = CommandStack::new(100);
        stack.execute(&mut doc, create("Keep", None)).unwrap();
        let before = doc.to_value();

        stack.begin_batch(&doc, "drop").unwrap();
        stack.execute(&mut doc, create("Gone", None)).unwrap();
        stack.cancel_batch(&mut doc).unwrap();
        assert_eq!(doc.to_value(), before);
        assert!(!stack.is_batching());
        assert_eq!(stack.undo_len(), 1);
    }

    #[test]
    fn empty_batch_pushes_nothing() {
        let mut doc = FormDocument::new();
        let mut stack = CommandStack::new(100);
        stack.begin_batch(&doc, "noop").unwrap();
        stack.end_batch(&doc).unwrap();
        assert!(!stack.can_undo());
    }

    #[test]
    fn max_depth_drops_oldest() {
        let mut doc = FormDocument::new();
        let mut stack = CommandStack::new(2);
        for label in ["A", "B", "C"] {
            stack.execute(&mut doc, create(label, None)).unwrap();
        }
        assert_eq!(stack.undo_len(), 2);
        stack.undo(&mut doc).unwrap();
        stack.undo(&mut doc).unwrap();
        assert_eq!(stack.undo(&mut doc).unwrap(), None);
        assert_eq!(doc.keys(), vec![k("a")]);
    }

    #[test]
    fn new_action_clears_redo() {
        let mut doc = FormDocument::new();
        let mut stack = CommandStack::new(100);
        stack.execute(&mut doc, create("A", None)).unwrap();
        stack.undo(&mut doc).unwrap();
        assert!(stack.can_redo());
        stack.execute(&mut doc, create("B", None)).unwrap();
        assert!(!stack.can_redo());
    }

    #[test]
    fn toggling_actions_undoes_as_one_step() {
        let mut doc = FormDocument::new();
        let mut stack = CommandStack::new(100);
        stack.execute(&mut doc, create("Notes", None)).unwrap();
        let out = stack
            .execute(
                &mut doc,
                EditCommand::ToggleActions {
                    owner: k("notes"),
                    enable: true,
                },
            )
            .unwrap();
        assert_eq!(out, CommandOutcome::Actions(true));
        assert_eq!(doc.len(), 3);

        stack.undo(&mut doc).unwrap();
        assert_eq!(doc.len(), 1);
        assert!(doc.bundles().is_empty());
        stack.redo(&mut doc).unwrap();
        assert_eq!(doc.bundles().len(), 1);
    }

    #[test]
    fn delete_reports_every_removed_key() {
        let mut doc = FormDocument::new();
        let mut stack = CommandStack::new(100);
        stack
            .execute(
                &mut doc,
                EditCommand::Create {
                    ty: ComponentType::Fieldset,
                    label: "Group".into(),
                    options: Vec::new(),
                    hide_label: false,
                    parent: None,
                },
            )
            .unwrap();
        stack.execute(&mut doc, create("Inner", Some(k("group")))).unwrap();
        let out = stack
            .execute(&mut doc, EditCommand::Delete { key: k("group") })
            .unwrap();
        assert_eq!(out, CommandOutcome::Removed(vec![k("group"), k("inner")]));
    }

    #[test]
    fn decode_ui_commands() {
        let cmd = EditCommand::from_value(&json!({
            "op": "create", "type": "radio", "label": "Smoker",
            "options": ["Yes", "No"], "parent": null
        }))
        .unwrap();
        assert_eq!(
            cmd,
            EditCommand::Create {
                ty: ComponentType::Radio,
                label: "Smoker".into(),
                options: vec!["Yes".into(), "No".into()],
                hide_label: false,
                parent: None,
            }
        );

        let cmd = EditCommand::from_value(&json!({
            "op": "setConditional", "key": "b",
            "conditional": {"show": false, "when": "a", "eq": "yes"}
        }))
        .unwrap();
        let EditCommand::SetConditional { conditional, .. } = cmd else {
            panic!("wrong command");
        };
        assert_eq!(conditional.unwrap().when, k("a"));

        let cmd = EditCommand::from_value(&json!({
            "op": "ingest", "candidates": {"type": "textfield", "label": "X"},
            "wrapper": "row", "column": 1
        }))
        .unwrap();
        let EditCommand::Ingest { candidates, target } = cmd else {
            panic!("wrong command");
        };
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            target,
            IngestTarget::Column {
                wrapper: k("row"),
                column: 1
            }
        );
    }

    #[test]
    fn decode_rejects_bad_commands() {
        assert!(matches!(
            EditCommand::from_value(&json!({"op": "explode"})),
            Err(FormError::Invalid(_))
        ));
        assert!(matches!(
            EditCommand::from_value(&json!({"op": "delete"})),
            Err(FormError::Invalid(_))
        ));
        assert!(matches!(
            EditCommand::from_value(&json!({"op": "create", "type": "hologram"})),
            Err(FormError::UnknownType(_))
        ));
        assert!(matches!(
            EditCommand::from_value(&json!({"op": "reorder", "from": -1, "to": 0})),
            Err(FormError::Invalid(_))
        ));
    }
}
