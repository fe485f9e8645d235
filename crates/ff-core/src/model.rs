//! Core data model for FormForge documents.
//!
//! A form is an ordered tree of `Component` values. Containers (fieldset,
//! edit-grid, quiz) own an ordered child list; a columns wrapper owns a row
//! of `Column` slots, each with its own short child list. The component kind
//! is a closed sum type: every wire `type` string maps to exactly one
//! variant, and anything else is rejected at decode time.

use crate::key::ComponentKey;
use serde_json::{Map, Value};

/// Total grid width of a column row.
pub const GRID_WIDTH: u8 = 12;
/// Fewest columns a wrapper may hold at rest.
pub const MIN_COLUMNS: usize = 2;
/// Most columns a wrapper may hold.
pub const MAX_COLUMNS: usize = 4;

// ─── Component types ─────────────────────────────────────────────────────

/// Discriminant of `ComponentKind`, used by the factory and the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentType {
    TextArea,
    Radio,
    Select,
    SelectBoxes,
    File,
    Phone,
    Address,
    Asset,
    Account,
    Number,
    Currency,
    DateTime,
    Fieldset,
    Columns,
    EditGrid,
    AnswerKey,
    Survey,
    Content,
    Disclaimer,
    Quiz,
    Speed,
}

impl ComponentType {
    /// Every type, in palette order.
    pub const ALL: [ComponentType; 21] = [
        ComponentType::TextArea,
        ComponentType::Radio,
        ComponentType::Select,
        ComponentType::SelectBoxes,
        ComponentType::File,
        ComponentType::Phone,
        ComponentType::Address,
        ComponentType::Asset,
        ComponentType::Account,
        ComponentType::Number,
        ComponentType::Currency,
        ComponentType::DateTime,
        ComponentType::Fieldset,
        ComponentType::Columns,
        ComponentType::EditGrid,
        ComponentType::AnswerKey,
        ComponentType::Survey,
        ComponentType::Content,
        ComponentType::Disclaimer,
        ComponentType::Quiz,
        ComponentType::Speed,
    ];

    /// Parse a wire `type` string, accepting the known aliases
    /// (`textfield`, `phone`, `date`, `time`, `htmlelement`).
    ///
    /// `editgrid` always parses to `EditGrid`; the codec promotes it to
    /// `AnswerKey` when the key carries the answer-key prefix.
    pub fn parse(s: &str) -> Option<Self> {
        let ty = match s {
            "textarea" | "textfield" => ComponentType::TextArea,
            "radio" => ComponentType::Radio,
            "select" => ComponentType::Select,
            "selectboxes" => ComponentType::SelectBoxes,
            "file" => ComponentType::File,
            "phoneNumber" | "phone" => ComponentType::Phone,
            "address" => ComponentType::Address,
            "asset" => ComponentType::Asset,
            "account" => ComponentType::Account,
            "number" => ComponentType::Number,
            "currency" => ComponentType::Currency,
            "datetime" | "date" | "time" => ComponentType::DateTime,
            "fieldset" => ComponentType::Fieldset,
            "columns" => ComponentType::Columns,
            "editgrid" => ComponentType::EditGrid,
            "survey" => ComponentType::Survey,
            "content" | "htmlelement" => ComponentType::Content,
            "disclaimer" => ComponentType::Disclaimer,
            "quiz" => ComponentType::Quiz,
            "speed" => ComponentType::Speed,
            _ => return None,
        };
        Some(ty)
    }

    /// Canonical wire `type` string.
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentType::TextArea => "textarea",
            ComponentType::Radio => "radio",
            ComponentType::Select => "select",
            ComponentType::SelectBoxes => "selectboxes",
            ComponentType::File => "file",
            ComponentType::Phone => "phoneNumber",
            ComponentType::Address => "address",
            ComponentType::Asset => "asset",
            ComponentType::Account => "account",
            ComponentType::Number => "number",
            ComponentType::Currency => "currency",
            ComponentType::DateTime => "datetime",
            ComponentType::Fieldset => "fieldset",
            ComponentType::Columns => "columns",
            ComponentType::EditGrid | ComponentType::AnswerKey => "editgrid",
            ComponentType::Survey => "survey",
            ComponentType::Content => "content",
            ComponentType::Disclaimer => "disclaimer",
            ComponentType::Quiz => "quiz",
            ComponentType::Speed => "speed",
        }
    }

    /// Radio, select, selectboxes.
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            ComponentType::Radio | ComponentType::Select | ComponentType::SelectBoxes
        )
    }

    /// Types that own an ordered child list.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            ComponentType::Fieldset | ComponentType::EditGrid | ComponentType::Quiz
        )
    }

    /// Types that hold no user input.
    pub fn is_layout(self) -> bool {
        matches!(
            self,
            ComponentType::Fieldset
                | ComponentType::Columns
                | ComponentType::Content
                | ComponentType::Disclaimer
        )
    }
}

// ─── Field payloads ──────────────────────────────────────────────────────

/// A single `{label, value}` option of a choice component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub label: String,
    pub value: String,
}

/// Options plus default selection, shared by radio/select/selectboxes.
///
/// `default_value` holds option *values*; radio and select keep at most one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoiceField {
    pub options: Vec<ChoiceOption>,
    pub default_value: Vec<String>,
}

impl ChoiceField {
    pub fn new(options: Vec<ChoiceOption>) -> Self {
        Self {
            options,
            default_value: Vec::new(),
        }
    }

    /// Label of the option whose value matches the first default.
    pub fn default_label(&self) -> Option<&str> {
        let value = self.default_value.first()?;
        self.options
            .iter()
            .find(|o| &o.value == value)
            .map(|o| o.label.as_str())
    }

    /// Drop defaults that no longer name an option.
    pub fn retain_valid_defaults(&mut self) {
        let options = &self.options;
        self.default_value
            .retain(|v| options.iter().any(|o| &o.value == v));
    }
}

/// A `validate` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    pub required: bool,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<String>,
    pub custom_message: Option<String>,
    /// Validation fields this model does not interpret.
    pub extra: Map<String, Value>,
}

impl Validation {
    pub fn is_empty(&self) -> bool {
        !self.required
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.pattern.is_none()
            && self.custom_message.is_none()
            && self.extra.is_empty()
    }
}

/// Simple visibility rule: show (or hide) when `when` equals `eq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditional {
    pub show: bool,
    pub when: ComponentKey,
    pub eq: String,
}

/// One slot of a columns wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub width: u8,
    pub offset: u8,
    pub push: u8,
    pub pull: u8,
    pub size: String,
    pub components: Vec<Component>,
}

impl Column {
    pub fn with_width(width: u8) -> Self {
        Self {
            width,
            offset: 0,
            push: 0,
            pull: 0,
            size: "md".into(),
            components: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Spread `GRID_WIDTH` evenly across the row; any remainder goes to the
/// leftmost columns.
pub fn normalize_widths(columns: &mut [Column]) {
    if columns.is_empty() {
        return;
    }
    let n = columns.len() as u8;
    let base = GRID_WIDTH / n;
    let remainder = GRID_WIDTH % n;
    for (i, column) in columns.iter_mut().enumerate() {
        column.width = base + u8::from((i as u8) < remainder);
    }
}

/// One derived row of a quiz answer key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRow {
    pub question_key: ComponentKey,
    pub question: String,
    pub options: Vec<ChoiceOption>,
    /// Label of the correct option, empty when unset.
    pub answer: String,
}

// ─── Component ───────────────────────────────────────────────────────────

/// Kind-specific payload of a component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    TextArea { placeholder: Option<String> },
    Radio(ChoiceField),
    Select(ChoiceField),
    SelectBoxes(ChoiceField),
    File,
    Phone,
    Address,
    Asset,
    Account,
    Number { calculate_value: Option<String> },
    Currency {
        currency: String,
        calculate_value: Option<String>,
    },
    DateTime { enable_date: bool, enable_time: bool },
    Fieldset { components: Vec<Component> },
    Columns { columns: Vec<Column> },
    EditGrid { components: Vec<Component> },
    /// Quiz answer key: an edit-grid whose rows mirror the quiz questions.
    AnswerKey { rows: Vec<AnswerRow> },
    Survey {
        questions: Vec<ChoiceOption>,
        values: Vec<ChoiceOption>,
    },
    Content { html: String },
    Disclaimer { html: String },
    Quiz { components: Vec<Component> },
    Speed,
}

impl ComponentKind {
    pub fn component_type(&self) -> ComponentType {
        match self {
            ComponentKind::TextArea { .. } => ComponentType::TextArea,
            ComponentKind::Radio(_) => ComponentType::Radio,
            ComponentKind::Select(_) => ComponentType::Select,
            ComponentKind::SelectBoxes(_) => ComponentType::SelectBoxes,
            ComponentKind::File => ComponentType::File,
            ComponentKind::Phone => ComponentType::Phone,
            ComponentKind::Address => ComponentType::Address,
            ComponentKind::Asset => ComponentType::Asset,
            ComponentKind::Account => ComponentType::Account,
            ComponentKind::Number { .. } => ComponentType::Number,
            ComponentKind::Currency { .. } => ComponentType::Currency,
            ComponentKind::DateTime { .. } => ComponentType::DateTime,
            ComponentKind::Fieldset { .. } => ComponentType::Fieldset,
            ComponentKind::Columns { .. } => ComponentType::Columns,
            ComponentKind::EditGrid { .. } => ComponentType::EditGrid,
            ComponentKind::AnswerKey { .. } => ComponentType::AnswerKey,
            ComponentKind::Survey { .. } => ComponentType::Survey,
            ComponentKind::Content { .. } => ComponentType::Content,
            ComponentKind::Disclaimer { .. } => ComponentType::Disclaimer,
            ComponentKind::Quiz { .. } => ComponentType::Quiz,
            ComponentKind::Speed => ComponentType::Speed,
        }
    }
}

/// A single node of the form tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub key: ComponentKey,
    pub label: String,
    pub hide_label: bool,
    pub description: Option<String>,
    pub kind: ComponentKind,
    pub validate: Validation,
    pub conditional: Option<Conditional>,
    /// Wire fields this model does not interpret, kept for round-trips.
    pub extra: Map<String, Value>,
}

impl Component {
    pub fn new(key: ComponentKey, label: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            key,
            label: label.into(),
            hide_label: false,
            description: None,
            kind,
            validate: Validation::default(),
            conditional: None,
            extra: Map::new(),
        }
    }

    pub fn component_type(&self) -> ComponentType {
        self.kind.component_type()
    }

    pub fn is_container(&self) -> bool {
        self.component_type().is_container()
    }

    pub fn is_columns(&self) -> bool {
        matches!(self.kind, ComponentKind::Columns { .. })
    }

    /// Child list of a fieldset / edit-grid / quiz.
    pub fn children(&self) -> Option<&Vec<Component>> {
        match &self.kind {
            ComponentKind::Fieldset { components }
            | ComponentKind::EditGrid { components }
            | ComponentKind::Quiz { components } => Some(components),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Component>> {
        match &mut self.kind {
            ComponentKind::Fieldset { components }
            | ComponentKind::EditGrid { components }
            | ComponentKind::Quiz { components } => Some(components),
            _ => None,
        }
    }

    pub fn columns(&self) -> Option<&Vec<Column>> {
        match &self.kind {
            ComponentKind::Columns { columns } => Some(columns),
            _ => None,
        }
    }

    pub fn columns_mut(&mut self) -> Option<&mut Vec<Column>> {
        match &mut self.kind {
            ComponentKind::Columns { columns } => Some(columns),
            _ => None,
        }
    }

    /// A child list addressed by a path step: `None` is the container's own
    /// children, `Some(i)` is column `i` of a columns wrapper.
    pub fn child_list(&self, column: Option<usize>) -> Option<&Vec<Component>> {
        match column {
            None => self.children(),
            Some(i) => self.columns()?.get(i).map(|c| &c.components),
        }
    }

    pub fn child_list_mut(&mut self, column: Option<usize>) -> Option<&mut Vec<Component>> {
        match column {
            None => self.children_mut(),
            Some(i) => self.columns_mut()?.get_mut(i).map(|c| &mut c.components),
        }
    }

    /// Every child list in display order, tagged with its path-step column.
    pub fn child_lists(&self) -> Vec<(Option<usize>, &Vec<Component>)> {
        match &self.kind {
            ComponentKind::Fieldset { components }
            | ComponentKind::EditGrid { components }
            | ComponentKind::Quiz { components } => vec![(None, components)],
            ComponentKind::Columns { columns } => columns
                .iter()
                .enumerate()
                .map(|(i, c)| (Some(i), &c.components))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn child_lists_mut(&mut self) -> Vec<(Option<usize>, &mut Vec<Component>)> {
        match &mut self.kind {
            ComponentKind::Fieldset { components }
            | ComponentKind::EditGrid { components }
            | ComponentKind::Quiz { components } => vec![(None, components)],
            ComponentKind::Columns { columns } => columns
                .iter_mut()
                .enumerate()
                .map(|(i, c)| (Some(i), &mut c.components))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn choice(&self) -> Option<&ChoiceField> {
        match &self.kind {
            ComponentKind::Radio(c) | ComponentKind::Select(c) | ComponentKind::SelectBoxes(c) => {
                Some(c)
            }
            _ => None,
        }
    }

    pub fn choice_mut(&mut self) -> Option<&mut ChoiceField> {
        match &mut self.kind {
            ComponentKind::Radio(c) | ComponentKind::Select(c) | ComponentKind::SelectBoxes(c) => {
                Some(c)
            }
            _ => None,
        }
    }

    /// `calculateValue` formula of a number/currency field.
    pub fn calculate_value(&self) -> Option<&str> {
        match &self.kind {
            ComponentKind::Number { calculate_value }
            | ComponentKind::Currency {
                calculate_value, ..
            } => calculate_value.as_deref(),
            _ => None,
        }
    }

    pub fn calculate_value_mut(&mut self) -> Option<&mut Option<String>> {
        match &mut self.kind {
            ComponentKind::Number { calculate_value }
            | ComponentKind::Currency {
                calculate_value, ..
            } => Some(calculate_value),
            _ => None,
        }
    }

    /// Number of components in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .child_lists()
            .into_iter()
            .flat_map(|(_, list)| list.iter())
            .map(Component::subtree_len)
            .sum::<usize>()
    }
}
