//! JSON codec: Form.io-style component objects ⇄ `Component`.
//!
//! Decoding takes the fields it understands out of the object and keeps the
//! remainder in `Component::extra`, so anything the model does not
//! interpret survives an import/export round-trip.
//!
//! Encoding writes fields in a fixed order: `type`, `key`, `label`,
//! `hideLabel`, `description`, kind fields, `validate`, `conditional`, the
//! uninterpreted extras, then the bundle markers.

use crate::bundle::{BundleTable, DRIVER_FLAG, DRIVER_KEY_FIELD};
use crate::error::FormError;
use crate::factory::{DEFAULT_CURRENCY, dedupe_option_values};
use crate::key::ComponentKey;
use crate::model::*;
use serde_json::{Map, Value, json};

/// Key prefix that promotes a quiz's `editgrid` child to its answer key.
pub const ANSWER_KEY_PREFIX: &str = "answerKey";

// ─── Decode ──────────────────────────────────────────────────────────────

/// Decode one component object (and its subtree).
pub fn decode_component(value: &Value) -> Result<Component, FormError> {
    decode_in(value, false)
}

/// Decode a direct child of a quiz, where an `editgrid` keyed
/// `answerKey…` is the quiz's answer key.
pub fn decode_quiz_child(value: &Value) -> Result<Component, FormError> {
    decode_in(value, true)
}

fn decode_in(value: &Value, in_quiz: bool) -> Result<Component, FormError> {
    let Value::Object(map) = value else {
        return Err(FormError::Invalid("component must be a JSON object".into()));
    };
    let mut map = map.clone();

    let type_name = take_string(&mut map, "type")
        .ok_or_else(|| FormError::Invalid("component is missing `type`".into()))?;
    let ty = ComponentType::parse(&type_name)
        .ok_or_else(|| FormError::UnknownType(type_name.clone()))?;
    let key = ComponentKey::intern(&take_string(&mut map, "key").unwrap_or_default());

    let label = take_string(&mut map, "label").unwrap_or_default();
    let hide_label = take_bool(&mut map, "hideLabel").unwrap_or(false);
    let description = take_string(&mut map, "description").filter(|d| !d.is_empty());
    let validate = match map.remove("validate") {
        Some(Value::Object(v)) => decode_validation(v),
        _ => Validation::default(),
    };
    let conditional = map.remove("conditional").and_then(|c| decode_conditional(&c));

    let kind = decode_kind(ty, &type_name, key, in_quiz, &mut map)?;

    Ok(Component {
        key,
        label,
        hide_label,
        description,
        kind,
        validate,
        conditional,
        extra: map,
    })
}

/// Decode a list of component objects.
pub fn decode_components(values: &[Value]) -> Result<Vec<Component>, FormError> {
    values.iter().map(decode_component).collect()
}

fn decode_kind(
    ty: ComponentType,
    type_name: &str,
    key: ComponentKey,
    in_quiz: bool,
    map: &mut Map<String, Value>,
) -> Result<ComponentKind, FormError> {
    let kind = match ty {
        ComponentType::TextArea => ComponentKind::TextArea {
            placeholder: take_string(map, "placeholder").filter(|p| !p.is_empty()),
        },
        ComponentType::Radio => ComponentKind::Radio(decode_choice(map, false)),
        ComponentType::Select => ComponentKind::Select(decode_choice(map, true)),
        ComponentType::SelectBoxes => ComponentKind::SelectBoxes(decode_choice(map, false)),
        ComponentType::File => ComponentKind::File,
        ComponentType::Phone => ComponentKind::Phone,
        ComponentType::Address => ComponentKind::Address,
        ComponentType::Asset => ComponentKind::Asset,
        ComponentType::Account => ComponentKind::Account,
        ComponentType::Number => ComponentKind::Number {
            calculate_value: take_formula(map),
        },
        ComponentType::Currency => ComponentKind::Currency {
            currency: take_string(map, "currency")
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.into()),
            calculate_value: take_formula(map),
        },
        ComponentType::DateTime => {
            let (date, time) = match type_name {
                "date" => (true, false),
                "time" => (false, true),
                _ => (true, true),
            };
            ComponentKind::DateTime {
                enable_date: take_bool(map, "enableDate").unwrap_or(date),
                enable_time: take_bool(map, "enableTime").unwrap_or(time),
            }
        }
        ComponentType::Fieldset => ComponentKind::Fieldset {
            components: take_children(map)?,
        },
        ComponentType::Columns => ComponentKind::Columns {
            columns: take_columns(map)?,
        },
        ComponentType::EditGrid | ComponentType::AnswerKey
            if in_quiz && key.starts_with(ANSWER_KEY_PREFIX) =>
        {
            // The row template is regenerated on export.
            map.remove("components");
            ComponentKind::AnswerKey {
                rows: take_answer_rows(map),
            }
        }
        ComponentType::EditGrid | ComponentType::AnswerKey => ComponentKind::EditGrid {
            components: take_children(map)?,
        },
        ComponentType::Survey => ComponentKind::Survey {
            questions: take_options(map, "questions"),
            values: take_options(map, "values"),
        },
        ComponentType::Content => ComponentKind::Content {
            html: take_html(map),
        },
        ComponentType::Disclaimer => ComponentKind::Disclaimer {
            html: take_html(map),
        },
        ComponentType::Quiz => ComponentKind::Quiz {
            components: take_quiz_children(map)?,
        },
        ComponentType::Speed => ComponentKind::Speed,
    };
    Ok(kind)
}

fn decode_choice(map: &mut Map<String, Value>, prefer_data: bool) -> ChoiceField {
    let mut options = take_options(map, "values");
    // Select keeps its options under `data.values`; accept either place.
    if let Some(Value::Object(mut data)) = map.remove("data") {
        if options.is_empty() || prefer_data {
            if let Some(Value::Array(values)) = data.remove("values") {
                let from_data = options_from_array(&values);
                if !from_data.is_empty() {
                    options = from_data;
                }
            }
        }
        if !data.is_empty() {
            map.insert("data".into(), Value::Object(data));
        }
    }
    dedupe_option_values(&mut options);

    let default_value = match map.remove("defaultValue") {
        Some(Value::String(s)) if !s.is_empty() => vec![s],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::Object(flags)) => options
            .iter()
            .filter(|o| flags.get(&o.value).and_then(Value::as_bool) == Some(true))
            .map(|o| o.value.clone())
            .collect(),
        _ => Vec::new(),
    };
    let mut field = ChoiceField {
        options,
        default_value,
    };
    field.retain_valid_defaults();
    field
}

fn options_from_array(values: &[Value]) -> Vec<ChoiceOption> {
    values
        .iter()
        .filter_map(|v| match v {
            Value::String(label) => Some(ChoiceOption {
                label: label.clone(),
                value: String::new(),
            }),
            Value::Object(o) => {
                let label = o.get("label").and_then(value_as_string).unwrap_or_default();
                let value = o.get("value").and_then(value_as_string).unwrap_or_default();
                if label.is_empty() && value.is_empty() {
                    None
                } else if label.is_empty() {
                    Some(ChoiceOption {
                        label: value.clone(),
                        value,
                    })
                } else {
                    Some(ChoiceOption { label, value })
                }
            }
            _ => None,
        })
        .collect()
}

fn take_options(map: &mut Map<String, Value>, field: &str) -> Vec<ChoiceOption> {
    match map.remove(field) {
        Some(Value::Array(values)) => {
            let mut options = options_from_array(&values);
            dedupe_option_values(&mut options);
            options
        }
        Some(other) => {
            map.insert(field.into(), other);
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn take_children(map: &mut Map<String, Value>) -> Result<Vec<Component>, FormError> {
    match map.remove("components") {
        Some(Value::Array(items)) => decode_components(&items),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err(FormError::Invalid("`components` must be an array".into())),
    }
}

fn take_quiz_children(map: &mut Map<String, Value>) -> Result<Vec<Component>, FormError> {
    match map.remove("components") {
        Some(Value::Array(items)) => items.iter().map(decode_quiz_child).collect(),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err(FormError::Invalid("`components` must be an array".into())),
    }
}

fn take_columns(map: &mut Map<String, Value>) -> Result<Vec<Column>, FormError> {
    let Some(Value::Array(items)) = map.remove("columns") else {
        return Ok(Vec::new());
    };
    items
        .iter()
        .map(|item| {
            let Value::Object(col) = item else {
                return Err(FormError::Invalid("column must be a JSON object".into()));
            };
            let num = |field: &str, default: u8| {
                col.get(field)
                    .and_then(Value::as_u64)
                    .map_or(default, |n| n.min(u64::from(GRID_WIDTH)) as u8)
            };
            let components = match col.get("components") {
                Some(Value::Array(children)) => decode_components(children)?,
                _ => Vec::new(),
            };
            Ok(Column {
                width: num("width", 0),
                offset: num("offset", 0),
                push: num("push", 0),
                pull: num("pull", 0),
                size: col
                    .get("size")
                    .and_then(Value::as_str)
                    .unwrap_or("md")
                    .to_string(),
                components,
            })
        })
        .collect()
}

fn take_answer_rows(map: &mut Map<String, Value>) -> Vec<AnswerRow> {
    let Some(Value::Array(rows)) = map.remove("defaultValue") else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| {
            let row = row.as_object()?;
            let question_key = row.get("questionKey").and_then(Value::as_str)?;
            Some(AnswerRow {
                question_key: ComponentKey::intern(question_key),
                question: row
                    .get("question")
                    .and_then(value_as_string)
                    .unwrap_or_default(),
                options: row
                    .get("options")
                    .and_then(Value::as_array)
                    .map(|o| options_from_array(o))
                    .unwrap_or_default(),
                answer: row
                    .get("answer")
                    .and_then(value_as_string)
                    .unwrap_or_default(),
            })
        })
        .collect()
}

fn take_html(map: &mut Map<String, Value>) -> String {
    let html = take_string(map, "html");
    let content = take_string(map, "content");
    html.filter(|h| !h.is_empty())
        .or(content)
        .unwrap_or_default()
}

fn take_formula(map: &mut Map<String, Value>) -> Option<String> {
    take_string(map, "calculateValue").filter(|f| !f.trim().is_empty())
}

fn decode_validation(mut v: Map<String, Value>) -> Validation {
    let required = take_bool(&mut v, "required").unwrap_or(false);
    let min_length = take_u64(&mut v, "minLength");
    let max_length = take_u64(&mut v, "maxLength");
    let min = take_f64(&mut v, "min");
    let max = take_f64(&mut v, "max");
    let pattern = take_string(&mut v, "pattern").filter(|p| !p.is_empty());
    let custom_message = take_string(&mut v, "customMessage").filter(|m| !m.is_empty());
    Validation {
        required,
        min_length,
        max_length,
        min,
        max,
        pattern,
        custom_message,
        extra: v,
    }
}

fn decode_conditional(value: &Value) -> Option<Conditional> {
    let c = value.as_object()?;
    let when = c.get("when").and_then(Value::as_str).unwrap_or_default();
    if when.is_empty() {
        return None;
    }
    let show = match c.get("show") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => true,
    };
    Some(Conditional {
        show,
        when: ComponentKey::intern(when),
        eq: c.get("eq").and_then(value_as_string).unwrap_or_default(),
    })
}

// ─── Encode ──────────────────────────────────────────────────────────────

/// Encode a component (and its subtree). With `bundles`, owners and
/// drivers carry their wire markers.
pub fn encode_component(component: &Component, bundles: Option<&BundleTable>) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), json!(component.component_type().as_str()));
    out.insert("key".into(), json!(component.key.as_str()));
    out.insert("label".into(), json!(component.label));
    if component.hide_label {
        out.insert("hideLabel".into(), json!(true));
    }
    if let Some(d) = &component.description {
        out.insert("description".into(), json!(d));
    }

    encode_kind(component, bundles, &mut out);

    if !component.validate.is_empty() {
        out.insert("validate".into(), encode_validation(&component.validate));
    }
    if let Some(c) = &component.conditional {
        out.insert(
            "conditional".into(),
            json!({ "show": c.show, "when": c.when.as_str(), "eq": c.eq }),
        );
    }
    for (k, v) in &component.extra {
        if !out.contains_key(k) {
            out.insert(k.clone(), v.clone());
        }
    }

    if let Some(table) = bundles {
        if let Some(bundle) = table.get(component.key) {
            out.insert(DRIVER_KEY_FIELD.into(), json!(bundle.driver.as_str()));
        }
        if table.owner_of_driver(component.key).is_some() {
            out.insert(DRIVER_FLAG.into(), json!(true));
        }
    }
    Value::Object(out)
}

pub fn encode_components(components: &[Component], bundles: Option<&BundleTable>) -> Vec<Value> {
    components
        .iter()
        .map(|c| encode_component(c, bundles))
        .collect()
}

fn encode_kind(component: &Component, bundles: Option<&BundleTable>, out: &mut Map<String, Value>) {
    match &component.kind {
        ComponentKind::TextArea { placeholder } => {
            if let Some(p) = placeholder {
                out.insert("placeholder".into(), json!(p));
            }
        }
        ComponentKind::Radio(field) => {
            out.insert("values".into(), encode_options(&field.options));
            if let Some(v) = field.default_value.first() {
                out.insert("defaultValue".into(), json!(v));
            }
        }
        ComponentKind::Select(field) => {
            let mut data = match component.extra.get("data") {
                Some(Value::Object(d)) => d.clone(),
                _ => Map::new(),
            };
            data.insert("values".into(), encode_options(&field.options));
            out.insert("data".into(), Value::Object(data));
            if let Some(v) = field.default_value.first() {
                out.insert("defaultValue".into(), json!(v));
            }
        }
        ComponentKind::SelectBoxes(field) => {
            out.insert("values".into(), encode_options(&field.options));
            let flags: Map<String, Value> = field
                .options
                .iter()
                .map(|o| (o.value.clone(), json!(field.default_value.contains(&o.value))))
                .collect();
            out.insert("defaultValue".into(), Value::Object(flags));
        }
        ComponentKind::File
        | ComponentKind::Phone
        | ComponentKind::Address
        | ComponentKind::Asset
        | ComponentKind::Account
        | ComponentKind::Speed => {}
        ComponentKind::Number { calculate_value } => {
            if let Some(f) = calculate_value {
                out.insert("calculateValue".into(), json!(f));
            }
        }
        ComponentKind::Currency {
            currency,
            calculate_value,
        } => {
            out.insert("currency".into(), json!(currency));
            if let Some(f) = calculate_value {
                out.insert("calculateValue".into(), json!(f));
            }
        }
        ComponentKind::DateTime {
            enable_date,
            enable_time,
        } => {
            out.insert("enableDate".into(), json!(enable_date));
            out.insert("enableTime".into(), json!(enable_time));
        }
        ComponentKind::Fieldset { components }
        | ComponentKind::EditGrid { components }
        | ComponentKind::Quiz { components } => {
            out.insert(
                "components".into(),
                Value::Array(encode_components(components, bundles)),
            );
        }
        ComponentKind::Columns { columns } => {
            let cols: Vec<Value> = columns
                .iter()
                .map(|c| {
                    json!({
                        "width": c.width,
                        "offset": c.offset,
                        "push": c.push,
                        "pull": c.pull,
                        "size": c.size,
                        "components": encode_components(&c.components, bundles),
                    })
                })
                .collect();
            out.insert("columns".into(), Value::Array(cols));
        }
        ComponentKind::AnswerKey { rows } => {
            out.insert("components".into(), answer_key_template());
            let rows: Vec<Value> = rows
                .iter()
                .map(|r| {
                    json!({
                        "questionKey": r.question_key.as_str(),
                        "question": r.question,
                        "answer": r.answer,
                        "options": encode_options(&r.options),
                    })
                })
                .collect();
            out.insert("defaultValue".into(), Value::Array(rows));
        }
        ComponentKind::Survey { questions, values } => {
            out.insert("questions".into(), encode_options(questions));
            out.insert("values".into(), encode_options(values));
        }
        ComponentKind::Content { html } | ComponentKind::Disclaimer { html } => {
            out.insert("html".into(), json!(html));
        }
    }
}

/// Row template of an answer-key grid. Its keys are row-scoped and never
/// enter the document registry.
fn answer_key_template() -> Value {
    json!([
        { "type": "textarea", "key": "question", "label": "Question", "disabled": true },
        { "type": "textarea", "key": "answer", "label": "Answer" },
    ])
}

fn encode_options(options: &[ChoiceOption]) -> Value {
    Value::Array(
        options
            .iter()
            .map(|o| json!({ "label": o.label, "value": o.value }))
            .collect(),
    )
}

fn encode_validation(v: &Validation) -> Value {
    let mut out = Map::new();
    if v.required {
        out.insert("required".into(), json!(true));
    }
    if let Some(n) = v.min_length {
        out.insert("minLength".into(), json!(n));
    }
    if let Some(n) = v.max_length {
        out.insert("maxLength".into(), json!(n));
    }
    if let Some(n) = v.min {
        out.insert("min".into(), json!(n));
    }
    if let Some(n) = v.max {
        out.insert("max".into(), json!(n));
    }
    if let Some(p) = &v.pattern {
        out.insert("pattern".into(), json!(p));
    }
    if let Some(m) = &v.custom_message {
        out.insert("customMessage".into(), json!(m));
    }
    for (k, val) in &v.extra {
        out.entry(k.clone()).or_insert_with(|| val.clone());
    }
    Value::Object(out)
}

/// Decode a bare `validate` object, as sent by the editor's validation form.
pub fn validation_from_value(value: &Value) -> Result<Validation, FormError> {
    match value {
        Value::Object(map) => Ok(decode_validation(map.clone())),
        Value::Null => Ok(Validation::default()),
        _ => Err(FormError::Invalid("`validate` must be a JSON object".into())),
    }
}

pub fn validation_to_value(validation: &Validation) -> Value {
    encode_validation(validation)
}

/// Decode an option list: plain labels or `{label, value}` objects.
/// Missing values are slugged from the label and deduplicated.
pub fn options_from_value(value: &Value) -> Result<Vec<ChoiceOption>, FormError> {
    let Value::Array(values) = value else {
        return Err(FormError::Invalid("options must be a JSON array".into()));
    };
    let mut options = options_from_array(values);
    dedupe_option_values(&mut options);
    Ok(options)
}

/// Decode a visibility rule; `null` clears it.
pub fn conditional_from_value(value: &Value) -> Result<Option<Conditional>, FormError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(_) => decode_conditional(value)
            .map(Some)
            .ok_or_else(|| FormError::Invalid("conditional is missing `when`".into())),
        _ => Err(FormError::Invalid("conditional must be a JSON object".into())),
    }
}

// ─── Field helpers ───────────────────────────────────────────────────────

/// Strings, numbers and booleans all read as strings.
fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn take_string(map: &mut Map<String, Value>, field: &str) -> Option<String> {
    match map.remove(field)? {
        Value::Null => None,
        v => match value_as_string(&v) {
            Some(s) => Some(s),
            None => {
                map.insert(field.into(), v);
                None
            }
        },
    }
}

fn take_bool(map: &mut Map<String, Value>, field: &str) -> Option<bool> {
    match map.remove(field)? {
        Value::Bool(b) => Some(b),
        Value::String(s) if s == "true" || s == "false" => Some(s == "true"),
        Value::Null => None,
        other => {
            map.insert(field.into(), other);
            None
        }
    }
}

fn take_u64(map: &mut Map<String, Value>, field: &str) -> Option<u64> {
    match map.remove(field)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) if !s.is_empty() => s.parse().ok(),
        _ => None,
    }
}

fn take_f64(map: &mut Map<String, Value>, field: &str) -> Option<f64> {
    match map.remove(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.is_empty() => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_type_is_invalid() {
        let err = decode_component(&json!({"key": "a"})).unwrap_err();
        assert!(matches!(err, FormError::Invalid(_)));
    }

    #[test]
    fn unknown_type_is_schema_drift() {
        let err = decode_component(&json!({"type": "hologram", "key": "a"})).unwrap_err();
        assert!(matches!(err, FormError::UnknownType(t) if t == "hologram"));
    }

    #[test]
    fn textfield_decodes_as_textarea() {
        let c = decode_component(&json!({"type": "textfield", "key": "name", "label": "Name"}))
            .unwrap();
        assert_eq!(c.component_type(), ComponentType::TextArea);
        assert_eq!(encode_component(&c, None)["type"], "textarea");
    }

    #[test]
    fn select_options_come_from_data_values() {
        let c = decode_component(&json!({
            "type": "select",
            "key": "color",
            "data": {"values": [{"label": "Red", "value": "red"}], "url": "x"},
            "defaultValue": "red"
        }))
        .unwrap();
        let field = c.choice().unwrap();
        assert_eq!(field.options.len(), 1);
        assert_eq!(field.default_value, ["red"]);
        let out = encode_component(&c, None);
        assert_eq!(out["data"]["values"][0]["value"], "red");
        assert_eq!(out["data"]["url"], "x");
    }

    #[test]
    fn plain_string_options_get_slug_values() {
        let c = decode_component(&json!({
            "type": "radio", "key": "q", "values": ["Yes", "Not sure"]
        }))
        .unwrap();
        let values: Vec<_> = c.choice().unwrap().options.iter().map(|o| &o.value).collect();
        assert_eq!(values, ["yes", "notSure"]);
    }

    #[test]
    fn selectboxes_default_is_a_flag_map() {
        let c = decode_component(&json!({
            "type": "selectboxes",
            "key": "pets",
            "values": [{"label": "Cat", "value": "cat"}, {"label": "Dog", "value": "dog"}],
            "defaultValue": {"cat": false, "dog": true}
        }))
        .unwrap();
        assert_eq!(c.choice().unwrap().default_value, ["dog"]);
        let out = encode_component(&c, None);
        assert_eq!(out["defaultValue"], json!({"cat": false, "dog": true}));
    }

    #[test]
    fn date_alias_sets_flags() {
        let c = decode_component(&json!({"type": "date", "key": "dob"})).unwrap();
        assert_eq!(
            c.kind,
            ComponentKind::DateTime {
                enable_date: true,
                enable_time: false
            }
        );
    }

    #[test]
    fn content_alias_fills_html() {
        let c = decode_component(&json!({"type": "htmlelement", "key": "h", "content": "<p>x</p>"}))
            .unwrap();
        assert_eq!(
            c.kind,
            ComponentKind::Content {
                html: "<p>x</p>".into()
            }
        );
    }

    #[test]
    fn answer_key_prefix_promotes_editgrid_inside_quiz() {
        let c = decode_quiz_child(&json!({
            "type": "editgrid",
            "key": "answerKeyQuiz",
            "components": [{"type": "textarea", "key": "question"}],
            "defaultValue": [
                {"questionKey": "q1", "question": "Q1", "answer": "Yes",
                 "options": [{"label": "Yes", "value": "yes"}]}
            ]
        }))
        .unwrap();
        let ComponentKind::AnswerKey { rows } = &c.kind else {
            panic!("expected answer key, got {:?}", c.kind);
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].answer, "Yes");
    }

    #[test]
    fn answer_key_named_grid_outside_quiz_keeps_children() {
        let src = json!({
            "type": "editgrid",
            "key": "answerKeyLog",
            "label": "Answer log",
            "components": [
                {"type": "textarea", "key": "entry", "label": "Entry"},
                {"type": "number", "key": "score", "label": "Score"}
            ]
        });
        let c = decode_component(&src).unwrap();
        assert_eq!(c.component_type(), ComponentType::EditGrid);
        let keys: Vec<&str> = c.children().unwrap().iter().map(|x| x.key.as_str()).collect();
        assert_eq!(keys, ["entry", "score"]);
        assert_eq!(decode_component(&encode_component(&c, None)).unwrap(), c);
    }

    #[test]
    fn unknown_fields_survive_roundtrip() {
        let src = json!({
            "type": "textarea",
            "key": "notes",
            "label": "Notes",
            "tableView": true,
            "customClass": "wide"
        });
        let c = decode_component(&src).unwrap();
        assert_eq!(c.extra.get("customClass"), Some(&json!("wide")));
        let back = decode_component(&encode_component(&c, None)).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn conditional_without_when_is_dropped() {
        let c = decode_component(&json!({
            "type": "textarea", "key": "a", "conditional": {"show": null, "when": null, "eq": ""}
        }))
        .unwrap();
        assert!(c.conditional.is_none());
    }

    #[test]
    fn columns_decode_widths_and_children() {
        let c = decode_component(&json!({
            "type": "columns",
            "key": "row",
            "columns": [
                {"width": 6, "components": [{"type": "textarea", "key": "l"}]},
                {"width": 6, "components": []}
            ]
        }))
        .unwrap();
        let cols = c.columns().unwrap();
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].components[0].key.as_str(), "l");
        assert_eq!(cols[1].size, "md");
    }

    #[test]
    fn editor_option_lists_mix_labels_and_objects() {
        let options =
            options_from_value(&json!(["Red", {"label": "Dark red", "value": "red"}])).unwrap();
        let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, ["red", "red1"]);
        assert!(options_from_value(&json!("Red")).is_err());
    }

    #[test]
    fn editor_conditional_null_clears() {
        assert_eq!(conditional_from_value(&Value::Null).unwrap(), None);
        let c = conditional_from_value(&json!({"when": "a", "eq": "x"}))
            .unwrap()
            .unwrap();
        assert!(c.show);
        assert!(conditional_from_value(&json!({"eq": "x"})).is_err());
    }
}
