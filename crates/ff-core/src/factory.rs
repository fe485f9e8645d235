//! Component factory: canonical default records per component type.

use crate::key::{ComponentKey, KeyRegistry};
use crate::model::{
    ChoiceField, ChoiceOption, Column, Component, ComponentKind, ComponentType, GRID_WIDTH,
    MIN_COLUMNS,
};
use serde_json::Value;

/// Option value used when a label has no alphanumeric characters.
const FALLBACK_OPTION_VALUE: &str = "option";

/// Currency assigned to new currency fields.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Build a component of type `ty` with a fresh key derived from `label`.
pub fn create_component(
    ty: ComponentType,
    label: &str,
    options: &[String],
    hide_label: bool,
    registry: &mut KeyRegistry,
) -> Component {
    let key = registry.generate_unique_key(label);
    create_component_with_key(ty, key, label, options, hide_label)
}

/// Build a component with a key the caller has already reserved.
pub fn create_component_with_key(
    ty: ComponentType,
    key: ComponentKey,
    label: &str,
    options: &[String],
    hide_label: bool,
) -> Component {
    let kind = default_kind(ty, options);
    let mut component = Component::new(key, label, kind);
    component.hide_label = hide_label;
    if !ty.is_layout() && !ty.is_container() && ty != ComponentType::AnswerKey {
        component.extra.insert("input".into(), Value::Bool(true));
    }
    log::debug!("factory: {} `{key}`", ty.as_str());
    component
}

fn default_kind(ty: ComponentType, options: &[String]) -> ComponentKind {
    match ty {
        ComponentType::TextArea => ComponentKind::TextArea { placeholder: None },
        ComponentType::Radio => ComponentKind::Radio(ChoiceField::new(build_options(options))),
        ComponentType::Select => ComponentKind::Select(ChoiceField::new(build_options(options))),
        ComponentType::SelectBoxes => {
            ComponentKind::SelectBoxes(ChoiceField::new(build_options(options)))
        }
        ComponentType::File => ComponentKind::File,
        ComponentType::Phone => ComponentKind::Phone,
        ComponentType::Address => ComponentKind::Address,
        ComponentType::Asset => ComponentKind::Asset,
        ComponentType::Account => ComponentKind::Account,
        ComponentType::Number => ComponentKind::Number {
            calculate_value: None,
        },
        ComponentType::Currency => ComponentKind::Currency {
            currency: DEFAULT_CURRENCY.into(),
            calculate_value: None,
        },
        ComponentType::DateTime => ComponentKind::DateTime {
            enable_date: true,
            enable_time: true,
        },
        ComponentType::Fieldset => ComponentKind::Fieldset {
            components: Vec::new(),
        },
        ComponentType::Columns => ComponentKind::Columns {
            columns: empty_columns(MIN_COLUMNS),
        },
        ComponentType::EditGrid => ComponentKind::EditGrid {
            components: Vec::new(),
        },
        ComponentType::AnswerKey => ComponentKind::AnswerKey { rows: Vec::new() },
        ComponentType::Survey => ComponentKind::Survey {
            questions: Vec::new(),
            values: build_options(options),
        },
        ComponentType::Content => ComponentKind::Content {
            html: String::new(),
        },
        ComponentType::Disclaimer => ComponentKind::Disclaimer {
            html: String::new(),
        },
        ComponentType::Quiz => ComponentKind::Quiz {
            components: Vec::new(),
        },
        ComponentType::Speed => ComponentKind::Speed,
    }
}

/// `n` empty columns of equal width.
pub fn empty_columns(n: usize) -> Vec<Column> {
    let n = n.max(1);
    let width = GRID_WIDTH / n as u8;
    let mut columns: Vec<Column> = (0..n).map(|_| Column::with_width(width)).collect();
    crate::model::normalize_widths(&mut columns);
    columns
}

/// Turn option labels into `{label, value}` pairs with unique values.
pub fn build_options<S: AsRef<str>>(labels: &[S]) -> Vec<ChoiceOption> {
    let mut options: Vec<ChoiceOption> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.as_ref().trim();
        if label.is_empty() {
            continue;
        }
        let value = unique_option_value(&options, &camel_slug(label));
        options.push(ChoiceOption {
            label: label.to_string(),
            value,
        });
    }
    options
}

/// Make every option value unique within the list, keeping the first
/// occurrence and suffixing later ones. Empty values are derived from the
/// label.
pub fn dedupe_option_values(options: &mut [ChoiceOption]) {
    for i in 0..options.len() {
        let wanted = if options[i].value.is_empty() {
            camel_slug(&options[i].label)
        } else {
            options[i].value.clone()
        };
        let value = unique_option_value(&options[..i], &wanted);
        options[i].value = value;
    }
}

fn unique_option_value(taken: &[ChoiceOption], base: &str) -> String {
    let in_use = |v: &str| taken.iter().any(|o| o.value == v);
    if !in_use(base) {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base}{n}");
        if !in_use(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// `"Not sure"` → `"notSure"`, `"Yes/No"` → `"yesNo"`.
pub fn camel_slug(label: &str) -> String {
    let mut out = String::new();
    for word in label
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let lower = word.to_ascii_lowercase();
        if out.is_empty() {
            out.push_str(&lower);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                out.push(first.to_ascii_uppercase());
                out.extend(chars);
            }
        }
    }
    if out.is_empty() {
        FALLBACK_OPTION_VALUE.to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_slug_examples() {
        assert_eq!(camel_slug("Yes"), "yes");
        assert_eq!(camel_slug("Not sure"), "notSure");
        assert_eq!(camel_slug("Yes/No"), "yesNo");
        assert_eq!(camel_slug("E-MAIL me"), "eMailMe");
        assert_eq!(camel_slug("!!"), "option");
    }

    #[test]
    fn option_values_are_deduped_within_the_list() {
        let opts = build_options(&["Yes", "yes", "YES!", "No"]);
        let values: Vec<_> = opts.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, ["yes", "yes1", "yes2", "no"]);
    }

    #[test]
    fn option_dedup_ignores_global_registry() {
        let mut reg = KeyRegistry::new();
        reg.generate_unique_key("yes");
        let radio = create_component(
            ComponentType::Radio,
            "Agree?",
            &["Yes".into(), "No".into()],
            false,
            &mut reg,
        );
        let values: Vec<_> = radio
            .choice()
            .unwrap()
            .options
            .iter()
            .map(|o| o.value.clone())
            .collect();
        assert_eq!(values, ["yes", "no"]);
    }

    #[test]
    fn columns_start_with_two_half_width_slots() {
        let mut reg = KeyRegistry::new();
        let cols = create_component(ComponentType::Columns, "Columns", &[], false, &mut reg);
        let widths: Vec<u8> = cols.columns().unwrap().iter().map(|c| c.width).collect();
        assert_eq!(widths, [6, 6]);
        assert_eq!(cols.key.as_str(), "columns");
        assert!(!cols.extra.contains_key("input"));
    }

    #[test]
    fn containers_start_empty_and_inputs_are_flagged() {
        let mut reg = KeyRegistry::new();
        let fs = create_component(ComponentType::Fieldset, "Group A", &[], false, &mut reg);
        assert_eq!(fs.key.as_str(), "groupa");
        assert!(fs.children().unwrap().is_empty());
        let ta = create_component(ComponentType::TextArea, "Notes", &[], true, &mut reg);
        assert!(ta.hide_label);
        assert_eq!(ta.extra.get("input"), Some(&Value::Bool(true)));
    }

    #[test]
    fn dedupe_fills_missing_values() {
        let mut opts = vec![
            ChoiceOption {
                label: "Red".into(),
                value: String::new(),
            },
            ChoiceOption {
                label: "Crimson".into(),
                value: "red".into(),
            },
        ];
        dedupe_option_values(&mut opts);
        assert_eq!(opts[0].value, "red");
        assert_eq!(opts[1].value, "red1");
    }
}
