//! Lint diagnostics for form documents.
//!
//! Reports structural issues without modifying the document. The editor
//! shows the results next to the outline; import surfaces them as notices.

use crate::document::FormDocument;
use crate::formula::{RefScope, references};
use crate::key::ComponentKey;
use crate::locate;
use crate::model::{Component, ComponentKind, GRID_WIDTH, MAX_COLUMNS, MIN_COLUMNS};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

// ─── Diagnostic types ────────────────────────────────────────────────────

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    /// Should be fixed: the form will misbehave.
    Warning,
    /// Informational: stale derived data, fixed by the next sync.
    Info,
}

/// A single lint diagnostic for a component.
#[derive(Debug, Clone, Serialize)]
pub struct LintDiagnostic {
    /// The component this diagnostic refers to.
    pub key: ComponentKey,
    /// Human-readable message.
    pub message: String,
    pub severity: LintSeverity,
    /// Short rule identifier (e.g. "dangling-conditional", "column-width").
    pub rule: &'static str,
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Run all lint rules over the document and return diagnostics.
#[must_use]
pub fn lint_document(doc: &FormDocument) -> Vec<LintDiagnostic> {
    let mut diags = Vec::new();
    lint_keys(doc, &mut diags);
    lint_conditionals(doc, &mut diags);
    lint_formulas(doc, &mut diags);
    lint_dependency_cycles(doc, &mut diags);
    lint_columns(doc, &mut diags);
    lint_answer_keys(doc, &mut diags);
    diags
}

fn warning(key: ComponentKey, rule: &'static str, message: String) -> LintDiagnostic {
    LintDiagnostic {
        key,
        message,
        severity: LintSeverity::Warning,
        rule,
    }
}

// ─── Rules ────────────────────────────────────────────────────────────────

/// Empty keys and keys held by more than one component.
fn lint_keys(doc: &FormDocument, diags: &mut Vec<LintDiagnostic>) {
    let mut seen = HashSet::new();
    locate::walk(doc.components(), &mut |path, c| {
        if c.key.is_empty() {
            diags.push(warning(
                c.key,
                "empty-key",
                format!("Component at {path} has no key."),
            ));
        } else if !seen.insert(c.key) {
            diags.push(warning(
                c.key,
                "duplicate-key",
                format!("Key `{}` is used by more than one component.", c.key),
            ));
        }
    });
}

/// Conditionals naming a missing component, and components that follow an
/// actions driver without being part of its bundle.
fn lint_conditionals(doc: &FormDocument, diags: &mut Vec<LintDiagnostic>) {
    let bundles = doc.bundles();
    locate::walk(doc.components(), &mut |_, c| {
        let Some(cond) = &c.conditional else {
            return;
        };
        if !doc.contains(cond.when) {
            diags.push(warning(
                c.key,
                "dangling-conditional",
                format!("`{}` depends on `{}`, which does not exist.", c.key, cond.when),
            ));
            return;
        }
        if let Some(owner) = bundles.owner_of_driver(cond.when) {
            if bundles.owner_of_member(c.key) != Some(owner) {
                diags.push(warning(
                    c.key,
                    "orphan-follower",
                    format!(
                        "`{}` follows actions driver `{}` but is not part of `{owner}`'s bundle.",
                        c.key, cond.when
                    ),
                ));
            }
        }
    });

    for (owner, bundle) in bundles.iter() {
        for member in std::iter::once(bundle.driver).chain(bundle.followers.iter().copied()) {
            if !doc.contains(member) {
                diags.push(warning(
                    owner,
                    "orphan-follower",
                    format!("Actions bundle of `{owner}` names missing component `{member}`."),
                ));
            }
        }
    }
}

/// Unparseable formulas and `data.*` references to missing keys.
fn lint_formulas(doc: &FormDocument, diags: &mut Vec<LintDiagnostic>) {
    locate::walk(doc.components(), &mut |_, c| {
        let Some(src) = c.calculate_value() else {
            return;
        };
        match references(src) {
            Err(e) => diags.push(warning(
                c.key,
                "invalid-formula",
                format!("Formula of `{}` does not parse: {e}", c.key),
            )),
            Ok(refs) => {
                for r in refs.iter().filter(|r| r.scope == RefScope::Data) {
                    if !doc.contains(ComponentKey::intern(&r.key)) {
                        diags.push(warning(
                            c.key,
                            "dangling-formula",
                            format!("Formula of `{}` reads `data.{}`, which does not exist.", c.key, r.key),
                        ));
                    }
                }
            }
        }
    });
}

/// Components that depend on themselves through conditionals or formulas.
fn lint_dependency_cycles(doc: &FormDocument, diags: &mut Vec<LintDiagnostic>) {
    let (graph, _) = dependency_graph(doc.components());
    for scc in tarjan_scc(&graph) {
        let cyclic = scc.len() > 1 || graph.contains_edge(scc[0], scc[0]);
        if !cyclic {
            continue;
        }
        let mut members: Vec<ComponentKey> = scc.iter().map(|&i| graph[i]).collect();
        members.sort();
        let names = members
            .iter()
            .map(|k| format!("`{k}`"))
            .collect::<Vec<_>>()
            .join(", ");
        for key in &members {
            diags.push(warning(
                *key,
                "dependency-cycle",
                format!("`{key}` is part of a dependency cycle: {names}."),
            ));
        }
    }
}

/// Column counts outside the allowed range and rows not spanning the grid.
fn lint_columns(doc: &FormDocument, diags: &mut Vec<LintDiagnostic>) {
    locate::walk(doc.components(), &mut |_, c| {
        let Some(columns) = c.columns() else {
            return;
        };
        if !(MIN_COLUMNS..=MAX_COLUMNS).contains(&columns.len()) {
            diags.push(warning(
                c.key,
                "column-count",
                format!(
                    "`{}` has {} column(s); a row holds {MIN_COLUMNS} to {MAX_COLUMNS}.",
                    c.key,
                    columns.len()
                ),
            ));
        }
        let total: u32 = columns.iter().map(|col| u32::from(col.width)).sum();
        if total != u32::from(GRID_WIDTH) {
            diags.push(warning(
                c.key,
                "column-width",
                format!("Column widths of `{}` sum to {total}, not {GRID_WIDTH}.", c.key),
            ));
        }
    });
}

/// Quizzes whose answer key is missing, doubled, or out of date.
fn lint_answer_keys(doc: &FormDocument, diags: &mut Vec<LintDiagnostic>) {
    locate::walk(doc.components(), &mut |_, c| {
        let ComponentKind::Quiz { components } = &c.kind else {
            return;
        };
        let grids: Vec<&Component> = components
            .iter()
            .filter(|g| matches!(g.kind, ComponentKind::AnswerKey { .. }))
            .collect();
        if grids.len() > 1 {
            diags.push(warning(
                c.key,
                "answer-key",
                format!("Quiz `{}` has {} answer keys.", c.key, grids.len()),
            ));
        }

        let mut questions = Vec::new();
        locate::walk(components, &mut |_, q| {
            if q.component_type().is_choice() && doc.bundles().owner_of_driver(q.key).is_none() {
                questions.push(q.key);
            }
        });
        let rows: Vec<ComponentKey> = match grids.first().map(|g| &g.kind) {
            Some(ComponentKind::AnswerKey { rows }) => rows.iter().map(|r| r.question_key).collect(),
            _ if questions.is_empty() => return,
            _ => {
                diags.push(warning(
                    c.key,
                    "answer-key",
                    format!("Quiz `{}` has questions but no answer key.", c.key),
                ));
                return;
            }
        };
        if rows != questions {
            diags.push(LintDiagnostic {
                key: c.key,
                message: format!(
                    "Answer key of `{}` lists {} question(s); the quiz has {}.",
                    c.key,
                    rows.len(),
                    questions.len()
                ),
                severity: LintSeverity::Info,
                rule: "answer-key",
            });
        }
    });
}

// ─── Dependency graph ────────────────────────────────────────────────────

/// Directed graph with an edge from each component to every component its
/// conditional or formula reads. Edges to missing keys are left out.
pub fn dependency_graph(
    components: &[Component],
) -> (DiGraph<ComponentKey, ()>, HashMap<ComponentKey, NodeIndex>) {
    let mut graph = DiGraph::new();
    let mut index: HashMap<ComponentKey, NodeIndex> = HashMap::new();
    locate::walk(components, &mut |_, c| {
        index.entry(c.key).or_insert_with(|| graph.add_node(c.key));
    });

    locate::walk(components, &mut |_, c| {
        let from = index[&c.key];
        let mut targets: Vec<ComponentKey> = Vec::new();
        if let Some(cond) = &c.conditional {
            targets.push(cond.when);
        }
        if let Some(Ok(refs)) = c.calculate_value().map(references) {
            targets.extend(refs.iter().map(|r| ComponentKey::intern(&r.key)));
        }
        for target in targets {
            if let Some(&to) = index.get(&target) {
                graph.update_edge(from, to, ());
            }
        }
    });
    (graph, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lint(value: serde_json::Value) -> Vec<LintDiagnostic> {
        lint_document(&FormDocument::from_value(&value).unwrap())
    }

    fn rules(diags: &[LintDiagnostic]) -> Vec<&'static str> {
        diags.iter().map(|d| d.rule).collect()
    }

    #[test]
    fn clean_document_has_no_findings() {
        let mut doc = FormDocument::new();
        let q = doc
            .create(crate::model::ComponentType::TextArea, "Question", &[], false, None)
            .unwrap();
        doc.toggle_actions(q, true).unwrap();
        assert!(lint_document(&doc).is_empty());
    }

    #[test]
    fn dangling_conditional() {
        let diags = lint(json!({"components": [
            {"type": "textarea", "key": "a",
             "conditional": {"show": true, "when": "ghost", "eq": "x"}}
        ]}));
        assert_eq!(rules(&diags), ["dangling-conditional"]);
        assert_eq!(diags[0].key.as_str(), "a");
    }

    #[test]
    fn follower_outside_bundle_is_orphaned() {
        let mut doc = FormDocument::new();
        let q = doc
            .create(crate::model::ComponentType::TextArea, "Question", &[], false, None)
            .unwrap();
        doc.toggle_actions(q, true).unwrap();
        let stray = doc
            .create(crate::model::ComponentType::TextArea, "Stray", &[], false, None)
            .unwrap();
        doc.set_conditional(
            stray,
            Some(crate::model::Conditional {
                show: true,
                when: ComponentKey::intern("actions1"),
                eq: "action".into(),
            }),
        )
        .unwrap();
        let diags = lint_document(&doc);
        assert_eq!(rules(&diags), ["orphan-follower"]);
        assert_eq!(diags[0].key, stray);
    }

    #[test]
    fn formulas_are_checked() {
        let diags = lint(json!({"components": [
            {"type": "number", "key": "price"},
            {"type": "number", "key": "total", "calculateValue": "value = data.price * data.qty"},
            {"type": "number", "key": "broken", "calculateValue": "value = (data.price"}
        ]}));
        assert_eq!(rules(&diags), ["dangling-formula", "invalid-formula"]);
    }

    #[test]
    fn conditional_cycle_is_reported_for_each_member() {
        let diags = lint(json!({"components": [
            {"type": "radio", "key": "a", "conditional": {"show": true, "when": "b", "eq": "y"}},
            {"type": "radio", "key": "b", "conditional": {"show": true, "when": "a", "eq": "y"}},
            {"type": "number", "key": "c", "calculateValue": "value = data.c + 1"}
        ]}));
        let cycles: Vec<&str> = diags
            .iter()
            .filter(|d| d.rule == "dependency-cycle")
            .map(|d| d.key.as_str())
            .collect();
        assert_eq!(cycles.len(), 3);
        assert!(cycles.contains(&"a") && cycles.contains(&"b") && cycles.contains(&"c"));
    }

    #[test]
    fn bad_column_rows() {
        let diags = lint(json!({"components": [
            {"type": "columns", "key": "row", "columns": [
                {"width": 5, "components": []}
            ]}
        ]}));
        assert_eq!(rules(&diags), ["column-count", "column-width"]);
    }

    #[test]
    fn quiz_without_answer_key() {
        let diags = lint(json!({"components": [
            {"type": "quiz", "key": "quiz", "components": [
                {"type": "radio", "key": "q1", "values": [{"label": "A", "value": "a"}]}
            ]}
        ]}));
        assert_eq!(rules(&diags), ["answer-key"]);
        assert_eq!(diags[0].severity, LintSeverity::Warning);
    }

    #[test]
    fn synced_quiz_is_clean() {
        let mut doc = FormDocument::from_value(&json!({"components": [
            {"type": "quiz", "key": "quiz", "components": [
                {"type": "radio", "key": "q1", "values": [{"label": "A", "value": "a"}]}
            ]}
        ]}))
        .unwrap();
        doc.sync_all_quizzes();
        assert!(lint_document(&doc).is_empty());
    }
}
