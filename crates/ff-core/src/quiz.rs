//! Quiz answer keys.
//!
//! Every quiz owns one edit-grid keyed `answerKey…` whose rows mirror the
//! quiz's question components (radio, select, selectboxes at any depth
//! inside the quiz). Rows are matched to questions by component key, so a
//! relabelled question keeps its recorded answer.

use crate::codec::ANSWER_KEY_PREFIX;
use crate::document::FormDocument;
use crate::error::FormError;
use crate::factory::create_component_with_key;
use crate::key::ComponentKey;
use crate::locate;
use crate::model::{AnswerRow, Component, ComponentKind, ComponentType};

impl FormDocument {
    /// Rebuild the answer key of `quiz` from its current questions.
    ///
    /// Creates the grid when it is missing and drops any extra grids. The
    /// answer follows the question's default; a question without one keeps
    /// its recorded answer while that is still one of its option labels.
    pub fn sync_answer_key(&mut self, quiz: ComponentKey) -> Result<(), FormError> {
        let questions = {
            let component = self.get(quiz)?;
            if !matches!(component.kind, ComponentKind::Quiz { .. }) {
                return Err(FormError::Invalid(format!("`{quiz}` is not a quiz")));
            }
            self.questions_of(component)
        };

        let grid_key = self.ensure_answer_grid(quiz)?;
        let Some(ComponentKind::AnswerKey { rows }) = self.find_mut(grid_key).map(|c| &mut c.kind)
        else {
            return Err(FormError::not_found(grid_key));
        };

        let previous = std::mem::take(rows);
        for question in &questions {
            let mut row = answer_row(question);
            if let Some(old) = previous.iter().find(|r| r.question_key == question.key) {
                if row.options.iter().any(|o| o.label == old.answer) && row.answer.is_empty() {
                    row.answer = old.answer.clone();
                }
            }
            rows.push(row);
        }
        log::debug!("quiz: `{quiz}` answer key has {} row(s)", rows.len());
        Ok(())
    }

    /// Refresh the answer-key row of one question. Returns `false` when
    /// `question` is not a question inside a quiz.
    ///
    /// A question without a row triggers a full rebuild of its quiz.
    pub fn sync_answer_row(&mut self, question: ComponentKey) -> Result<bool, FormError> {
        let Some(quiz) = self.enclosing_quiz(question) else {
            return Ok(false);
        };
        let row = match self.find(question) {
            Some(c) if self.is_question(c) => answer_row(c),
            _ => return Ok(false),
        };
        let grid = self.answer_grid_of(quiz);
        let updated = grid.and_then(|g| self.find_mut(g)).is_some_and(|g| {
            let ComponentKind::AnswerKey { rows } = &mut g.kind else {
                return false;
            };
            match rows.iter_mut().find(|r| r.question_key == question) {
                Some(existing) => {
                    *existing = row;
                    true
                }
                None => false,
            }
        });
        if !updated {
            self.sync_answer_key(quiz)?;
        }
        Ok(true)
    }

    /// Sync every quiz in the document.
    pub fn sync_all_quizzes(&mut self) {
        let mut quizzes = Vec::new();
        locate::walk(&self.components, &mut |_, c| {
            if matches!(c.kind, ComponentKind::Quiz { .. }) {
                quizzes.push(c.key);
            }
        });
        for quiz in quizzes {
            if let Err(e) = self.sync_answer_key(quiz) {
                log::warn!("quiz: could not sync `{quiz}`: {e}");
            }
        }
    }

    /// Key of the first answer-key grid among the quiz's direct children.
    pub fn answer_grid_of(&self, quiz: ComponentKey) -> Option<ComponentKey> {
        self.find(quiz)?
            .children()?
            .iter()
            .find(|c| matches!(c.kind, ComponentKind::AnswerKey { .. }))
            .map(|c| c.key)
    }

    /// Nearest quiz above `key`.
    pub fn enclosing_quiz(&self, key: ComponentKey) -> Option<ComponentKey> {
        let path = self.path_of(key)?;
        let mut parent = path.parent();
        while let Some(p) = parent {
            let component = self.resolve(&p)?;
            if matches!(component.kind, ComponentKind::Quiz { .. }) {
                return Some(component.key);
            }
            parent = p.parent();
        }
        None
    }

    fn is_question(&self, c: &Component) -> bool {
        c.component_type().is_choice() && self.bundles.owner_of_driver(c.key).is_none()
    }

    /// Choice components inside `quiz`, pre-order, without actions drivers.
    fn questions_of(&self, quiz: &Component) -> Vec<Component> {
        let mut out = Vec::new();
        for (_, list) in quiz.child_lists() {
            locate::walk(list, &mut |_, c| {
                if self.is_question(c) {
                    out.push(c.clone());
                }
            });
        }
        out
    }

    /// Make sure `quiz` has exactly one grid; return its key.
    fn ensure_answer_grid(&mut self, quiz: ComponentKey) -> Result<ComponentKey, FormError> {
        let grids: Vec<ComponentKey> = self
            .get(quiz)?
            .children()
            .map(|children| {
                children
                    .iter()
                    .filter(|c| matches!(c.kind, ComponentKind::AnswerKey { .. }))
                    .map(|c| c.key)
                    .collect()
            })
            .unwrap_or_default();

        if let Some((first, extra)) = grids.split_first() {
            for key in extra {
                log::warn!("quiz: `{quiz}` had a second answer key `{key}`, removed");
                self.detach(*key);
            }
            return Ok(*first);
        }

        let wanted =
            ComponentKey::intern(&format!("{ANSWER_KEY_PREFIX}{}", capitalize(quiz.as_str())));
        let key = if self.registry.register(wanted) {
            wanted
        } else {
            self.registry.generate_prefixed_key(ANSWER_KEY_PREFIX)
        };
        let grid =
            create_component_with_key(ComponentType::AnswerKey, key, "Answer Key", &[], false);
        self.child_list_mut(Some(quiz), None)?.push(grid);
        log::debug!("quiz: created answer key `{key}` for `{quiz}`");
        Ok(key)
    }
}

fn answer_row(question: &Component) -> AnswerRow {
    let field = question.choice();
    AnswerRow {
        question_key: question.key,
        question: question.label.clone(),
        options: field.map(|f| f.options.clone()).unwrap_or_default(),
        answer: field
            .and_then(|f| f.default_label())
            .unwrap_or_default()
            .to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
