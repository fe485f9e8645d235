//! Editor settings.

use ff_core::bundle::ActionsConfig;
use ff_core::error::FormError;
use ff_core::model::{MAX_COLUMNS, MIN_COLUMNS};
use serde::{Deserialize, Serialize};

/// Configuration for an `EditorSession`.
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Maximum undo depth. Default: **200**.
    pub undo_depth: usize,

    /// Column count used by the "wrap in columns" action (2 or 3).
    /// Default: **2**.
    pub wrap_columns: usize,

    /// Most columns a drop may grow a row to. Never above the model's hard
    /// limit of 4. Default: **4**.
    pub max_columns: usize,

    /// Labels and key prefix of Actions bundles.
    pub actions: ActionsConfig,

    /// Rebuild quiz answer keys after every command. Default: **true**.
    pub sync_quizzes: bool,

    /// Tidy the source row when a drag empties one of its columns.
    /// Default: **true**.
    pub prune_columns: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            undo_depth: 200,
            wrap_columns: 2,
            max_columns: MAX_COLUMNS,
            actions: ActionsConfig::default(),
            sync_quizzes: true,
            prune_columns: true,
        }
    }
}

impl EditorConfig {
    /// Parse a config object, clamping out-of-range values.
    pub fn from_json(src: &str) -> Result<Self, FormError> {
        let config: EditorConfig = serde_json::from_str(src)?;
        Ok(config.clamped())
    }

    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.undo_depth = self.undo_depth.max(1);
        self.wrap_columns = self.wrap_columns.clamp(2, 3);
        self.max_columns = self.max_columns.clamp(MIN_COLUMNS, MAX_COLUMNS);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config = EditorConfig::from_json(r#"{"undoDepth": 10, "syncQuizzes": false}"#).unwrap();
        assert_eq!(config.undo_depth, 10);
        assert!(!config.sync_quizzes);
        assert_eq!(config.wrap_columns, 2);
        assert_eq!(config.actions.key_prefix, "actions");
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config =
            EditorConfig::from_json(r#"{"undoDepth": 0, "wrapColumns": 9, "maxColumns": 12}"#)
                .unwrap();
        assert_eq!(config.undo_depth, 1);
        assert_eq!(config.wrap_columns, 3);
        assert_eq!(config.max_columns, MAX_COLUMNS);
    }

    #[test]
    fn actions_labels_are_configurable() {
        let config = EditorConfig::from_json(
            r#"{"actions": {"driverLabel": "Follow-up", "keyPrefix": "followUp"}}"#,
        )
        .unwrap();
        assert_eq!(config.actions.driver_label, "Follow-up");
        assert_eq!(config.actions.key_prefix, "followUp");
        assert_eq!(config.actions.follower_label, "Comment");
    }
}
