pub mod bundle;
pub mod codec;
pub mod document;
pub mod error;
pub mod exchange;
pub mod factory;
pub mod formula;
pub mod ingest;
pub mod key;
pub mod lint;
pub mod locate;
pub mod model;
pub mod mutate;
pub mod project;
pub mod quiz;
pub mod services;

pub use bundle::{ActionsConfig, Bundle, BundleTable};
pub use document::{FormDocument, Slot};
pub use error::FormError;
pub use exchange::ImportOutcome;
pub use factory::{create_component, create_component_with_key};
pub use ingest::{IngestReport, IngestTarget};
pub use key::{ComponentKey, KeyRegistry};
pub use lint::{LintDiagnostic, LintSeverity, lint_document};
pub use locate::{ComponentPath, PathStep};
pub use model::*;
pub use project::{ComponentCounts, OutlineEntry};
pub use services::{
    ComponentGenerator, MemoryTemplateStore, TemplateId, TemplateStore, Transcriber,
};
