pub mod commands;
pub mod config;
pub mod dnd;
pub mod session;

pub use commands::{CommandOutcome, CommandStack, EditCommand};
pub use config::EditorConfig;
pub use dnd::{DragSource, DropEvent, DropTarget, plan_drop};
pub use session::{EditorSession, Notice, NoticeLevel};
