// Dino Tracker - Core Library
// Stat levels, mutation totals and stat-change tasks for tribe creatures.
// Used by the CLI, the API server, and tests.

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod creature;
pub mod error;
pub mod import;
pub mod level;
pub mod sheet;
pub mod store;
pub mod tasks;

// Re-export commonly used types
pub use catalog::{SpecialStatRule, StatCatalog, StatDefinition, StatId};
pub use classifier::{is_aquatic, type_name, TypeId, TypeRules};
pub use config::Config;
pub use creature::Creature;
pub use error::TrackerError;
pub use import::{load_creatures_csv, load_creatures_from_reader};
pub use level::{LevelBreakdown, LevelCalculator, StatContribution};
pub use sheet::StatSheet;
pub use store::{
    setup_database, SqliteTaskStore, StatusFilter, StoredEvent, TaskEvent, TaskEventKind,
    TaskFilter, TaskStore,
};
pub use tasks::{derive_tasks, diff_sheets, NewTask, SheetKind, StatEdit, Task, TaskStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
