pub mod comparator;
pub mod engine;
pub mod events;
pub mod hasher;
pub mod inventory;
pub mod scanner;
pub mod state;

pub use comparator::{diff, ActionSummary, EditScript};
pub use engine::{run_with_config, AppliedResult, SyncConfig, SyncEngine, SyncReport};
pub use events::{EventSink, SyncEvent};
pub use hasher::{hash_file, hash_reader};
pub use inventory::{Entry, Inventory, FORMAT_VERSION};
pub use scanner::{FileScanner, FilterRules, ScanConfig};
