// taskdeck - task store with categories, tags, collaborators and derived views

pub mod clock;
pub mod config;
pub mod filter;
pub mod models;
pub mod record;
pub mod sample;
pub mod settings;
pub mod snapshot;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use filter::{Filter, FilterOp};
pub use models::{
    Attachment, Category, CategoryPatch, Collaborator, NewAttachment, NewCategory, NewCollaborator, NewTag, NewTask,
    Priority, Tag, TagPatch, Task, TaskPatch, TaskStatus, now_ms,
};
pub use record::{IndexValue, Record};
pub use settings::{PrivacySettings, Settings};
pub use snapshot::{Collections, Snapshot};
pub use storage::{FileStorage, MemoryStorage, SqliteStorage, Storage};
pub use store::{Outcome, Store, TaskProgress};
