// Task store: owns every collection and answers derived queries

use crate::clock::{Clock, SystemClock};
use crate::filter::{Filter, FilterOp};
use crate::models::{
    Category, CategoryPatch, Collaborator, DAY_MS, NewAttachment, NewCategory, NewCollaborator, NewTag, NewTask,
    Priority, Tag, TagPatch, Task, TaskPatch, TaskStatus, new_id,
};
use crate::record::Record;
use crate::sample;
use crate::settings::Settings;
use crate::snapshot::{self, Collections, Decoded, SNAPSHOT_BACKUP_KEY, SNAPSHOT_KEY, Snapshot};
use crate::storage::Storage;
use chrono::NaiveDate;
use eyre::{Result, eyre};
use tracing::{debug, info, warn};

/// What a mutation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State changed
    Applied,
    /// The target id was absent (or there was nothing to change); state is untouched
    NotFound,
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        self == Outcome::Applied
    }
}

/// Completion counts across all tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskProgress {
    pub completed: usize,
    pub total: usize,
}

impl TaskProgress {
    /// Whole percentage of completed tasks, 0 when there are none
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (self.completed * 100 / self.total) as u8
    }
}

/// In-memory task store with optional snapshot persistence.
///
/// All mutation goes through `&mut self`; readers never see a half-applied
/// change. When backed by storage, every applied mutation saves a snapshot.
/// Save failures are logged and otherwise ignored.
pub struct Store {
    data: Collections,
    settings: Settings,
    storage: Option<Box<dyn Storage>>,
    clock: Box<dyn Clock>,
    fresh: bool,
    read_only: bool,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Empty store without persistence
    pub fn new() -> Self {
        Self {
            data: Collections::default(),
            settings: Settings::default(),
            storage: None,
            clock: Box::new(SystemClock),
            fresh: true,
            read_only: false,
        }
    }

    /// Open a store backed by `storage`, loading the snapshot it holds.
    ///
    /// A missing snapshot gives an empty, fresh store. An unreadable one is
    /// logged and the store starts empty. The unreadable text is first copied
    /// to `SNAPSHOT_BACKUP_KEY`; when that is not possible, or the snapshot
    /// comes from a newer version, the store is read-only and never writes
    /// the snapshot key.
    pub fn open(storage: impl Storage + 'static) -> Self {
        let mut storage: Box<dyn Storage> = Box::new(storage);
        let settings = Settings::load(&*storage);
        let mut read_only = false;

        let (data, fresh) = match Self::load_snapshot(&*storage) {
            Ok(Some(data)) => {
                info!(
                    tasks = data.tasks.len(),
                    categories = data.categories.len(),
                    tags = data.tags.len(),
                    collaborators = data.collaborators.len(),
                    "Loaded snapshot"
                );
                (data, false)
            }
            Ok(None) => {
                info!("No snapshot found, starting empty");
                (Collections::default(), true)
            }
            Err(e) => {
                warn!(error = ?e, "Failed to load snapshot, starting empty");
                read_only = !Self::preserve_snapshot(&mut *storage);
                (Collections::default(), false)
            }
        };

        Self {
            data,
            settings,
            storage: Some(storage),
            clock: Box::new(SystemClock),
            fresh,
            read_only,
        }
    }

    /// Copy an unreadable snapshot aside. False when it has to stay untouched.
    fn preserve_snapshot(storage: &mut dyn Storage) -> bool {
        let text = match storage.get(SNAPSHOT_KEY) {
            Ok(Some(text)) => text,
            Ok(None) => return true,
            Err(e) => {
                warn!(error = ?e, "Cannot read snapshot, store is read-only");
                return false;
            }
        };

        if let Some(version) = snapshot::newer_version(&text) {
            warn!(version, "Snapshot was written by a newer version, store is read-only");
            return false;
        }

        match storage.put(SNAPSHOT_BACKUP_KEY, &text) {
            Ok(()) => {
                warn!(key = SNAPSHOT_BACKUP_KEY, "Copied unreadable snapshot");
                true
            }
            Err(e) => {
                warn!(error = ?e, "Failed to copy unreadable snapshot, store is read-only");
                false
            }
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// True when no snapshot existed at open time
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// True when changes are kept in memory only, see `open`
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Hand back the storage, e.g. to reopen it
    pub fn into_storage(self) -> Option<Box<dyn Storage>> {
        self.storage
    }

    fn load_snapshot(storage: &dyn Storage) -> Result<Option<Collections>> {
        let Some(text) = storage.get(SNAPSHOT_KEY)? else {
            return Ok(None);
        };

        let data = match snapshot::decode(&text)? {
            Decoded::Current(snapshot) => snapshot.into_collections(),
            Decoded::Legacy(tasks) => {
                info!(
                    tasks = tasks.len(),
                    "Loaded unversioned snapshot, will rewrite as version {}",
                    snapshot::SNAPSHOT_VERSION
                );
                Collections {
                    tasks,
                    ..Default::default()
                }
            }
        };

        Ok(Some(data))
    }

    fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    fn persist(&mut self) {
        let Some(storage) = self.storage.as_mut() else {
            return;
        };
        if self.read_only {
            warn!("Store is read-only, snapshot not saved");
            return;
        }

        let snapshot = Snapshot::new(self.data.clone(), self.clock.now_ms());
        let result = snapshot::encode(&snapshot).and_then(|text| storage.put(SNAPSHOT_KEY, &text));

        match result {
            Ok(()) => debug!(tasks = snapshot.tasks.len(), "Saved snapshot"),
            Err(e) => warn!(error = ?e, "Failed to save snapshot"),
        }
    }

    fn persist_settings(&mut self) {
        let Some(storage) = self.storage.as_mut() else {
            return;
        };

        if let Err(e) = self.settings.save(&mut **storage) {
            warn!(error = ?e, "Failed to save settings");
        }
    }

    // ========================================================================
    // Generic record access
    // ========================================================================

    /// All records of one kind, in insertion order
    pub fn all<T: Record>(&self) -> &[T] {
        T::collection(&self.data)
    }

    /// Get a record by ID
    pub fn get<T: Record>(&self, id: &str) -> Option<T> {
        T::collection(&self.data).iter().find(|r| r.id() == id).cloned()
    }

    /// List records matching every filter, in collection order
    pub fn list<T: Record>(&self, filters: &[Filter]) -> Vec<T> {
        T::collection(&self.data)
            .iter()
            .filter(|record| {
                if filters.is_empty() {
                    return true;
                }
                let fields = record.indexed_fields();
                filters.iter().all(|filter| filter.matches(&fields))
            })
            .cloned()
            .collect()
    }

    fn remove<T: Record>(&mut self, id: &str) -> Outcome {
        let collection = T::collection_mut(&mut self.data);
        let before = collection.len();
        collection.retain(|r| r.id() != id);

        if collection.len() == before {
            debug!(collection = T::collection_name(), id, "remove: not found");
            Outcome::NotFound
        } else {
            Outcome::Applied
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.data.tasks
    }

    pub fn categories(&self) -> &[Category] {
        &self.data.categories
    }

    pub fn tags(&self) -> &[Tag] {
        &self.data.tags
    }

    pub fn collaborators(&self) -> &[Collaborator] {
        &self.data.collaborators
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// Create a task and return its id
    pub fn add_task(&mut self, new_task: NewTask) -> Result<String> {
        if new_task.title.trim().is_empty() {
            return Err(eyre!("Task title cannot be empty"));
        }

        let id = new_id();
        let task = new_task.into_task(id.clone(), self.now());
        debug!(task_id = %id, title = %task.title, "add_task");

        self.data.tasks.push(task);
        self.persist();
        Ok(id)
    }

    /// Merge `patch` into the task and stamp `updated_at`
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> Outcome {
        self.modify_task(id, "update_task", |task| {
            task.apply(patch);
            true
        })
    }

    pub fn delete_task(&mut self, id: &str) -> Outcome {
        let outcome = self.remove::<Task>(id);
        if outcome.is_applied() {
            debug!(task_id = id, "delete_task");
            self.persist();
        }
        outcome
    }

    /// Apply `change` to one task. `change` returns false when it had nothing
    /// to do, in which case the task is not stamped and nothing is saved.
    fn modify_task<F>(&mut self, id: &str, op: &'static str, change: F) -> Outcome
    where
        F: FnOnce(&mut Task) -> bool,
    {
        let now = self.now();
        let Some(task) = self.data.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(task_id = id, op, "Task not found, ignoring");
            return Outcome::NotFound;
        };

        if !change(task) {
            debug!(task_id = id, op, "Nothing to change");
            return Outcome::NotFound;
        }

        task.touch(now);
        debug!(task_id = id, op, updated_at = task.updated_at, "Task modified");
        self.persist();
        Outcome::Applied
    }

    // ========================================================================
    // Categories
    // ========================================================================

    pub fn add_category(&mut self, new_category: NewCategory) -> String {
        let id = new_id();
        debug!(category_id = %id, name = %new_category.name, "add_category");
        self.data.categories.push(Category {
            id: id.clone(),
            name: new_category.name,
            color: new_category.color,
        });
        self.persist();
        id
    }

    pub fn update_category(&mut self, id: &str, patch: CategoryPatch) -> Outcome {
        let Some(category) = self.data.categories.iter_mut().find(|c| c.id == id) else {
            debug!(category_id = id, "update_category: not found");
            return Outcome::NotFound;
        };

        if let Some(name) = patch.name {
            category.name = name;
        }
        if let Some(color) = patch.color {
            category.color = color;
        }

        self.persist();
        Outcome::Applied
    }

    /// Delete a category and clear it from every task that referenced it
    pub fn delete_category(&mut self, id: &str) -> Outcome {
        if id.is_empty() {
            return Outcome::NotFound;
        }

        let outcome = self.remove::<Category>(id);

        let now = self.now();
        let mut cleared = 0;
        for task in self.data.tasks.iter_mut().filter(|t| t.category_id == id) {
            task.category_id.clear();
            task.touch(now);
            cleared += 1;
        }

        debug!(category_id = id, cleared, ?outcome, "delete_category");
        if outcome.is_applied() || cleared > 0 {
            self.persist();
        }
        outcome
    }

    // ========================================================================
    // Tags
    // ========================================================================

    pub fn add_tag(&mut self, new_tag: NewTag) -> String {
        let id = new_id();
        debug!(tag_id = %id, name = %new_tag.name, "add_tag");
        self.data.tags.push(Tag {
            id: id.clone(),
            name: new_tag.name,
        });
        self.persist();
        id
    }

    pub fn update_tag(&mut self, id: &str, patch: TagPatch) -> Outcome {
        let Some(tag) = self.data.tags.iter_mut().find(|t| t.id == id) else {
            debug!(tag_id = id, "update_tag: not found");
            return Outcome::NotFound;
        };

        if let Some(name) = patch.name {
            tag.name = name;
        }

        self.persist();
        Outcome::Applied
    }

    /// Delete a tag and strip it from every task's tag set
    pub fn delete_tag(&mut self, id: &str) -> Outcome {
        let outcome = self.remove::<Tag>(id);

        let now = self.now();
        let mut stripped = 0;
        for task in self.data.tasks.iter_mut().filter(|t| t.has_tag(id)) {
            task.tags.retain(|t| t != id);
            task.touch(now);
            stripped += 1;
        }

        debug!(tag_id = id, stripped, ?outcome, "delete_tag");
        if outcome.is_applied() || stripped > 0 {
            self.persist();
        }
        outcome
    }

    /// Add a tag id to one task's tag set
    pub fn assign_tag(&mut self, task_id: &str, tag_id: &str) -> Outcome {
        self.modify_task(task_id, "assign_tag", |task| {
            if task.has_tag(tag_id) {
                return false;
            }
            task.tags.push(tag_id.to_string());
            true
        })
    }

    // ========================================================================
    // Attachments
    // ========================================================================

    /// Attach a file to a task. Returns the attachment id, `None` when the
    /// task does not exist.
    pub fn add_attachment(&mut self, task_id: &str, new_attachment: NewAttachment) -> Option<String> {
        let attachment = new_attachment.into_attachment();
        let attachment_id = attachment.id.clone();

        let outcome = self.modify_task(task_id, "add_attachment", |task| {
            task.attachments.push(attachment);
            true
        });

        outcome.is_applied().then_some(attachment_id)
    }

    pub fn delete_attachment(&mut self, task_id: &str, attachment_id: &str) -> Outcome {
        self.modify_task(task_id, "delete_attachment", |task| {
            let before = task.attachments.len();
            task.attachments.retain(|a| a.id != attachment_id);
            task.attachments.len() != before
        })
    }

    // ========================================================================
    // Collaborators
    // ========================================================================

    /// Add a collaborator to the global list
    pub fn add_collaborator(&mut self, new_collaborator: NewCollaborator) -> String {
        let id = new_id();
        debug!(collaborator_id = %id, name = %new_collaborator.name, "add_collaborator");
        self.data.collaborators.push(Collaborator {
            id: id.clone(),
            name: new_collaborator.name,
            email: new_collaborator.email,
            avatar: new_collaborator.avatar,
        });
        self.persist();
        id
    }

    /// Put a collaborator on a task
    pub fn assign_collaborator(&mut self, task_id: &str, collaborator_id: &str) -> Outcome {
        self.modify_task(task_id, "assign_collaborator", |task| {
            if task.collaborators.iter().any(|c| c == collaborator_id) {
                return false;
            }
            task.collaborators.push(collaborator_id.to_string());
            true
        })
    }

    /// Take a collaborator off one task. The global list is untouched.
    pub fn remove_collaborator(&mut self, task_id: &str, collaborator_id: &str) -> Outcome {
        self.modify_task(task_id, "remove_collaborator", |task| {
            let before = task.collaborators.len();
            task.collaborators.retain(|c| c != collaborator_id);
            task.collaborators.len() != before
        })
    }

    // ========================================================================
    // Derived views
    // ========================================================================

    pub fn get_task_by_id(&self, id: &str) -> Option<Task> {
        self.get(id)
    }

    pub fn get_tasks_by_category(&self, category_id: &str) -> Vec<Task> {
        self.list(&[Filter::eq("category_id", category_id)])
    }

    pub fn get_tasks_by_tag(&self, tag_id: &str) -> Vec<Task> {
        self.list(&[Filter::new("tags", FilterOp::Contains, tag_id)])
    }

    pub fn get_tasks_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.list(&[Filter::eq("status", status.as_str())])
    }

    pub fn get_tasks_by_priority(&self, priority: Priority) -> Vec<Task> {
        self.list(&[Filter::eq("priority", priority.as_str())])
    }

    /// Tasks due on the given local calendar day
    pub fn get_tasks_by_date(&self, date: NaiveDate) -> Vec<Task> {
        self.data
            .tasks
            .iter()
            .filter(|task| task.due_day() == Some(date))
            .cloned()
            .collect()
    }

    /// Unfinished tasks due within `days` from now. Tasks already overdue are
    /// included too.
    pub fn get_upcoming_tasks(&self, days: u32) -> Vec<Task> {
        let horizon = self.now() + i64::from(days) * DAY_MS;
        self.list(&[
            Filter::new("due_date", FilterOp::Lte, horizon),
            Filter::new("status", FilterOp::Ne, TaskStatus::Completed.as_str()),
        ])
    }

    /// Unfinished tasks whose due date has passed
    pub fn get_overdue_tasks(&self) -> Vec<Task> {
        self.list(&[
            Filter::new("due_date", FilterOp::Lt, self.now()),
            Filter::new("status", FilterOp::Ne, TaskStatus::Completed.as_str()),
        ])
    }

    /// Tasks with at least one collaborator
    pub fn get_shared_tasks(&self) -> Vec<Task> {
        self.list(&[Filter::new("collaborator_count", FilterOp::Gt, 0i64)])
    }

    /// Tasks for listings; completed ones are left out when the privacy
    /// setting asks for it
    pub fn visible_tasks(&self) -> Vec<Task> {
        if self.settings.privacy.hide_completed_tasks {
            return self.list(&[Filter::eq("completed", false)]);
        }
        self.data.tasks.clone()
    }

    pub fn get_task_progress(&self) -> TaskProgress {
        TaskProgress {
            completed: self.data.tasks.iter().filter(|t| t.is_completed()).count(),
            total: self.data.tasks.len(),
        }
    }

    pub fn get_category_by_id(&self, id: &str) -> Option<Category> {
        self.get(id)
    }

    pub fn get_tag_by_id(&self, id: &str) -> Option<Tag> {
        self.get(id)
    }

    pub fn get_collaborator_by_id(&self, id: &str) -> Option<Collaborator> {
        self.get(id)
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Copy of the current collections
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.data.clone(), self.now())
    }

    /// Install `snapshot` as the whole state
    /// Install `snapshot` as the whole state. Settings carried by the
    /// snapshot replace the current ones.
    pub fn replace_snapshot(&mut self, mut snapshot: Snapshot) {
        let settings = snapshot.settings.take();
        self.data = snapshot.into_collections();
        info!(tasks = self.data.tasks.len(), "Replaced snapshot");
        self.persist();

        if let Some(settings) = settings {
            self.settings = settings;
            self.persist_settings();
        }
    }

    /// Collections and settings as JSON
    pub fn export_json(&self) -> Result<String> {
        snapshot::encode(&self.snapshot().with_settings(self.settings.clone()))
    }

    /// Replace state with an exported snapshot. An unversioned task array
    /// replaces the tasks only.
    pub fn import_json(&mut self, text: &str) -> Result<()> {
        match snapshot::decode(text)? {
            Decoded::Current(snapshot) => self.replace_snapshot(snapshot),
            Decoded::Legacy(tasks) => {
                info!(tasks = tasks.len(), "Imported unversioned task list");
                self.data.tasks = tasks;
                self.persist();
            }
        }
        Ok(())
    }

    /// Drop every collection and reset settings
    pub fn clear(&mut self) {
        info!("Clearing all data");
        self.data = Collections::default();
        self.settings = Settings::default();
        self.persist();
        self.persist_settings();
    }

    /// Add the default categories and tags that are not present yet (by name)
    pub fn seed_defaults(&mut self) {
        let mut added = 0;

        for category in sample::default_categories() {
            if self.data.categories.iter().any(|c| c.name == category.name) {
                continue;
            }
            self.data.categories.push(Category {
                id: new_id(),
                name: category.name,
                color: category.color,
            });
            added += 1;
        }

        for tag in sample::default_tags() {
            if self.data.tags.iter().any(|t| t.name == tag.name) {
                continue;
            }
            self.data.tags.push(Tag {
                id: new_id(),
                name: tag.name,
            });
            added += 1;
        }

        info!(added, "Seeded default categories and tags");
        if added > 0 {
            self.persist();
        }
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Change settings. Nothing changes if `change` fails.
    pub fn update_settings<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Settings) -> Result<()>,
    {
        let mut settings = self.settings.clone();
        change(&mut settings)?;
        self.settings = settings;
        self.persist_settings();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::settings::{SETTINGS_KEY, ThemeMode};
    use crate::storage::MemoryStorage;
    use chrono::{Local, TimeZone};

    const NOW: i64 = 1_750_000_000_000;

    fn store() -> (Store, ManualClock) {
        let clock = ManualClock::new(NOW);
        (Store::new().with_clock(clock.clone()), clock)
    }

    fn task(title: &str, due_date: i64) -> NewTask {
        NewTask::new(title, due_date)
    }

    fn local_ms(y: i32, m: u32, d: u32, h: u32) -> i64 {
        Local
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .earliest()
            .unwrap()
            .timestamp_millis()
    }

    /// Storage that fails every call
    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(eyre!("disk on fire"))
        }

        fn put(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(eyre!("disk on fire"))
        }

        fn remove(&mut self, _key: &str) -> Result<()> {
            Err(eyre!("disk on fire"))
        }
    }

    #[test]
    fn test_add_task_visible_by_status() {
        let (mut store, _) = store();

        for status in [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Completed] {
            let id = store
                .add_task(NewTask {
                    status,
                    ..task("Task", NOW)
                })
                .unwrap();
            assert!(store.get_tasks_by_status(status).iter().any(|t| t.id == id));
        }

        let added = &store.tasks()[0];
        assert_eq!(added.created_at, NOW);
        assert_eq!(added.updated_at, NOW);
    }

    #[test]
    fn test_add_task_rejects_blank_title() {
        let (mut store, _) = store();
        assert!(store.add_task(task("   ", NOW)).is_err());
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let (mut store, _) = store();
        let a = store.add_task(task("A", NOW)).unwrap();
        let b = store.add_task(task("B", NOW)).unwrap();
        let c = store.add_category(NewCategory::default());
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_update_progress_changes_only_progress_and_updated_at() {
        let (mut store, clock) = store();
        let id = store
            .add_task(NewTask {
                description: "Problems 1-20".to_string(),
                priority: Priority::High,
                tags: vec!["t1".to_string()],
                ..task("Math Assignment", NOW + DAY_MS)
            })
            .unwrap();
        let before = store.get_task_by_id(&id).unwrap();

        clock.advance(10);
        assert_eq!(
            store.update_task(
                &id,
                TaskPatch {
                    progress: Some(55),
                    ..Default::default()
                }
            ),
            Outcome::Applied
        );

        let after = store.get_task_by_id(&id).unwrap();
        assert_eq!(after.progress, 55);
        assert!(after.updated_at > before.updated_at);
        assert_eq!(
            Task {
                progress: before.progress,
                updated_at: before.updated_at,
                ..after
            },
            before
        );
    }

    #[test]
    fn test_updated_at_increases_without_clock_tick() {
        let (mut store, _) = store();
        let id = store.add_task(task("A", NOW)).unwrap();

        let mut last = store.get_task_by_id(&id).unwrap().updated_at;
        for progress in [10, 20, 30] {
            store.update_task(
                &id,
                TaskPatch {
                    progress: Some(progress),
                    ..Default::default()
                },
            );
            let updated_at = store.get_task_by_id(&id).unwrap().updated_at;
            assert!(updated_at > last);
            last = updated_at;
        }
        assert_eq!(store.get_task_by_id(&id).unwrap().created_at, NOW);
    }

    #[test]
    fn test_update_clamps_progress() {
        let (mut store, _) = store();
        let id = store.add_task(task("A", NOW)).unwrap();
        store.update_task(
            &id,
            TaskPatch {
                progress: Some(250),
                ..Default::default()
            },
        );
        assert_eq!(store.get_task_by_id(&id).unwrap().progress, 100);
    }

    #[test]
    fn test_update_missing_task_is_noop() {
        let (mut store, _) = store();
        store.add_task(task("A", NOW)).unwrap();
        let before = store.tasks().to_vec();

        let outcome = store.update_task("missing", TaskPatch::complete());

        assert_eq!(outcome, Outcome::NotFound);
        assert_eq!(store.tasks(), before.as_slice());
    }

    #[test]
    fn test_status_transitions_are_unrestricted() {
        let (mut store, _) = store();
        let id = store
            .add_task(NewTask {
                status: TaskStatus::Completed,
                ..task("A", NOW)
            })
            .unwrap();

        for status in [TaskStatus::Pending, TaskStatus::Completed, TaskStatus::InProgress] {
            store.update_task(
                &id,
                TaskPatch {
                    status: Some(status),
                    ..Default::default()
                },
            );
            assert_eq!(store.get_task_by_id(&id).unwrap().status, status);
        }
    }

    #[test]
    fn test_complete_scenario() {
        let (mut store, _) = store();
        let id = store.add_task(task("A", NOW + DAY_MS)).unwrap();

        let pending = store.get_tasks_by_status(TaskStatus::Pending);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].title, "A");

        store.update_task(&id, TaskPatch::complete());

        assert!(store.get_tasks_by_status(TaskStatus::Pending).is_empty());
        assert_eq!(
            store.get_task_progress(),
            TaskProgress {
                completed: 1,
                total: 1
            }
        );
    }

    #[test]
    fn test_delete_task() {
        let (mut store, _) = store();
        let id = store.add_task(task("A", NOW)).unwrap();

        assert_eq!(store.delete_task(&id), Outcome::Applied);
        assert!(store.tasks().is_empty());
        assert_eq!(store.delete_task(&id), Outcome::NotFound);
    }

    #[test]
    fn test_delete_category_clears_references() {
        let (mut store, _) = store();
        let category_id = store.add_category(NewCategory {
            name: "Math".to_string(),
            color: "#4361EE".to_string(),
        });
        let task_id = store
            .add_task(NewTask {
                category_id: category_id.clone(),
                ..task("Calculus", NOW)
            })
            .unwrap();
        let other = store
            .add_task(NewTask {
                category_id: "other".to_string(),
                ..task("Essay", NOW)
            })
            .unwrap();

        assert_eq!(store.delete_category(&category_id), Outcome::Applied);

        assert!(store.get_category_by_id(&category_id).is_none());
        assert_eq!(store.get_task_by_id(&task_id).unwrap().category_id, "");
        assert_eq!(store.get_task_by_id(&other).unwrap().category_id, "other");
        assert!(store.get_tasks_by_category(&category_id).is_empty());
        assert!(store.tasks().iter().all(|t| t.category_id != category_id));
    }

    #[test]
    fn test_update_category() {
        let (mut store, _) = store();
        let id = store.add_category(NewCategory {
            name: "Math".to_string(),
            color: "#4361EE".to_string(),
        });

        let outcome = store.update_category(
            &id,
            CategoryPatch {
                name: Some("Mathematics".to_string()),
                color: None,
            },
        );

        assert!(outcome.is_applied());
        let category = store.get_category_by_id(&id).unwrap();
        assert_eq!(category.name, "Mathematics");
        assert_eq!(category.color, "#4361EE");
        assert_eq!(
            store.update_category("missing", CategoryPatch::default()),
            Outcome::NotFound
        );
    }

    #[test]
    fn test_delete_tag_strips_tasks() {
        let (mut store, _) = store();
        let exam = store.add_tag(NewTag {
            name: "Exam".to_string(),
        });
        let reading = store.add_tag(NewTag {
            name: "Reading".to_string(),
        });
        let id = store
            .add_task(NewTask {
                tags: vec![exam.clone(), reading.clone()],
                ..task("Finals", NOW)
            })
            .unwrap();
        assert_eq!(store.get_tasks_by_tag(&exam).len(), 1);

        assert_eq!(store.delete_tag(&exam), Outcome::Applied);

        assert_eq!(store.get_task_by_id(&id).unwrap().tags, vec![reading.clone()]);
        assert!(store.get_tasks_by_tag(&exam).is_empty());
        assert_eq!(store.get_tasks_by_tag(&reading).len(), 1);
    }

    #[test]
    fn test_add_then_delete_tag_leaves_tags_unchanged() {
        let (mut store, _) = store();
        store.add_tag(NewTag {
            name: "Homework".to_string(),
        });
        let before = store.tags().to_vec();

        let id = store.add_tag(NewTag {
            name: "Temp".to_string(),
        });
        store.delete_tag(&id);

        assert_eq!(store.tags(), before.as_slice());
    }

    #[test]
    fn test_update_tag() {
        let (mut store, _) = store();
        let id = store.add_tag(NewTag {
            name: "Exam".to_string(),
        });
        store.update_tag(
            &id,
            TagPatch {
                name: Some("Midterm".to_string()),
            },
        );
        assert_eq!(store.get_tag_by_id(&id).unwrap().name, "Midterm");
    }

    #[test]
    fn test_assign_tag_is_set_like() {
        let (mut store, _) = store();
        let id = store.add_task(task("A", NOW)).unwrap();

        assert_eq!(store.assign_tag(&id, "t1"), Outcome::Applied);
        assert_eq!(store.assign_tag(&id, "t1"), Outcome::NotFound);
        assert_eq!(store.get_task_by_id(&id).unwrap().tags, vec!["t1"]);
        assert_eq!(store.assign_tag("missing", "t1"), Outcome::NotFound);
    }

    #[test]
    fn test_attachments() {
        let (mut store, _) = store();
        let id = store.add_task(task("Lab Report", NOW)).unwrap();

        let attachment_id = store
            .add_attachment(
                &id,
                NewAttachment {
                    name: "results.csv".to_string(),
                    kind: "text/csv".to_string(),
                    uri: "file:///results.csv".to_string(),
                },
            )
            .unwrap();
        let second = store.add_attachment(&id, NewAttachment::default()).unwrap();

        let attachments = store.get_task_by_id(&id).unwrap().attachments;
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].id, attachment_id);
        assert_eq!(attachments[1].id, second);

        assert_eq!(store.delete_attachment(&id, &attachment_id), Outcome::Applied);
        assert_eq!(store.delete_attachment(&id, &attachment_id), Outcome::NotFound);
        assert_eq!(store.get_task_by_id(&id).unwrap().attachments.len(), 1);

        assert!(store.add_attachment("missing", NewAttachment::default()).is_none());
    }

    #[test]
    fn test_collaborators() {
        let (mut store, _) = store();
        let person = store.add_collaborator(NewCollaborator {
            name: "Pat".to_string(),
            email: "pat@example.com".to_string(),
            avatar: None,
        });
        let id = store
            .add_task(NewTask {
                collaborators: vec![person.clone(), "ghost".to_string()],
                ..task("History Presentation", NOW)
            })
            .unwrap();
        store.add_task(task("Solo", NOW)).unwrap();

        assert_eq!(store.get_shared_tasks().len(), 1);
        assert_eq!(store.get_collaborator_by_id(&person).unwrap().name, "Pat");
        // dangling reference resolves to nothing
        assert!(store.get_collaborator_by_id("ghost").is_none());

        assert_eq!(store.remove_collaborator(&id, &person), Outcome::Applied);
        assert_eq!(store.get_task_by_id(&id).unwrap().collaborators, vec!["ghost"]);
        // still in the global list
        assert_eq!(store.collaborators().len(), 1);

        assert_eq!(store.assign_collaborator(&id, &person), Outcome::Applied);
        assert_eq!(store.assign_collaborator(&id, &person), Outcome::NotFound);
        assert_eq!(store.remove_collaborator("missing", &person), Outcome::NotFound);
    }

    #[test]
    fn test_filters_preserve_order() {
        let (mut store, _) = store();
        for (title, priority) in [("a", Priority::High), ("b", Priority::Low), ("c", Priority::High)] {
            store
                .add_task(NewTask {
                    priority,
                    ..task(title, NOW)
                })
                .unwrap();
        }

        let titles: Vec<String> = store
            .get_tasks_by_priority(Priority::High)
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["a", "c"]);
    }

    #[test]
    fn test_tasks_by_date() {
        let (mut store, _) = store();
        store.add_task(task("morning", local_ms(2026, 6, 10, 8))).unwrap();
        store.add_task(task("evening", local_ms(2026, 6, 10, 22))).unwrap();
        store.add_task(task("next day", local_ms(2026, 6, 11, 8))).unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 6, 10).unwrap();
        let titles: Vec<String> = store.get_tasks_by_date(day).into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["morning", "evening"]);

        let empty = NaiveDate::from_ymd_opt(2026, 6, 12).unwrap();
        assert!(store.get_tasks_by_date(empty).is_empty());
    }

    #[test]
    fn test_overdue_and_upcoming() {
        let (mut store, _) = store();
        store.add_task(task("late", NOW - DAY_MS)).unwrap();
        store
            .add_task(NewTask {
                status: TaskStatus::Completed,
                ..task("late but done", NOW - DAY_MS)
            })
            .unwrap();
        store.add_task(task("soon", NOW + 2 * DAY_MS)).unwrap();
        store.add_task(task("edge", NOW + 7 * DAY_MS)).unwrap();
        store.add_task(task("far", NOW + 30 * DAY_MS)).unwrap();

        let overdue: Vec<String> = store.get_overdue_tasks().into_iter().map(|t| t.title).collect();
        assert_eq!(overdue, vec!["late"]);

        let upcoming: Vec<String> = store.get_upcoming_tasks(7).into_iter().map(|t| t.title).collect();
        assert_eq!(upcoming, vec!["late", "soon", "edge"]);

        assert!(store.get_overdue_tasks().iter().all(|t| !t.is_completed()));
    }

    #[test]
    fn test_overdue_follows_clock() {
        let (mut store, clock) = store();
        store.add_task(task("due", NOW + DAY_MS)).unwrap();
        assert!(store.get_overdue_tasks().is_empty());

        clock.advance(DAY_MS + 1);
        assert_eq!(store.get_overdue_tasks().len(), 1);
    }

    #[test]
    fn test_task_progress_counts() {
        let (mut store, _) = store();
        assert_eq!(store.get_task_progress(), TaskProgress::default());
        assert_eq!(store.get_task_progress().percent(), 0);

        for (i, status) in [TaskStatus::Completed, TaskStatus::InProgress, TaskStatus::Completed, TaskStatus::Pending]
            .into_iter()
            .enumerate()
        {
            store
                .add_task(NewTask {
                    status,
                    progress: if status == TaskStatus::InProgress { 100 } else { 0 },
                    ..task(&format!("task {}", i), NOW)
                })
                .unwrap();
        }

        let progress = store.get_task_progress();
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.total, 4);
        assert!(progress.completed <= progress.total);
        assert_eq!(progress.percent(), 50);
    }

    #[test]
    fn test_generic_list_with_filters() {
        let (mut store, _) = store();
        store
            .add_task(NewTask {
                progress: 80,
                ..task("nearly", NOW)
            })
            .unwrap();
        store.add_task(task("barely", NOW)).unwrap();

        let filters = vec![Filter::new("progress", FilterOp::Gte, 50i64)];
        let tasks: Vec<Task> = store.list(&filters);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "nearly");

        let everything: Vec<Task> = store.list(&[]);
        assert_eq!(everything.len(), 2);
        assert_eq!(store.all::<Task>().len(), 2);
    }

    #[test]
    fn test_persists_on_every_mutation() {
        let clock = ManualClock::new(NOW);
        let mut store = Store::open(MemoryStorage::new()).with_clock(clock);
        assert!(store.is_fresh());

        let category = store.add_category(NewCategory {
            name: "Science".to_string(),
            color: "#3A0CA3".to_string(),
        });
        let id = store
            .add_task(NewTask {
                category_id: category.clone(),
                ..task("Lab", NOW)
            })
            .unwrap();
        store.update_task(&id, TaskPatch::complete());

        let storage = store.into_storage().unwrap();
        let reopened = Store::open(storage);
        assert!(!reopened.is_fresh());
        assert_eq!(reopened.tasks().len(), 1);
        assert!(reopened.tasks()[0].is_completed());
        assert_eq!(reopened.get_category_by_id(&category).unwrap().name, "Science");
    }

    #[test]
    fn test_broken_storage_does_not_block_mutations() {
        let mut store = Store::open(BrokenStorage);
        assert!(store.tasks().is_empty());

        let id = store.add_task(task("A", NOW)).unwrap();
        assert_eq!(store.update_task(&id, TaskPatch::complete()), Outcome::Applied);
        assert_eq!(store.get_task_progress().completed, 1);
        assert!(store.update_settings(|s| s.set("theme", "dark")).is_ok());
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty() {
        let mut storage = MemoryStorage::new();
        storage.put(SNAPSHOT_KEY, "{definitely not json").unwrap();

        let store = Store::open(storage);
        assert!(store.tasks().is_empty());
        assert!(!store.is_fresh());
    }

    #[test]
    fn test_corrupt_snapshot_is_copied_before_overwrite() {
        let mut storage = MemoryStorage::new();
        storage.put(SNAPSHOT_KEY, "{definitely not json").unwrap();

        let mut store = Store::open(storage);
        assert!(!store.is_read_only());
        store.add_task(task("A", NOW)).unwrap();

        let storage = store.into_storage().unwrap();
        assert_eq!(
            storage.get(SNAPSHOT_BACKUP_KEY).unwrap().as_deref(),
            Some("{definitely not json")
        );
        assert_eq!(Store::open(storage).tasks().len(), 1);
    }

    #[test]
    fn test_newer_snapshot_is_never_overwritten() {
        let newer = r#"{"version":2,"savedAt":1,"tasks":[{"id":"n1","title":"keep me","dueDate":0,
            "createdAt":0,"updatedAt":0}],"boards":[]}"#;
        let mut storage = MemoryStorage::new();
        storage.put(SNAPSHOT_KEY, newer).unwrap();

        let mut store = Store::open(storage);
        assert!(store.is_read_only());
        assert!(store.tasks().is_empty());

        let tag = store.add_tag(NewTag {
            name: "Exam".to_string(),
        });
        assert!(store.get_tag_by_id(&tag).is_some());
        store.clear();

        let storage = store.into_storage().unwrap();
        let stored = storage.get(SNAPSHOT_KEY).unwrap().unwrap();
        assert_eq!(stored, newer);
        assert!(stored.contains("keep me"));
    }

    #[test]
    fn test_unreadable_storage_is_read_only() {
        let store = Store::open(BrokenStorage);
        assert!(store.is_read_only());
        assert!(!Store::open(MemoryStorage::new()).is_read_only());
    }

    #[test]
    fn test_legacy_progress_is_clamped() {
        let mut storage = MemoryStorage::new();
        storage
            .put(
                SNAPSHOT_KEY,
                r#"[{"id":"1","title":"Over","dueDate":0,"createdAt":0,"updatedAt":0,"progress":250},
                    {"id":"2","title":"Under","dueDate":0,"createdAt":0,"updatedAt":0,"progress":-5}]"#,
            )
            .unwrap();

        let store = Store::open(storage);
        assert_eq!(store.tasks().len(), 2);
        assert_eq!(store.get_task_by_id("1").unwrap().progress, 100);
        assert_eq!(store.get_task_by_id("2").unwrap().progress, 0);
    }

    #[test]
    fn test_update_task_at_max_timestamp() {
        let (mut store, _) = store();
        store
            .import_json(
                r#"[{"id":"1","title":"Far future","dueDate":0,"createdAt":0,
                     "updatedAt":9223372036854775807}]"#,
            )
            .unwrap();

        let patch = TaskPatch {
            progress: Some(10),
            ..Default::default()
        };
        assert_eq!(store.update_task("1", patch), Outcome::Applied);

        let task = store.get_task_by_id("1").unwrap();
        assert_eq!(task.progress, 10);
        assert_eq!(task.updated_at, i64::MAX);
    }

    #[test]
    fn test_hide_completed_tasks() {
        let (mut store, _) = store();
        let done = store.add_task(task("Done", NOW)).unwrap();
        store.add_task(task("Open", NOW)).unwrap();
        store.update_task(&done, TaskPatch::complete());
        assert_eq!(store.visible_tasks().len(), 2);

        store
            .update_settings(|s| s.set("privacy.hide_completed_tasks", "on"))
            .unwrap();
        let visible = store.visible_tasks();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "Open");
        assert_eq!(store.tasks().len(), 2);
    }

    #[test]
    fn test_legacy_snapshot_loads_tasks() {
        let mut storage = MemoryStorage::new();
        storage
            .put(
                SNAPSHOT_KEY,
                r#"[{"id":"1","title":"Math Assignment","description":"","dueDate":"2026-06-10T10:00:00.000Z",
                    "priority":"high","status":"pending","progress":0,"categoryId":"1","tags":["1"],
                    "attachments":[],"collaborators":[],"createdAt":"2026-06-01T10:00:00.000Z",
                    "updatedAt":"2026-06-01T10:00:00.000Z","reminders":[]}]"#,
            )
            .unwrap();

        let store = Store::open(storage);
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.get_tasks_by_priority(Priority::High).len(), 1);
    }

    #[test]
    fn test_export_import() {
        let (mut source, _) = store();
        source.seed_defaults();
        source.add_task(task("A", NOW)).unwrap();
        let exported = source.export_json().unwrap();

        let (mut target, _) = store();
        target.import_json(&exported).unwrap();
        assert_eq!(target.tasks(), source.tasks());
        assert_eq!(target.categories(), source.categories());
        assert_eq!(target.tags(), source.tags());

        assert!(target.import_json("not json").is_err());
        assert_eq!(target.tasks().len(), 1);
    }

    #[test]
    fn test_export_import_carries_settings() {
        let mut source = Store::open(MemoryStorage::new());
        source.add_task(task("A", NOW)).unwrap();
        source
            .update_settings(|s| {
                s.set("theme", "dark")?;
                s.set("privacy.hide_completed_tasks", "on")?;
                s.set("profile.name", "Sam")
            })
            .unwrap();
        let exported = source.export_json().unwrap();

        let mut target = Store::open(MemoryStorage::new());
        target.import_json(&exported).unwrap();
        assert_eq!(target.settings(), source.settings());
        assert_eq!(target.tasks(), source.tasks());

        let reopened = Store::open(target.into_storage().unwrap());
        assert_eq!(reopened.settings().theme, ThemeMode::Dark);
        assert!(reopened.settings().privacy.hide_completed_tasks);
        assert_eq!(reopened.settings().profile.name, "Sam");
    }

    #[test]
    fn test_import_without_settings_keeps_settings() {
        let (mut store, _) = store();
        store.update_settings(|s| s.set("theme", "light")).unwrap();
        store
            .import_json(r#"{"version":1,"savedAt":0,"tasks":[]}"#)
            .unwrap();
        assert_eq!(store.settings().theme, ThemeMode::Light);
    }

    #[test]
    fn test_snapshot_replace() {
        let (mut store, _) = store();
        store.add_task(task("A", NOW)).unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.version, snapshot::SNAPSHOT_VERSION);

        store.add_task(task("B", NOW)).unwrap();
        store.replace_snapshot(snapshot);
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].title, "A");
    }

    #[test]
    fn test_seed_defaults_is_idempotent() {
        let (mut store, _) = store();
        store.seed_defaults();
        store.seed_defaults();

        assert_eq!(store.categories().len(), sample::DEFAULT_CATEGORIES.len());
        assert_eq!(store.tags().len(), sample::DEFAULT_TAGS.len());
        assert!(store.categories().iter().any(|c| c.name == "Math" && c.color == "#4361EE"));
    }

    #[test]
    fn test_clear() {
        let mut store = Store::open(MemoryStorage::new());
        store.seed_defaults();
        store.add_task(task("A", NOW)).unwrap();
        store.update_settings(|s| s.set("theme", "light")).unwrap();

        store.clear();

        assert!(store.tasks().is_empty());
        assert!(store.categories().is_empty());
        assert_eq!(store.settings().theme, ThemeMode::System);

        let reopened = Store::open(store.into_storage().unwrap());
        assert!(reopened.tasks().is_empty());
        assert_eq!(reopened.settings().theme, ThemeMode::System);
    }

    #[test]
    fn test_settings_persist() {
        let mut store = Store::open(MemoryStorage::new());
        store.update_settings(|s| s.set("theme", "dark")).unwrap();
        assert!(store.update_settings(|s| s.set("theme", "neon")).is_err());
        assert_eq!(store.settings().theme, ThemeMode::Dark);

        let storage = store.into_storage().unwrap();
        assert!(storage.get(SETTINGS_KEY).unwrap().is_some());
        assert_eq!(Store::open(storage).settings().theme, ThemeMode::Dark);
    }
}
