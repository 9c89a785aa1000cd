// Data models for taskdeck

use chrono::{Days, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One day in milliseconds
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {} (expected low, medium or high)", other)),
        }
    }
}

/// Task status. Any state may move to any other; nothing transitions on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in-progress" | "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(format!(
                "unknown status: {} (expected pending, in-progress or completed)",
                other
            )),
        }
    }
}

/// File attached to a task. Lives and dies with its task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

/// Person shown next to a task. A label only; nothing is shared or synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "timestamp")]
    pub due_date: i64,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "progress_value")]
    pub progress: u8,
    /// Empty when the task has no category
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, deserialize_with = "collaborator_refs")]
    pub collaborators: Vec<String>,
    #[serde(with = "timestamp")]
    pub created_at: i64,
    #[serde(with = "timestamp")]
    pub updated_at: i64,
    #[serde(default, with = "timestamp::list")]
    pub reminders: Vec<i64>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn is_overdue(&self, now: i64) -> bool {
        self.due_date < now && !self.is_completed()
    }

    pub fn is_shared(&self) -> bool {
        !self.collaborators.is_empty()
    }

    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.tags.iter().any(|t| t == tag_id)
    }

    /// Calendar day of the due date in local time
    pub fn due_day(&self) -> Option<NaiveDate> {
        local_day(self.due_date)
    }

    /// Merge the fields present in `patch` into this task
    pub(crate) fn apply(&mut self, patch: TaskPatch) {
        let TaskPatch {
            title,
            description,
            due_date,
            priority,
            status,
            progress,
            category_id,
            tags,
            collaborators,
            reminders,
        } = patch;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(due_date) = due_date {
            self.due_date = due_date;
        }
        if let Some(priority) = priority {
            self.priority = priority;
        }
        if let Some(status) = status {
            self.status = status;
        }
        if let Some(progress) = progress {
            self.progress = clamp_progress(progress);
        }
        if let Some(category_id) = category_id {
            self.category_id = category_id;
        }
        if let Some(tags) = tags {
            self.tags = dedupe(tags);
        }
        if let Some(collaborators) = collaborators {
            self.collaborators = dedupe(collaborators);
        }
        if let Some(reminders) = reminders {
            self.reminders = reminders;
        }
    }

    /// Stamp a modification. Never moves backwards and always advances, even
    /// when the clock has not ticked since the previous change.
    pub(crate) fn touch(&mut self, now: i64) {
        self.updated_at = now.max(self.updated_at.saturating_add(1));
    }
}

/// Fields for a task about to be created
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub due_date: i64,
    pub priority: Priority,
    pub status: TaskStatus,
    pub progress: i64,
    pub category_id: String,
    pub tags: Vec<String>,
    pub attachments: Vec<NewAttachment>,
    pub collaborators: Vec<String>,
    pub reminders: Vec<i64>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, due_date: i64) -> Self {
        Self {
            title: title.into(),
            due_date,
            ..Default::default()
        }
    }

    pub(crate) fn into_task(self, id: String, now: i64) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            priority: self.priority,
            status: self.status,
            progress: clamp_progress(self.progress),
            category_id: self.category_id,
            tags: dedupe(self.tags),
            attachments: self.attachments.into_iter().map(NewAttachment::into_attachment).collect(),
            collaborators: dedupe(self.collaborators),
            created_at: now,
            updated_at: now,
            reminders: self.reminders,
        }
    }
}

/// Partial task update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<i64>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub progress: Option<i64>,
    /// `Some(String::new())` clears the category
    pub category_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub collaborators: Option<Vec<String>>,
    pub reminders: Option<Vec<i64>>,
}

impl TaskPatch {
    /// Mark completed with full progress, the way the task screens do it
    pub fn complete() -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            progress: Some(100),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPatch {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCollaborator {
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAttachment {
    pub name: String,
    pub kind: String,
    pub uri: String,
}

impl NewAttachment {
    pub(crate) fn into_attachment(self) -> Attachment {
        Attachment {
            id: new_id(),
            name: self.name,
            kind: self.kind,
            uri: self.uri,
        }
    }
}

/// Generate a fresh entity id
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Local calendar day for a millisecond timestamp
pub fn local_day(ms: i64) -> Option<NaiveDate> {
    Local.timestamp_millis_opt(ms).single().map(|dt| dt.date_naive())
}

fn clamp_progress(progress: i64) -> u8 {
    progress.clamp(0, 100) as u8
}

/// Progress as stored may be any number; it is clamped on the way in.
fn progress_value<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(value) => clamp_progress(value),
        Raw::Float(value) => clamp_progress(value.round() as i64),
    })
}

/// Same local time one calendar day earlier. Differs from `ms - DAY_MS`
/// across a daylight-saving change.
pub fn day_before(ms: i64) -> Option<i64> {
    Local
        .timestamp_millis_opt(ms)
        .single()?
        .checked_sub_days(Days::new(1))
        .map(|dt| dt.timestamp_millis())
}

fn dedupe(ids: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Collaborator references are ids; older snapshots stored whole objects.
fn collaborator_refs<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ref {
        Id(String),
        Entry { id: String },
    }

    let refs = Vec::<Ref>::deserialize(deserializer)?;
    let ids = refs
        .into_iter()
        .map(|r| match r {
            Ref::Id(id) | Ref::Entry { id } => id,
        })
        .collect();
    Ok(dedupe(ids))
}

/// Timestamps are written as epoch milliseconds and read from either
/// milliseconds or RFC 3339 strings.
pub(crate) mod timestamp {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Float(f64),
        Text(String),
    }

    fn resolve(raw: Raw) -> Result<i64, String> {
        match raw {
            Raw::Millis(ms) => Ok(ms),
            Raw::Float(ms) => Ok(ms as i64),
            Raw::Text(text) => chrono::DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.timestamp_millis())
                .map_err(|e| format!("invalid timestamp {:?}: {}", text, e)),
        }
    }

    pub fn serialize<S: Serializer>(ms: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(*ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        resolve(Raw::deserialize(deserializer)?).map_err(D::Error::custom)
    }

    pub mod list {
        use super::{Raw, resolve};
        use serde::de::Error;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(values: &[i64], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(values)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<i64>, D::Error> {
            Vec::<Raw>::deserialize(deserializer)?
                .into_iter()
                .map(|raw| resolve(raw).map_err(D::Error::custom))
                .collect()
        }
    }
}
