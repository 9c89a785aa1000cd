// Versioned snapshot of the store's collections

use crate::models::{Category, Collaborator, Tag, Task};
use crate::record::Record;
use crate::settings::Settings;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

/// Version written by this build
pub const SNAPSHOT_VERSION: u32 = 1;

/// Storage key the snapshot lives under
pub const SNAPSHOT_KEY: &str = "snapshot";

/// Storage key an unreadable snapshot is copied to before it can be overwritten
pub const SNAPSHOT_BACKUP_KEY: &str = "snapshot.bak";

/// Everything the store owns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collections {
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
    pub collaborators: Vec<Collaborator>,
}

/// Serialized form of the collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: i64,
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
    pub collaborators: Vec<Collaborator>,
    /// Present in exports only; the stored snapshot keeps settings apart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

impl Snapshot {
    pub fn new(collections: Collections, saved_at: i64) -> Self {
        let Collections {
            tasks,
            categories,
            tags,
            collaborators,
        } = collections;

        Self {
            version: SNAPSHOT_VERSION,
            saved_at,
            tasks,
            categories,
            tags,
            collaborators,
            settings: None,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn into_collections(self) -> Collections {
        Collections {
            tasks: self.tasks,
            categories: self.categories,
            tags: self.tags,
            collaborators: self.collaborators,
        }
    }
}

/// Result of reading a stored snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Versioned record with every collection
    Current(Snapshot),
    /// Unversioned bare array of tasks
    Legacy(Vec<Task>),
}

pub fn encode(snapshot: &Snapshot) -> Result<String> {
    serde_json::to_string(snapshot).context("Failed to serialize snapshot")
}

/// Parse a stored snapshot.
///
/// Individual records that fail to parse, or repeat an id already seen, are
/// skipped with a warning. The snapshot as a whole fails when it is not JSON,
/// has no version, or comes from a newer version than this build writes.
pub fn decode(text: &str) -> Result<Decoded> {
    let value: Value = serde_json::from_str(text).context("Snapshot is not valid JSON")?;

    match value {
        Value::Array(items) => Ok(Decoded::Legacy(records(items))),
        Value::Object(mut fields) => {
            let version = fields
                .get("version")
                .and_then(Value::as_u64)
                .ok_or_else(|| eyre!("Snapshot has no version"))?;

            if version > u64::from(SNAPSHOT_VERSION) {
                return Err(eyre!(
                    "Snapshot version {} is newer than supported version {}",
                    version,
                    SNAPSHOT_VERSION
                ));
            }

            let saved_at = fields.get("savedAt").and_then(Value::as_i64).unwrap_or(0);
            let settings = match fields.remove("settings") {
                Some(Value::Null) | None => None,
                Some(value) => match serde_json::from_value(value) {
                    Ok(settings) => Some(settings),
                    Err(e) => {
                        warn!(error = ?e, "Failed to parse snapshot settings, ignoring");
                        None
                    }
                },
            };

            Ok(Decoded::Current(Snapshot {
                version: SNAPSHOT_VERSION,
                saved_at,
                tasks: take_collection(&mut fields),
                categories: take_collection(&mut fields),
                tags: take_collection(&mut fields),
                collaborators: take_collection(&mut fields),
                settings,
            }))
        }
        other => Err(eyre!("Unexpected snapshot shape: {}", json_kind(&other))),
    }
}

/// Version of a stored snapshot when it is newer than this build reads
pub fn newer_version(text: &str) -> Option<u64> {
    let value: Value = serde_json::from_str(text).ok()?;
    let version = value.get("version")?.as_u64()?;
    (version > u64::from(SNAPSHOT_VERSION)).then_some(version)
}

fn take_collection<T: Record>(fields: &mut serde_json::Map<String, Value>) -> Vec<T> {
    match fields.remove(T::collection_name()) {
        Some(Value::Array(items)) => records(items),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            warn!(
                collection = T::collection_name(),
                kind = json_kind(&other),
                "Collection is not an array, ignoring"
            );
            Vec::new()
        }
    }
}

fn records<T: Record>(items: Vec<Value>) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        let record: T = match serde_json::from_value(item) {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    collection = T::collection_name(),
                    index,
                    error = ?e,
                    "Failed to parse record, skipping"
                );
                continue;
            }
        };

        if !seen.insert(record.id().to_string()) {
            warn!(
                collection = T::collection_name(),
                id = record.id(),
                "Duplicate id, keeping first occurrence"
            );
            continue;
        }

        out.push(record);
    }

    out
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;

    fn task(id: &str, title: &str) -> Task {
        NewTask::new(title, 2_000).into_task(id.to_string(), 1_000)
    }

    fn collections() -> Collections {
        Collections {
            tasks: vec![task("t1", "Math Assignment")],
            categories: vec![Category {
                id: "c1".to_string(),
                name: "Math".to_string(),
                color: "#4361EE".to_string(),
            }],
            tags: vec![Tag {
                id: "g1".to_string(),
                name: "Homework".to_string(),
            }],
            collaborators: vec![Collaborator {
                id: "p1".to_string(),
                name: "Pat".to_string(),
                email: "pat@example.com".to_string(),
                avatar: None,
            }],
        }
    }

    #[test]
    fn test_encode_then_decode() {
        let snapshot = Snapshot::new(collections(), 5_000);
        let text = encode(&snapshot).unwrap();
        assert!(!text.contains("\"settings\""));
        assert!(text.contains("\"version\":1"));
        assert!(text.contains("\"savedAt\":5000"));

        match decode(&text).unwrap() {
            Decoded::Current(decoded) => {
                assert_eq!(decoded, snapshot);
                assert_eq!(decoded.into_collections(), collections());
            }
            other => panic!("expected current snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_legacy_array() {
        let text = r#"[
            {"id":"1","title":"Math Assignment","description":"Problems 1-20",
             "dueDate":"2024-03-10T00:00:00.000Z","priority":"high","status":"pending",
             "progress":0,"categoryId":"1","tags":["1"],"attachments":[],"collaborators":[],
             "createdAt":"2024-03-01T00:00:00.000Z","updatedAt":"2024-03-01T00:00:00.000Z",
             "reminders":["2024-03-09T00:00:00.000Z"]}
        ]"#;

        match decode(text).unwrap() {
            Decoded::Legacy(tasks) => {
                assert_eq!(tasks.len(), 1);
                assert_eq!(tasks[0].title, "Math Assignment");
                assert_eq!(tasks[0].category_id, "1");
            }
            other => panic!("expected legacy snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_skips_malformed_and_duplicate_records() {
        let good = serde_json::to_value(task("t1", "Valid")).unwrap();
        let dup = serde_json::to_value(task("t1", "Duplicate")).unwrap();
        let other = serde_json::to_value(task("t2", "Also Valid")).unwrap();
        let text = serde_json::json!({
            "version": 1,
            "savedAt": 10,
            "tasks": [good, {"title": "no id"}, dup, other],
            "tags": "not-an-array",
        })
        .to_string();

        let Decoded::Current(snapshot) = decode(&text).unwrap() else {
            panic!("expected current snapshot");
        };
        let titles: Vec<&str> = snapshot.tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Valid", "Also Valid"]);
        assert!(snapshot.tags.is_empty());
        assert!(snapshot.categories.is_empty());
    }

    #[test]
    fn test_decode_rejects_newer_version() {
        let text = r#"{"version": 99, "tasks": []}"#;
        let err = decode(text).unwrap_err();
        assert!(err.to_string().contains("newer"));
        assert_eq!(newer_version(text), Some(99));
        assert_eq!(newer_version(r#"{"version": 1}"#), None);
        assert_eq!(newer_version("[]"), None);
        assert_eq!(newer_version("{not json"), None);
    }

    #[test]
    fn test_decode_reads_settings() {
        let mut settings = Settings::default();
        settings.set("privacy.hide_completed_tasks", "on").unwrap();
        let snapshot = Snapshot::new(collections(), 5_000).with_settings(settings.clone());
        let text = encode(&snapshot).unwrap();
        assert!(text.contains("\"settings\""));

        let Decoded::Current(decoded) = decode(&text).unwrap() else {
            panic!("expected current snapshot");
        };
        assert_eq!(decoded.settings, Some(settings));

        let bad = r#"{"version": 1, "tasks": [], "settings": {"theme": "neon"}}"#;
        let Decoded::Current(decoded) = decode(bad).unwrap() else {
            panic!("expected current snapshot");
        };
        assert_eq!(decoded.settings, None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("{not json").is_err());
        assert!(decode("42").is_err());
        assert!(decode(r#"{"tasks": []}"#).is_err());
    }
}
