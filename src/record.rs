// Record trait shared by every entity the store holds

use crate::models::{Category, Collaborator, Tag, Task};
use crate::snapshot::Collections;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;

/// Core trait that any stored entity implements
pub trait Record: Serialize + DeserializeOwned + Clone + 'static {
    /// Unique identifier within the collection
    fn id(&self) -> &str;

    /// Collection name (e.g., "tasks", "tags"); also the snapshot field name
    fn collection_name() -> &'static str;

    fn collection(data: &Collections) -> &[Self];

    fn collection_mut(data: &mut Collections) -> &mut Vec<Self>;

    /// Fields that filters can match on.
    /// Return empty HashMap if nothing is filterable.
    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        HashMap::new()
    }
}

/// Value types that can be indexed for filtering
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
    /// Set-valued field such as a task's tags
    List(Vec<String>),
}

impl std::fmt::Display for IndexValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexValue::String(s) => write!(f, "{}", s),
            IndexValue::Int(i) => write!(f, "{}", i),
            IndexValue::Bool(b) => write!(f, "{}", b),
            IndexValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        IndexValue::String(value.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        IndexValue::String(value)
    }
}

impl From<i64> for IndexValue {
    fn from(value: i64) -> Self {
        IndexValue::Int(value)
    }
}

impl From<bool> for IndexValue {
    fn from(value: bool) -> Self {
        IndexValue::Bool(value)
    }
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        "tasks"
    }

    fn collection(data: &Collections) -> &[Self] {
        &data.tasks
    }

    fn collection_mut(data: &mut Collections) -> &mut Vec<Self> {
        &mut data.tasks
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("title".to_string(), IndexValue::String(self.title.clone()));
        fields.insert("status".to_string(), IndexValue::String(self.status.as_str().to_string()));
        fields.insert(
            "priority".to_string(),
            IndexValue::String(self.priority.as_str().to_string()),
        );
        fields.insert("category_id".to_string(), IndexValue::String(self.category_id.clone()));
        fields.insert("tags".to_string(), IndexValue::List(self.tags.clone()));
        fields.insert("collaborators".to_string(), IndexValue::List(self.collaborators.clone()));
        fields.insert(
            "collaborator_count".to_string(),
            IndexValue::Int(self.collaborators.len() as i64),
        );
        fields.insert("due_date".to_string(), IndexValue::Int(self.due_date));
        fields.insert("progress".to_string(), IndexValue::Int(i64::from(self.progress)));
        fields.insert("completed".to_string(), IndexValue::Bool(self.is_completed()));
        fields
    }
}

impl Record for Category {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        "categories"
    }

    fn collection(data: &Collections) -> &[Self] {
        &data.categories
    }

    fn collection_mut(data: &mut Collections) -> &mut Vec<Self> {
        &mut data.categories
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), IndexValue::String(self.name.clone()));
        fields.insert("color".to_string(), IndexValue::String(self.color.clone()));
        fields
    }
}

impl Record for Tag {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        "tags"
    }

    fn collection(data: &Collections) -> &[Self] {
        &data.tags
    }

    fn collection_mut(data: &mut Collections) -> &mut Vec<Self> {
        &mut data.tags
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), IndexValue::String(self.name.clone()));
        fields
    }
}

impl Record for Collaborator {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        "collaborators"
    }

    fn collection(data: &Collections) -> &[Self] {
        &data.collaborators
    }

    fn collection_mut(data: &mut Collections) -> &mut Vec<Self> {
        &mut data.collaborators
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), IndexValue::String(self.name.clone()));
        fields.insert("email".to_string(), IndexValue::String(self.email.clone()));
        fields
    }
}
