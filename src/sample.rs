// Default categories and tags for a fresh store

use crate::models::{NewCategory, NewTag};

/// Subject categories with their display colors
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Math", "#4361EE"),
    ("Science", "#3A0CA3"),
    ("English", "#F72585"),
    ("History", "#4CC9F0"),
    ("Computer Science", "#7209B7"),
];

pub const DEFAULT_TAGS: &[&str] = &["Homework", "Exam", "Project", "Reading", "Research"];

pub fn default_categories() -> Vec<NewCategory> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(name, color)| NewCategory {
            name: name.to_string(),
            color: color.to_string(),
        })
        .collect()
}

pub fn default_tags() -> Vec<NewTag> {
    DEFAULT_TAGS
        .iter()
        .map(|name| NewTag { name: name.to_string() })
        .collect()
}
