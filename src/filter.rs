// Query filtering over indexed record fields

use crate::record::IndexValue;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Filter for querying records
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field name to filter on
    pub field: String,
    /// Comparison operator
    pub op: FilterOp,
    /// Value to compare against
    pub value: IndexValue,
}

/// Comparison operators for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,       // ==
    Ne,       // !=
    Gt,       // >
    Lt,       // <
    Gte,      // >=
    Lte,      // <=
    Contains, // substring, or membership for list fields
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<IndexValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    /// Check a record's indexed fields against this filter.
    ///
    /// A missing field or a value of a different type never matches. List
    /// fields support `Contains` (member) and `Ne` (not a member).
    pub fn matches(&self, fields: &HashMap<String, IndexValue>) -> bool {
        let Some(actual) = fields.get(&self.field) else {
            return false;
        };

        match (actual, &self.value) {
            (IndexValue::List(items), IndexValue::String(wanted)) => match self.op {
                FilterOp::Contains => items.contains(wanted),
                FilterOp::Ne => !items.contains(wanted),
                _ => false,
            },
            (IndexValue::String(a), IndexValue::String(b)) if self.op == FilterOp::Contains => a.contains(b.as_str()),
            (actual, wanted) => match compare(actual, wanted) {
                Some(ordering) => self.op.accepts(ordering),
                None => false,
            },
        }
    }
}

impl FilterOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Ne => ordering != Ordering::Equal,
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Lt => ordering == Ordering::Less,
            FilterOp::Gte => ordering != Ordering::Less,
            FilterOp::Lte => ordering != Ordering::Greater,
            FilterOp::Contains => false,
        }
    }
}

fn compare(a: &IndexValue, b: &IndexValue) -> Option<Ordering> {
    match (a, b) {
        (IndexValue::String(a), IndexValue::String(b)) => Some(a.cmp(b)),
        (IndexValue::Int(a), IndexValue::Int(b)) => Some(a.cmp(b)),
        (IndexValue::Bool(a), IndexValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

impl std::fmt::Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterOp::Eq => write!(f, "="),
            FilterOp::Ne => write!(f, "!="),
            FilterOp::Gt => write!(f, ">"),
            FilterOp::Lt => write!(f, "<"),
            FilterOp::Gte => write!(f, ">="),
            FilterOp::Lte => write!(f, "<="),
            FilterOp::Contains => write!(f, "~"),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::String("pending".to_string()));
        fields.insert("due_date".to_string(), IndexValue::Int(1_000));
        fields.insert("completed".to_string(), IndexValue::Bool(false));
        fields.insert(
            "tags".to_string(),
            IndexValue::List(vec!["exam".to_string(), "project".to_string()]),
        );
        fields
    }

    #[test]
    fn test_filter_creation() {
        let filter = Filter::eq("status", "active");

        assert_eq!(filter.field, "status");
        assert_eq!(filter.op, FilterOp::Eq);
        assert_eq!(filter.value, IndexValue::String("active".to_string()));
    }

    #[test]
    fn test_string_filters() {
        let fields = fields();
        assert!(Filter::eq("status", "pending").matches(&fields));
        assert!(!Filter::eq("status", "completed").matches(&fields));
        assert!(Filter::new("status", FilterOp::Ne, "completed").matches(&fields));
        assert!(Filter::new("status", FilterOp::Contains, "end").matches(&fields));
    }

    #[test]
    fn test_int_filters() {
        let fields = fields();
        assert!(Filter::new("due_date", FilterOp::Lte, 1_000i64).matches(&fields));
        assert!(!Filter::new("due_date", FilterOp::Lt, 1_000i64).matches(&fields));
        assert!(Filter::new("due_date", FilterOp::Gte, 1_000i64).matches(&fields));
        assert!(Filter::new("due_date", FilterOp::Gt, 999i64).matches(&fields));
        assert!(!Filter::new("due_date", FilterOp::Contains, 1_000i64).matches(&fields));
    }

    #[test]
    fn test_list_membership() {
        let fields = fields();
        assert!(Filter::new("tags", FilterOp::Contains, "exam").matches(&fields));
        assert!(!Filter::new("tags", FilterOp::Contains, "reading").matches(&fields));
        assert!(Filter::new("tags", FilterOp::Ne, "reading").matches(&fields));
        assert!(!Filter::eq("tags", "exam").matches(&fields));
    }

    #[test]
    fn test_missing_field_or_type_mismatch() {
        let fields = fields();
        assert!(!Filter::eq("missing", "x").matches(&fields));
        assert!(!Filter::eq("due_date", "1000").matches(&fields));
        assert!(Filter::eq("completed", false).matches(&fields));
    }

    #[test]
    fn test_filter_display() {
        assert_eq!(FilterOp::Eq.to_string(), "=");
        assert_eq!(FilterOp::Ne.to_string(), "!=");
        assert_eq!(Filter::new("due_date", FilterOp::Lt, 5i64).to_string(), "due_date < 5");
    }
}
