//! Deterministic fingerprint for list-query cache keys.
//!
//! The fingerprint is a SHA-256 hash over a canonical `field=value;`
//! rendering of the fully-defaulted filter/sort/pagination options. Field
//! order is fixed, so two queries differing only in construction order
//! share an entry, and any semantic difference produces a distinct key.

use crate::repo::task_repo::{ParentScope, SortDirection, TaskListQuery, TaskSortKey};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Canonicalizes and hashes one list query.
pub fn list_fingerprint(query: &TaskListQuery) -> String {
    let mut canonical = String::new();
    push_field(&mut canonical, "deleted", query.include_deleted.to_string());
    push_field(
        &mut canonical,
        "due_from",
        optional(query.due_from.map(|value| value.to_string())),
    );
    push_field(
        &mut canonical,
        "due_until",
        optional(query.due_until.map(|value| value.to_string())),
    );
    push_field(&mut canonical, "limit", optional(query.limit.map(|value| value.to_string())));
    push_field(&mut canonical, "offset", query.offset.to_string());
    push_field(&mut canonical, "parent", parent_token(query.parent));
    push_field(
        &mut canonical,
        "priority",
        optional(query.priority.map(|value| format!("{value:?}").to_lowercase())),
    );
    push_field(
        &mut canonical,
        "search",
        optional(query.search.as_deref().map(|value| value.trim().to_lowercase())),
    );
    push_field(
        &mut canonical,
        "sort",
        format!("{}.{}", sort_token(query.sort_key), direction_token(query.sort_direction)),
    );
    push_field(
        &mut canonical,
        "status",
        optional(query.status.map(|value| format!("{value:?}").to_lowercase())),
    );

    let digest = Sha256::digest(canonical.as_bytes());
    let mut fingerprint = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(fingerprint, "{byte:02x}");
    }
    fingerprint
}

fn push_field(canonical: &mut String, field: &str, value: String) {
    canonical.push_str(field);
    canonical.push('=');
    canonical.push_str(&value);
    canonical.push(';');
}

fn optional(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}

fn parent_token(scope: ParentScope) -> String {
    match scope {
        ParentScope::Any => "any".to_string(),
        ParentScope::RootsOnly => "roots".to_string(),
        ParentScope::ChildrenOf(parent_uuid) => format!("children.{parent_uuid}"),
    }
}

fn sort_token(key: TaskSortKey) -> &'static str {
    match key {
        TaskSortKey::CreatedAt => "created_at",
        TaskSortKey::UpdatedAt => "updated_at",
        TaskSortKey::DueAt => "due_at",
        TaskSortKey::Priority => "priority",
    }
}

fn direction_token(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Ascending => "asc",
        SortDirection::Descending => "desc",
    }
}

#[cfg(test)]
mod tests {
    use super::list_fingerprint;
    use crate::model::task::TaskStatus;
    use crate::repo::task_repo::{ParentScope, TaskListQuery};
    use uuid::Uuid;

    #[test]
    fn equal_queries_share_a_fingerprint() {
        let left = TaskListQuery {
            status: Some(TaskStatus::Pending),
            ..TaskListQuery::default()
        };
        let right = TaskListQuery {
            status: Some(TaskStatus::Pending),
            ..TaskListQuery::default()
        };
        assert_eq!(list_fingerprint(&left), list_fingerprint(&right));
    }

    #[test]
    fn any_filter_difference_changes_the_fingerprint() {
        let base = TaskListQuery::default();
        let filtered = TaskListQuery {
            status: Some(TaskStatus::Completed),
            ..TaskListQuery::default()
        };
        let paged = TaskListQuery {
            limit: Some(10),
            offset: 10,
            ..TaskListQuery::default()
        };
        let scoped = TaskListQuery {
            parent: ParentScope::ChildrenOf(Uuid::new_v4()),
            ..TaskListQuery::default()
        };

        let fingerprints = [
            list_fingerprint(&base),
            list_fingerprint(&filtered),
            list_fingerprint(&paged),
            list_fingerprint(&scoped),
        ];
        for (index, fingerprint) in fingerprints.iter().enumerate() {
            for other in &fingerprints[index + 1..] {
                assert_ne!(fingerprint, other);
            }
        }
    }

    #[test]
    fn search_needle_is_normalized_before_hashing() {
        let padded = TaskListQuery {
            search: Some("  Report ".to_string()),
            ..TaskListQuery::default()
        };
        let plain = TaskListQuery {
            search: Some("report".to_string()),
            ..TaskListQuery::default()
        };
        assert_eq!(list_fingerprint(&padded), list_fingerprint(&plain));
    }
}
