//! Hidden bookkeeping fields
//!
//! Live and history documents carry a few underscore-prefixed fields next to
//! the caller's own content. They are written by the coordinator and stripped
//! whenever a stored body is turned back into caller content.

use serde_json::{Map, Value};

pub const STATUS_FIELD: &str = "_status";
pub const COMMENT_FIELD: &str = "_comment";
pub const USER_FIELD: &str = "_user";
pub const TIMESTAMP_FIELD: &str = "_timestamp";
pub const BASE_VERSION_FIELD: &str = "_base_version";
pub const SUPERSEDED_VERSION_FIELD: &str = "_superseded_version";
/// Roles allowed to approve a pending document, as an array of strings.
pub const APPROVAL_ROLES_FIELD: &str = "_approval_roles";

/// Every field the coordinator owns.
pub const HIDDEN_FIELDS: [&str; 7] = [
    STATUS_FIELD,
    COMMENT_FIELD,
    USER_FIELD,
    TIMESTAMP_FIELD,
    BASE_VERSION_FIELD,
    SUPERSEDED_VERSION_FIELD,
    APPROVAL_ROLES_FIELD,
];

pub fn is_hidden(name: &str) -> bool {
    HIDDEN_FIELDS.contains(&name)
}

/// Copy of `body` without hidden fields. Non-object bodies are returned as is.
pub fn strip_hidden(body: &Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !is_hidden(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}
