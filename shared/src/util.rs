//! Small shared helpers

/// Current Unix timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a new opaque entity id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
