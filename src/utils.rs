//! Utility functions for the game service

use crate::types::ConnectionId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique connection ID
pub fn generate_connection_id() -> ConnectionId {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Truncate a display name to at most `max_chars` characters for log output
pub fn log_safe_name(name: &str, max_chars: usize) -> String {
    name.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_connection_id();
        let id2 = generate_connection_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_log_safe_name() {
        assert_eq!(log_safe_name("Alice", 3), "Ali");
        assert_eq!(log_safe_name("Bob", 10), "Bob");
        assert_eq!(log_safe_name("ñandú", 2), "ña");
    }
}
