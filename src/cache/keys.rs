//! Read-cache key scheme shared with the read side.

/// Prefix covering every global leaderboard entry.
pub const LEADERBOARD_PREFIX: &str = "leaderboard:";

/// Per-participant aggregate view.
pub fn participant_key(address: &str) -> String {
    format!("user:{address}")
}

/// Per-participant historical series.
pub fn history_key(address: &str) -> String {
    format!("history:{address}")
}

/// Single worker lookup.
pub fn worker_key(address: &str, name: &str) -> String {
    format!("worker:{address}:{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(participant_key("abc"), "user:abc");
        assert_eq!(history_key("abc"), "history:abc");
        assert_eq!(worker_key("abc", "rig1"), "worker:abc:rig1");
        assert_eq!(worker_key("abc", ""), "worker:abc:");
    }
}
