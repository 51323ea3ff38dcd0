//! Map engine errors to retry policy error kinds.

use crate::retry::error::EngineError;
use crate::retry::policy::ErrorKind;

/// Substrings that mark an out-of-memory failure. Checked before network keywords.
pub const MEMORY_KEYWORDS: &[&str] = &[
    "memory",
    "enomem",
    "cannot allocate",
    "out of memory",
    "insufficient memory",
    "malloc",
    "bad_alloc",
];

/// Substrings that mark a transient network failure.
pub const NETWORK_KEYWORDS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "network",
    "refused",
    "unreachable",
    "ssl",
    "certificate",
];

/// Classify free-form error text. Case-insensitive; memory wins over network.
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if MEMORY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return ErrorKind::Memory;
    }
    if NETWORK_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return ErrorKind::Network;
    }
    ErrorKind::General
}

/// Classify an engine error. Structured variants bypass the keyword heuristic.
pub fn classify(e: &EngineError) -> ErrorKind {
    match e.tag() {
        Some(kind) => kind,
        None => classify_message(&e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enomem_is_memory() {
        assert_eq!(classify_message("whisper: ENOMEM while loading model"), ErrorKind::Memory);
        assert_eq!(classify_message("std::bad_alloc"), ErrorKind::Memory);
    }

    #[test]
    fn connection_reset_is_network() {
        assert_eq!(classify_message("Connection reset by peer"), ErrorKind::Network);
        assert_eq!(classify_message("request timed out after 30s"), ErrorKind::Network);
        assert_eq!(classify_message("SSL handshake failed"), ErrorKind::Network);
    }

    #[test]
    fn memory_checked_before_network() {
        assert_eq!(
            classify_message("network buffer: cannot allocate memory"),
            ErrorKind::Memory
        );
    }

    #[test]
    fn unknown_text_is_general() {
        assert_eq!(classify_message("invalid audio header"), ErrorKind::General);
        assert_eq!(classify_message(""), ErrorKind::General);
    }

    #[test]
    fn structured_tag_bypasses_keywords() {
        // Text would match "connection" but the tag says memory.
        let e = EngineError::ResourceExhaustion("connection pool exhausted".into());
        assert_eq!(classify(&e), ErrorKind::Memory);
        let e = EngineError::General("out of memory in decoder".into());
        assert_eq!(classify(&e), ErrorKind::General);
        let e = EngineError::Opaque("out of memory in decoder".into());
        assert_eq!(classify(&e), ErrorKind::Memory);
    }
}
