//! Error type returned by a single engine invocation.

use crate::retry::policy::ErrorKind;

/// Failure of one engine call on one work unit.
///
/// Engines that know what went wrong return one of the tagged variants so the
/// retry policy does not have to guess. `Opaque` carries raw text (for example
/// a subprocess's stderr) and is classified by keyword.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("network error: {0}")]
    TransientNetwork(String),
    #[error("resource exhausted: {0}")]
    ResourceExhaustion(String),
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("unsupported request: {0}")]
    Capability(String),
    #[error("processing failed: {0}")]
    General(String),
    #[error("{0}")]
    Opaque(String),
}

impl EngineError {
    /// Kind carried by a structured variant; `None` for `Opaque`.
    pub fn tag(&self) -> Option<ErrorKind> {
        match self {
            EngineError::TransientNetwork(_) => Some(ErrorKind::Network),
            EngineError::ResourceExhaustion(_) => Some(ErrorKind::Memory),
            EngineError::Unavailable(_) => Some(ErrorKind::Unavailable),
            EngineError::Capability(_) => Some(ErrorKind::Capability),
            EngineError::General(_) => Some(ErrorKind::General),
            EngineError::Opaque(_) => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Opaque(e.to_string())
    }
}
