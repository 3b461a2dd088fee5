//! Crate-wide error type
//!
//! Per-peer failures (decode errors, send failures) are handled where they
//! occur and never reach this type. `Error` covers what a caller of the
//! hub or the server can actually observe.

use crate::registry::RegistryError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug)]
pub enum Error {
    /// Socket-level I/O failure (bind, serve)
    Io(std::io::Error),
    /// Registry invariant violated
    Registry(RegistryError),
    /// The hub has been shut down and accepts no new peers
    ShuttingDown,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::ShuttingDown => write!(f, "Hub is shutting down"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::ShuttingDown => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PeerId;

    #[test]
    fn test_registry_error_converts() {
        let err: Error = RegistryError::DuplicateIdentity(PeerId::new(7)).into();
        assert!(matches!(err, Error::Registry(_)));
        assert_eq!(err.to_string(), "Registry error: Duplicate peer identity: peer-7");
    }

    #[test]
    fn test_io_error_has_source() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "busy").into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("I/O error"));
    }

    #[test]
    fn test_shutting_down_display() {
        assert_eq!(Error::ShuttingDown.to_string(), "Hub is shutting down");
        assert!(std::error::Error::source(&Error::ShuttingDown).is_none());
    }
}
