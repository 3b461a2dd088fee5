//! Registry error types

use super::entry::PeerId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A peer with this identity is already registered
    ///
    /// Identities are allocated by the hub, so this means the transport
    /// handed the same connection over twice.
    DuplicateIdentity(PeerId),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateIdentity(id) => {
                write!(f, "Duplicate peer identity: {}", id)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
