//! Session store port.
//!
//! Holds at most one active discovery session id so a restarted console can
//! resume tracking without issuing a new remote search.

use crate::domain::errors::StoreError;

/// Durable slot for the active session id
///
/// Implementations must survive a full process restart (except explicitly
/// ephemeral ones) and never expire the stored value on their own.
pub trait SessionStore: Send + Sync {
    /// Persists `session_id`, replacing any previous value
    fn save(&self, session_id: &str) -> Result<(), StoreError>;

    /// Returns the persisted id, if any
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// Removes the persisted id; clearing an empty store is not an error
    fn clear(&self) -> Result<(), StoreError>;
}
