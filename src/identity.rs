//! Identifier assignment for new records.

use uuid::Uuid;

/// Produces the primary key of every record created through the API.
pub trait IdentifierAssigner: Send + Sync {
    fn assign(&self) -> Uuid;
}

/// Random (v4) UUIDs.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidV4Assigner;

impl IdentifierAssigner for UuidV4Assigner {
    fn assign(&self) -> Uuid {
        Uuid::new_v4()
    }
}
