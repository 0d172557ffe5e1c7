//! Identity generation.

/// Produces collision-resistant opaque string identifiers at creation
/// time.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 uuid with the dashes stripped: 32 lowercase hex chars.
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}
