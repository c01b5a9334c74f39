//! Request extractors.

mod payload;
pub use payload::WritePayload;
