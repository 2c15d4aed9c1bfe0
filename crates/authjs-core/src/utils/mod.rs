// Utility functions: id generation, timestamp handling, patch helpers.

pub mod date;
pub mod id;
pub mod patch;

pub use date::{iso8601, now};
pub use id::generate_id;
