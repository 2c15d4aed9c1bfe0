// Document id generation.
//
// Document stores expect string ids; UUID v4 matches what the store
// clients assign when a document is written without one.

/// Generate a unique document id (hyphenated UUID v4, 36 characters).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
