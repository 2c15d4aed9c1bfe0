#![doc = include_str!("../README.md")]

pub mod db;
pub mod env;
pub mod error;
pub mod utils;

// Re-exports for convenience
pub use db::adapter::Adapter;
pub use db::models::{
    AccountType, AdapterAccount, AdapterSession, AdapterUser, NewUser, ProviderAccountId,
    SessionAndUser, SessionPatch, UserPatch, VerificationToken, VerificationTokenKey,
};
pub use error::{AdapterError, AdapterResult, DatabaseError, DatabaseErrorKind};
