pub mod adapter;
pub mod models;

pub use adapter::Adapter;
pub use models::{
    AccountType, AdapterAccount, AdapterSession, AdapterUser, ExtraFields, NewUser,
    ProviderAccountId, SessionAndUser, SessionPatch, UserPatch, VerificationToken,
    VerificationTokenKey,
};
