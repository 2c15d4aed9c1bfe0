// Adapter configuration.
//
// Container names and partition-key paths are fixed (see `containers`);
// only the database id and the concurrency behaviour are tunable.

use authjs_core::env;

/// Database id used when none is configured.
pub const DEFAULT_DATABASE_ID: &str = "auth";

/// Environment variable overriding the database id.
pub const ENV_DATABASE_ID: &str = "AUTH_COSMOSDB_DATABASE";

/// Environment variable toggling etag checks on read-modify-write updates.
pub const ENV_OPTIMISTIC_CONCURRENCY: &str = "AUTH_COSMOSDB_OPTIMISTIC_CONCURRENCY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosmosAdapterOptions {
    /// Logical database holding the four containers.
    pub database_id: String,
    /// Send the etag read during `update_user` / `update_session` /
    /// `use_verification_token` as an `if-match` precondition. A concurrent
    /// writer then surfaces as a `PreconditionFailed` error instead of a
    /// silently lost update.
    pub optimistic_concurrency: bool,
}

impl Default for CosmosAdapterOptions {
    fn default() -> Self {
        Self {
            database_id: DEFAULT_DATABASE_ID.to_string(),
            optimistic_concurrency: true,
        }
    }
}

impl CosmosAdapterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `AUTH_COSMOSDB_DATABASE` and
    /// `AUTH_COSMOSDB_OPTIMISTIC_CONCURRENCY` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(env::var(ENV_DATABASE_ID), env::flag(ENV_OPTIMISTIC_CONCURRENCY))
    }

    fn from_lookup(database_id: Option<String>, optimistic_concurrency: Option<bool>) -> Self {
        let defaults = Self::default();
        Self {
            database_id: database_id.unwrap_or(defaults.database_id),
            optimistic_concurrency: optimistic_concurrency
                .unwrap_or(defaults.optimistic_concurrency),
        }
    }

    pub fn database_id(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = database_id.into();
        self
    }

    pub fn optimistic_concurrency(mut self, enabled: bool) -> Self {
        self.optimistic_concurrency = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CosmosAdapterOptions::default();
        assert_eq!(options.database_id, "auth");
        assert!(options.optimistic_concurrency);
    }

    #[test]
    fn test_builder() {
        let options = CosmosAdapterOptions::new()
            .database_id("authTest")
            .optimistic_concurrency(false);
        assert_eq!(options.database_id, "authTest");
        assert!(!options.optimistic_concurrency);
    }

    #[test]
    fn test_lookup_overrides() {
        let options = CosmosAdapterOptions::from_lookup(Some("tenant-a".into()), Some(false));
        assert_eq!(options.database_id, "tenant-a");
        assert!(!options.optimistic_concurrency);
    }

    #[test]
    fn test_lookup_falls_back_to_defaults() {
        assert_eq!(
            CosmosAdapterOptions::from_lookup(None, None),
            CosmosAdapterOptions::default()
        );
    }
}
