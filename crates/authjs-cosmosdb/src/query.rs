// Query builder: parameterized SQL specs for the secondary lookups.
//
// Values never get spliced into the query text; each equality predicate
// binds an `@field` parameter.

use serde::{Deserialize, Serialize};

/// A single named query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlParameter {
    /// Parameter name including the `@` prefix.
    pub name: String,
    pub value: serde_json::Value,
}

/// A parameterized SQL query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQuerySpec {
    pub query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<SqlParameter>,
}

impl SqlQuerySpec {
    /// Every document in the container.
    pub fn select_all() -> Self {
        Self {
            query: "SELECT * FROM c".to_string(),
            parameters: Vec::new(),
        }
    }

    /// Documents whose fields equal all of the given values.
    ///
    /// Field names are identifiers from this crate, not caller input.
    pub fn select_where(conditions: &[(&str, serde_json::Value)]) -> Self {
        if conditions.is_empty() {
            return Self::select_all();
        }

        let predicates: Vec<String> = conditions
            .iter()
            .map(|(field, _)| format!("c.{field} = @{field}"))
            .collect();

        let parameters = conditions
            .iter()
            .map(|(field, value)| SqlParameter {
                name: format!("@{field}"),
                value: value.clone(),
            })
            .collect();

        Self {
            query: format!("SELECT * FROM c WHERE {}", predicates.join(" AND ")),
            parameters,
        }
    }

    pub fn user_by_email(email: &str) -> Self {
        Self::select_where(&[("email", email.into())])
    }

    pub fn account_by_provider(provider: &str, provider_account_id: &str) -> Self {
        Self::select_where(&[
            ("provider", provider.into()),
            ("providerAccountId", provider_account_id.into()),
        ])
    }

    pub fn session_by_token(session_token: &str) -> Self {
        Self::select_where(&[("sessionToken", session_token.into())])
    }

    pub fn verification_token(identifier: &str, token: &str) -> Self {
        Self::select_where(&[("identifier", identifier.into()), ("token", token.into())])
    }

    /// Look up a bound parameter by name (with or without the `@`).
    pub fn parameter(&self, name: &str) -> Option<&serde_json::Value> {
        let wanted = name.trim_start_matches('@');
        self.parameters
            .iter()
            .find(|p| p.name.trim_start_matches('@') == wanted)
            .map(|p| &p.value)
    }
}
