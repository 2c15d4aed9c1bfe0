// Format translator: typed records to stored documents and back.
//
// Timestamps are converted by the records' own field declarations
// (`#[serde(with = "iso8601")]`), so a string that merely looks like a date
// is passed through as a string. Store system properties (`_rid`, `_etag`,
// `_ts`, ...) are stripped in both directions.

use serde::de::DeserializeOwned;
use serde::Serialize;

use authjs_core::db::models::AdapterSession;
use authjs_core::error::{AdapterError, AdapterResult};

use crate::store::{is_system_property, Document};

/// Produce the document to persist for `record`.
pub fn to_storage<T: Serialize>(record: &T) -> AdapterResult<Document> {
    match serde_json::to_value(record)? {
        serde_json::Value::Object(map) => Ok(strip_system_properties(map)),
        other => Err(AdapterError::Config(format!(
            "records must serialize to JSON objects, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Decode a stored document into a typed record.
pub fn from_storage<T: DeserializeOwned>(document: Document) -> AdapterResult<T> {
    let clean = strip_system_properties(document);
    Ok(serde_json::from_value(serde_json::Value::Object(clean))?)
}

/// Session document: the token doubles as the document id.
pub fn session_to_storage(session: &AdapterSession) -> AdapterResult<Document> {
    let mut document = to_storage(session)?;
    document.insert("id".into(), session.session_token.clone().into());
    Ok(document)
}

/// Decode a session document. Its `id` is an address, not a session field.
pub fn session_from_storage(mut document: Document) -> AdapterResult<AdapterSession> {
    document.remove("id");
    from_storage(document)
}

/// Drop every store-managed key.
pub fn strip_system_properties(document: Document) -> Document {
    document
        .into_iter()
        .filter(|(key, _)| !is_system_property(key))
        .collect()
}

/// Overlay `patch` on `existing`; keys present in the patch win.
pub fn merge(mut existing: Document, patch: Document) -> Document {
    for (key, value) in patch {
        existing.insert(key, value);
    }
    existing
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authjs_core::db::models::{
        AccountType, AdapterAccount, AdapterSession, AdapterUser, ExtraFields, VerificationToken,
    };
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_to_storage_formats_dates() {
        let session = AdapterSession::new(
            "tok1",
            "u1",
            Utc.with_ymd_and_hms(2030, 6, 1, 8, 0, 0).unwrap(),
        );
        let stored = to_storage(&session).unwrap();
        assert_eq!(stored["expires"], "2030-06-01T08:00:00.000Z");
        assert_eq!(stored["sessionToken"], "tok1");
    }

    #[test]
    fn test_to_storage_never_writes_system_properties() {
        let mut extra = ExtraFields::new();
        extra.insert("_etag".into(), json!("forged"));
        extra.insert("plan".into(), json!("pro"));
        let user = AdapterUser {
            id: "u1".into(),
            email: "a@b.com".into(),
            email_verified: None,
            name: None,
            image: None,
            extra,
        };
        let stored = to_storage(&user).unwrap();
        assert!(!stored.contains_key("_etag"));
        assert_eq!(stored["plan"], "pro");
    }

    #[test]
    fn test_from_storage_strips_system_properties() {
        let stored = doc(json!({
            "id": "u1",
            "email": "a@b.com",
            "emailVerified": null,
            "_rid": "abc",
            "_etag": "\"1\"",
            "_ts": 1700000000,
        }));
        let user: AdapterUser = from_storage(stored).unwrap();
        assert!(user.extra.is_empty());
        assert_eq!(user.id, "u1");
    }

    #[test]
    fn test_date_like_strings_stay_strings() {
        let stored = doc(json!({
            "id": "u1",
            "email": "a@b.com",
            "emailVerified": null,
            "name": "2024-01-01T00:00:00.000Z",
            "nickname": "2024-01-01",
        }));
        let user: AdapterUser = from_storage(stored).unwrap();
        assert_eq!(user.name.as_deref(), Some("2024-01-01T00:00:00.000Z"));
        assert_eq!(user.extra["nickname"], "2024-01-01");
    }

    #[test]
    fn test_roundtrip_user() {
        let user = AdapterUser {
            id: "u1".into(),
            email: "a@b.com".into(),
            email_verified: Some(Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap()),
            name: Some("Alice".into()),
            image: Some("https://example.com/a.png".into()),
            extra: ExtraFields::new(),
        };
        let back: AdapterUser = from_storage(to_storage(&user).unwrap()).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_roundtrip_account_keeps_numeric_expiry() {
        let mut account = AdapterAccount::new("u1", AccountType::Oidc, "google", "g-1");
        account.id = Some("a1".into());
        account.expires_at = Some(1_767_225_600);
        account.id_token = Some("jwt".into());

        let stored = to_storage(&account).unwrap();
        assert_eq!(stored["expires_at"], 1_767_225_600);

        let back: AdapterAccount = from_storage(stored).unwrap();
        assert_eq!(back, account);
    }

    #[test]
    fn test_roundtrip_verification_token() {
        let token = VerificationToken::new(
            "a@b.com",
            "t1",
            Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap(),
        );
        let back: VerificationToken = from_storage(to_storage(&token).unwrap()).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn test_session_id_stays_out_of_extra_fields() {
        let session = AdapterSession::new(
            "tok1",
            "u1",
            Utc.with_ymd_and_hms(2030, 6, 1, 8, 0, 0).unwrap(),
        )
        .with_field("deviceName", "laptop");

        let stored = session_to_storage(&session).unwrap();
        assert_eq!(stored["id"], "tok1");
        assert_eq!(stored["deviceName"], "laptop");

        let back = session_from_storage(stored).unwrap();
        assert!(!back.extra.contains_key("id"));
        assert_eq!(back, session);
    }

    #[test]
    fn test_merge_patch_wins() {
        let existing = doc(json!({"id": "u1", "name": "Old", "email": "a@b.com"}));
        let patch = doc(json!({"id": "u1", "name": "New"}));
        let merged = merge(existing, patch);
        assert_eq!(merged["name"], "New");
        assert_eq!(merged["email"], "a@b.com");
    }

    #[test]
    fn test_non_object_record_is_rejected() {
        let err = to_storage(&"just a string").unwrap_err();
        assert!(matches!(err, AdapterError::Config(_)));
    }

    #[test]
    fn test_undecodable_document_is_serialization_error() {
        let stored = doc(json!({"id": "u1"}));
        let err = from_storage::<AdapterUser>(stored).unwrap_err();
        assert!(matches!(err, AdapterError::Serialization(_)));
    }
}
