// Timestamp handling.
//
// In memory every timestamp is a `DateTime<Utc>`. At rest it is an ISO-8601
// string with millisecond precision and a `Z` suffix, the same shape a
// JavaScript `Date#toISOString` produces, so documents written by other
// clients of the same database read back cleanly.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Current time truncated to the precision that survives storage.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Format a timestamp as stored (`YYYY-MM-DDTHH:MM:SS.sssZ`).
pub fn to_iso_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored ISO-8601 / RFC 3339 timestamp into UTC.
pub fn parse_iso_string(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// `#[serde(with = "iso8601")]` for `DateTime<Utc>` fields.
pub mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_iso_string(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_iso_string(&s).map_err(de::Error::custom)
    }

    /// `#[serde(default, with = "iso8601::option")]` for nullable timestamps.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => serializer.serialize_str(&super::super::to_iso_string(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|s| super::super::parse_iso_string(&s).map_err(de::Error::custom))
                .transpose()
        }
    }

    /// `#[serde(default, skip_serializing_if = "Option::is_none", with = "iso8601::patch")]`
    /// for patch fields that may clear a nullable timestamp.
    pub mod patch {
        use chrono::{DateTime, Utc};
        use serde::{Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            dt: &Option<Option<DateTime<Utc>>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(inner) => super::option::serialize(inner, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Option<DateTime<Utc>>>, D::Error> {
            super::option::deserialize(deserializer).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "iso8601")]
        at: DateTime<Utc>,
        #[serde(default, with = "iso8601::option")]
        maybe: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_to_iso_string_has_millis_and_z() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(to_iso_string(&dt), "2024-03-01T12:30:05.000Z");
    }

    #[test]
    fn test_parse_accepts_offsets() {
        let dt = parse_iso_string("2024-03-01T14:30:05+02:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap());
    }

    #[test]
    fn test_now_survives_storage() {
        let dt = now();
        assert_eq!(parse_iso_string(&to_iso_string(&dt)).unwrap(), dt);
    }

    #[test]
    fn test_serde_fields() {
        let value = Stamped {
            at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            maybe: None,
        };
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["at"], "2030-01-01T00:00:00.000Z");
        assert!(json["maybe"].is_null());

        let back: Stamped = serde_json::from_value(json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_missing_optional_is_none() {
        let back: Stamped =
            serde_json::from_value(serde_json::json!({"at": "2030-01-01T00:00:00Z"})).unwrap();
        assert!(back.maybe.is_none());
    }

    #[test]
    fn test_invalid_timestamp_is_rejected() {
        let result: Result<Stamped, _> =
            serde_json::from_value(serde_json::json!({"at": "not a date"}));
        assert!(result.is_err());
    }
}
