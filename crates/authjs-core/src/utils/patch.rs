// Serde helpers for partial-update shapes.
//
// A patch field is `Option<Option<T>>`: the outer `None` means "leave the
// stored value alone", `Some(None)` means "set it to null".

use serde::{Deserialize, Deserializer};

/// Deserialize a present field (including an explicit `null`) as `Some(..)`.
///
/// Pair with `#[serde(default)]` so that a missing field stays `None`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
