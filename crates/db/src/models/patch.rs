//! Helpers for partial updates.

use serde::{Deserialize, Deserializer};

/// Distinguishes a missing field (`None`) from an explicit `null` (`Some(None)`).
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Optional text from a form: `None` leaves the field alone, a blank string clears it.
pub fn text_update(value: Option<&String>) -> Option<Option<String>> {
    value.map(|v| normalize_text(Some(v)))
}

/// Trims and maps blank strings to `None`.
pub fn normalize_text(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
