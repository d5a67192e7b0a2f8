pub mod bookmarks;
pub mod folders;
pub mod token;
pub mod users;

use serde::{Deserialize, Deserializer};

/// Tri-state PATCH field: absent -> `None`, `null` -> `Some(None)`, value -> `Some(Some(v))`.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
