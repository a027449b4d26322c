//! Tri-state optional: distinguishes "not supplied", "explicitly null" and "explicitly set".

use serde::{Deserialize, Deserializer};

/// Value of one update-shape field.
///
/// Deserializing a supplied value yields `Present(None)` for `null` and
/// `Present(Some(_))` otherwise. With `#[serde(default)]` on a struct field a
/// missing key stays [`TriState::Absent`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TriState<T> {
    #[default]
    Absent,
    Present(Option<T>),
}

impl<T> TriState<T> {
    pub fn value(v: T) -> Self {
        TriState::Present(Some(v))
    }

    pub fn null() -> Self {
        TriState::Present(None)
    }
}

impl<'de, T> Deserialize<'de> for TriState<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(TriState::Present)
    }
}
