//! Tri-state field for partial updates.

use serde::{Deserialize, Deserializer};

/// A field of a partial update.
///
/// Combine with `#[serde(default)]`: a key missing from the body stays
/// [`Patch::Absent`], an explicit `null` becomes [`Patch::Clear`], and any
/// other value becomes [`Patch::Set`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Absent,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Patch<U> {
        match self {
            Patch::Absent => Patch::Absent,
            Patch::Clear => Patch::Clear,
            Patch::Set(value) => Patch::Set(f(value)),
        }
    }

    /// Write into an optional slot; `Absent` leaves it untouched.
    pub fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Patch::Absent => {}
            Patch::Clear => *slot = None,
            Patch::Set(value) => *slot = Some(value),
        }
    }
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Absent
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(|value| match value {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(default)]
        genre: Patch<String>,
    }

    fn parse(json: &str) -> Patch<String> {
        serde_json::from_str::<Body>(json).unwrap().genre
    }

    #[test]
    fn distinguishes_missing_null_and_value() {
        assert_eq!(parse("{}"), Patch::Absent);
        assert_eq!(parse(r#"{"genre":null}"#), Patch::Clear);
        assert_eq!(parse(r#"{"genre":"Memoir"}"#), Patch::Set("Memoir".to_string()));
    }

    #[test]
    fn apply_to_respects_presence() {
        let mut slot = Some("Memoir".to_string());
        Patch::Absent.apply_to(&mut slot);
        assert_eq!(slot.as_deref(), Some("Memoir"));

        Patch::Set("Essay".to_string()).apply_to(&mut slot);
        assert_eq!(slot.as_deref(), Some("Essay"));

        Patch::Clear.apply_to(&mut slot);
        assert_eq!(slot, None);
    }
}
