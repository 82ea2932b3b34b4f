//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The percentage value was out of range.
    #[error("percent must be between 0.0 and 100.0, got {value}")]
    PercentOutOfRange { value: f64 },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated account identifier.
    AccountId, "account ID"
);

define_string_id!(
    /// A validated profile identifier.
    ///
    /// Profiles belong to exactly one account; uniqueness is enforced at the
    /// database level.
    ProfileId, "profile ID"
);

define_string_id!(
    /// A validated show identifier.
    ShowId, "show ID"
);

define_string_id!(
    /// A validated episode identifier.
    ///
    /// Episode IDs are globally unique, not scoped to their show.
    EpisodeId, "episode ID"
);

define_string_id!(
    /// A validated movie identifier.
    MovieId, "movie ID"
);

/// A completion percentage in the range \[0.0, 100.0\].
///
/// Percentages are always derived from a watched/total ratio; an empty
/// denominator yields 0 rather than NaN so callers never see a hole in the
/// response.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percent(f64);

impl Percent {
    /// The maximum percentage (100.0).
    pub const MAX: Self = Self(100.0);

    /// The minimum percentage (0.0).
    pub const MIN: Self = Self(0.0);

    /// Creates a new percentage after validation.
    ///
    /// Returns an error if the value is outside \[0.0, 100.0\] or is NaN.
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_nan() || !(0.0..=100.0).contains(&value) {
            return Err(ValidationError::PercentOutOfRange { value });
        }
        Ok(Self(value))
    }

    /// Creates a percentage, clamping to \[0.0, 100.0\].
    ///
    /// NaN values become 0.0. Values outside the range are clamped.
    #[must_use]
    pub const fn clamped(value: f64) -> Self {
        if value.is_nan() || value < 0.0 {
            Self(0.0)
        } else if value > 100.0 {
            Self(100.0)
        } else {
            Self(value)
        }
    }

    /// Computes `numerator / denominator * 100`, clamped to \[0.0, 100.0\].
    ///
    /// A zero denominator yields 0, never NaN.
    #[must_use]
    pub fn from_ratio(numerator: u64, denominator: u64) -> Self {
        if denominator == 0 {
            return Self::MIN;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = numerator as f64 / denominator as f64;
        Self::clamped(ratio * 100.0)
    }

    /// Returns the inner f64 value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Default for Percent {
    fn default() -> Self {
        Self::MIN
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl From<Percent> for f64 {
    fn from(p: Percent) -> Self {
        p.0
    }
}

impl Serialize for Percent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Ok(Self::clamped(value))
    }
}
