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

    /// A frequency tolerance must be finite and non-negative.
    #[error("{mode} tolerance must be a non-negative number of kHz, got {value}")]
    InvalidTolerance { mode: &'static str, value: f64 },

    #[error("{field} must be positive")]
    NotPositive { field: &'static str },
}

/// Generates a validated, normalized label newtype with common trait implementations.
macro_rules! define_label {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal, $normalize:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new label after trimming, normalizing and validating it.
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let normalize: fn(&str) -> String = $normalize;
                let value = normalize(value.into().trim());
                if value.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(value))
            }

            /// Returns the label as a string slice.
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

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(label: $name) -> Self {
                label.0
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

define_label!(
    /// A station or operator callsign.
    ///
    /// Callsigns are stored upper-cased so `k1abc` and `K1ABC` compare equal.
    Callsign, "callsign", str::to_ascii_uppercase
);

define_label!(
    /// An amateur band label (e.g. "20m", "160m").
    ///
    /// Bands are categorical here; the engine never derives a band from a
    /// frequency. Labels are stored lower-cased.
    Band, "band", str::to_ascii_lowercase
);

define_label!(
    /// An operating mode as logged (e.g. "CW", "PH", "RY", "FT8").
    ///
    /// Modes are categorical: two spellings are two modes, so streams and
    /// per-mode multipliers keep RTTY and FT8 apart. Labels are stored
    /// upper-cased.
    Mode, "mode", str::to_ascii_uppercase
);

/// The broad family a mode belongs to, used to pick a frequency tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeFamily {
    Cw,
    Phone,
    Digital,
}

impl Mode {
    /// Voice spellings map to [`ModeFamily::Phone`]; anything not CW or voice
    /// is treated as a digital mode.
    #[must_use]
    pub fn family(&self) -> ModeFamily {
        match self.as_str() {
            "CW" => ModeFamily::Cw,
            "PH" | "PHONE" | "SSB" | "USB" | "LSB" | "FM" | "AM" => ModeFamily::Phone,
            _ => ModeFamily::Digital,
        }
    }
}
