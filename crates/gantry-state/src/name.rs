#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Caller-chosen unique identifier for an artifact.
///
/// Used as both the status-file basename (`<SafeName>.json`) and the
/// path leaf under the catalogue, so it must be a single safe path
/// segment: non-empty, no separators, not `.` or `..`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SafeName(String);

impl SafeName {
    pub fn new(name: impl Into<String>) -> Result<Self, StateError> {
        let name = name.into();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            return Err(StateError::InvalidName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `<SafeName>.json` basename this artifact uses in config and
    /// status directories.
    pub fn json_file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl TryFrom<String> for SafeName {
    type Error = StateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SafeName> for String {
    fn from(name: SafeName) -> Self {
        name.0
    }
}

impl fmt::Display for SafeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
