//! Source classification by name prefix

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// Visualization family a source declares through its name prefix
///
/// The prefix is chosen by the user when the source is registered; it is
/// never derived from the file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Prefix {
    #[default]
    None,
    /// `iso_`: multi-dimensional surface data
    Isometric,
    /// `iso_tri_`: flat point clouds for triangulated surfaces
    IsometricTriangulated,
}

impl Prefix {
    pub const ISOMETRIC: &'static str = "iso_";
    pub const TRIANGULATED: &'static str = "iso_tri_";

    pub fn classify(name: &str) -> Self {
        if name.starts_with(Self::TRIANGULATED) {
            Prefix::IsometricTriangulated
        } else if name.starts_with(Self::ISOMETRIC) {
            Prefix::Isometric
        } else {
            Prefix::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Prefix::None => "",
            Prefix::Isometric => Self::ISOMETRIC,
            Prefix::IsometricTriangulated => Self::TRIANGULATED,
        }
    }

    /// Prefix a file name; names that already classify as `self` are kept
    ///
    /// A name whose own prefix contradicts the declared one is rejected,
    /// since no renaming can make it classify as declared.
    pub fn apply(&self, name: &str) -> Result<String> {
        let found = Self::classify(name);
        if found == *self {
            return Ok(name.to_string());
        }
        let prefixed = format!("{}{}", self.as_str(), name);
        if Self::classify(&prefixed) != *self {
            return Err(CoreError::PrefixMismatch {
                name: name.to_string(),
                declared: *self,
                found,
            });
        }
        Ok(prefixed)
    }
}
