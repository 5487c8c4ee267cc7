//! Paint and decal values tracked on parts.
//!
//! These are plain value objects: equality and hashing are by content, so two
//! independently constructed `Color`s with the same brand/code/name are the
//! same color everywhere (status maps, registries, snapshots).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TrackError;

/// How a paint is applied to a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaintType {
    Spray,
    Brush,
}

impl PaintType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Spray => "spray",
            Self::Brush => "brush",
        }
    }
}

impl fmt::Display for PaintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A paint color, identified by brand plus a code and/or a name.
///
/// Use whichever coding the kit instructions use for `code`; at least one of
/// `code` and `name` must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    brand: String,
    code: String,
    name: String,
}

impl Color {
    /// Create a color.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::EmptyColorHandle`] if both `code` and `name`
    /// are empty.
    pub fn new(
        brand: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, TrackError> {
        let code = code.into();
        let name = name.into();
        if code.is_empty() && name.is_empty() {
            return Err(TrackError::EmptyColorHandle);
        }
        Ok(Self {
            brand: brand.into(),
            code,
            name,
        })
    }

    /// Create a color mixed from `(color, ratio)` components.
    ///
    /// The code is each component's handle suffixed with `:ratio`, joined by
    /// `" + "`. The brand is the components' common brand, or `"Mixture"`
    /// when they differ.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::EmptyColorMix`] if `components` is empty.
    pub fn mix(components: &[(Self, u32)], name: impl Into<String>) -> Result<Self, TrackError> {
        let Some((first, _)) = components.first() else {
            return Err(TrackError::EmptyColorMix);
        };

        let same_brand = components.iter().all(|(c, _)| c.brand == first.brand);
        let brand = if same_brand {
            first.brand.clone()
        } else {
            "Mixture".to_string()
        };

        let code = components
            .iter()
            .map(|(c, ratio)| format!("{}:{ratio}", c.handle()))
            .collect::<Vec<_>>()
            .join(" + ");

        Self::new(brand, code, name)
    }

    #[must_use]
    pub fn brand(&self) -> &str {
        &self.brand
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The code if present, otherwise the name.
    #[must_use]
    pub fn handle(&self) -> &str {
        if self.code.is_empty() {
            &self.name
        } else {
            &self.code
        }
    }

    /// This color applied with a spray can or airbrush.
    #[must_use]
    pub fn spray(&self) -> Paint {
        Paint::new(self.clone(), PaintType::Spray)
    }

    /// This color applied by brush.
    #[must_use]
    pub fn brush(&self) -> Paint {
        Paint::new(self.clone(), PaintType::Brush)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {}, {}>", self.brand, self.code, self.name)
    }
}

/// A color together with the way it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Paint {
    color: Color,
    paint_type: PaintType,
}

impl Paint {
    #[must_use]
    pub const fn new(color: Color, paint_type: PaintType) -> Self {
        Self { color, paint_type }
    }

    #[must_use]
    pub const fn color(&self) -> &Color {
        &self.color
    }

    #[must_use]
    pub const fn paint_type(&self) -> PaintType {
        self.paint_type
    }
}

impl fmt::Display for Paint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {}>", self.color, self.paint_type)
    }
}

/// A decal, identified by its sheet number or name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decal {
    id: String,
}

impl Decal {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Decal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<decal {}>", self.id)
    }
}
