//! Maps used to track paint and decal requirements.
//!
//! - [`keyed`]: [`IdentityKeyedMap`], hashed by key set only.
//! - [`status`]: [`StatusMap`] over one key domain with tri-state [`Status`]
//!   values and a guard against look-alike keys.

pub mod keyed;
pub mod status;

pub use keyed::IdentityKeyedMap;
pub use status::{DecalMap, IntoStatusKey, PaintMap, Status, StatusMap};
