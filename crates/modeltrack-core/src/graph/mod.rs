//! The build graph: parts, assemblies and the steps that own them.
//!
//! ## Submodules
//!
//! - [`part`]: [`Part`] and the [`Trackable`] query trait shared by every
//!   entity.
//! - [`assembly`]: [`Assembly`], [`Member`], lookups and [`Progress`].
//! - [`step`]: [`Step`], the unit of ownership.
//!
//! All three are handles over one shared node store, so the same instance can
//! appear in several containers and a model registry at once.

pub mod assembly;
pub(crate) mod node;
pub mod part;
pub mod step;

pub use assembly::{Assembly, ItemRef, Lookup, Member, Progress};
pub use node::Kind;
pub use part::{Part, Trackable};
pub use step::Step;
