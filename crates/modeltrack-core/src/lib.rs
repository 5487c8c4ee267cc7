//! modeltrack-core: step-by-step build tracking for model kits.
//!
//! A [`Model`] is an ordered list of [`Step`]s. Each step owns the [`Part`]s
//! and [`Assembly`]s introduced at that stage, and every part tracks the
//! [`Paint`]s and [`Decal`]s it needs with a tri-state [`Status`].
//!
//! ```
//! use modeltrack_core::{Color, Model, Part, Status, Trackable};
//!
//! let red = Color::new("Tamiya", "X-7", "Red")?.brush();
//! let wheel = Part::new("wheel", [red.clone()], []);
//!
//! let mut model = Model::new("buggy");
//! model.next_step("wheels", [&wheel]);
//! assert!(!model.get_step(1)?.is_painted());
//!
//! wheel.set_paint_status(red, Status::Done)?;
//! assert!(model[0].is_painted());
//! # Ok::<(), modeltrack_core::TrackError>(())
//! ```
//!
//! # Conventions
//!
//! - **Errors**: [`TrackError`] for graph and model operations,
//!   [`PersistError`] for snapshots, `anyhow::Result` for configuration.
//! - **Logging**: `tracing` macros only; the library never installs a
//!   subscriber.
//! - **Sharing**: entity handles are reference-counted. Cloning a handle
//!   shares the instance; use `copy()` for an independent one.

pub mod config;
pub mod detail;
pub mod error;
pub mod graph;
pub mod map;
pub mod model;
pub mod persist;

pub use detail::{Color, Decal, Paint, PaintType};
pub use error::{ErrorCode, ErrorKind, TrackError};
pub use graph::{Assembly, ItemRef, Kind, Lookup, Member, Part, Progress, Step, Trackable};
pub use map::{DecalMap, PaintMap, Status};
pub use model::{Model, PaintKey, StepSelector};
pub use persist::PersistError;
