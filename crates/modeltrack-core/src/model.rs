//! A whole build: the ordered steps and the registries of everything they
//! introduce.
//!
//! # Step numbering
//!
//! Two accessors with two conventions:
//!
//! - [`Model::get_step`] takes a **1-based** step number (as printed in kit
//!   instructions) or a step name.
//! - [`Model::step_at`] and `model[i]` use **0-based** positions, like a slice.
//!
//! `model.get_step(1)` and `model[0]` are the same step.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::ops::Index;
use std::path::PathBuf;

use crate::config::StorageConfig;
use crate::detail::{Decal, Paint, PaintType};
use crate::error::TrackError;
use crate::graph::part::sealed::HasNode;
use crate::graph::{Assembly, Member, Part, Progress, Step, Trackable};
use crate::persist::{self, PersistError};

/// Registry key for paints: the color's handle plus how it is applied.
///
/// Two paints with the same handle and type are one registry entry even if
/// their brands differ; the first one seen is kept.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PaintKey {
    pub handle: String,
    pub paint_type: PaintType,
}

impl PaintKey {
    #[must_use]
    pub fn of(paint: &Paint) -> Self {
        Self {
            handle: paint.color().handle().to_string(),
            paint_type: paint.paint_type(),
        }
    }
}

impl fmt::Display for PaintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.handle, self.paint_type)
    }
}

/// How [`Model::get_step`] finds a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSelector<'a> {
    /// 1-based step number.
    Number(usize),
    /// First step with this name.
    Name(&'a str),
}

impl From<usize> for StepSelector<'_> {
    fn from(number: usize) -> Self {
        Self::Number(number)
    }
}

impl<'a> From<&'a str> for StepSelector<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a String> for StepSelector<'a> {
    fn from(name: &'a String) -> Self {
        Self::Name(name)
    }
}

/// A build made of ordered steps.
///
/// Registries are append-only and first-seen-wins: an entry already present
/// under its key is never replaced, even by a different instance that is
/// equal by value.
#[derive(Debug)]
pub struct Model {
    name: String,
    steps: Vec<Step>,
    parts: BTreeMap<String, Part>,
    assemblies: BTreeMap<String, Assembly>,
    paints: BTreeMap<PaintKey, Paint>,
    decals: BTreeMap<String, Decal>,
}

impl Model {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            parts: BTreeMap::new(),
            assemblies: BTreeMap::new(),
            paints: BTreeMap::new(),
            decals: BTreeMap::new(),
        }
    }

    /// Reassemble a model from decoded state without re-running registration.
    pub(crate) const fn from_raw(
        name: String,
        steps: Vec<Step>,
        parts: BTreeMap<String, Part>,
        assemblies: BTreeMap<String, Assembly>,
        paints: BTreeMap<PaintKey, Paint>,
        decals: BTreeMap<String, Decal>,
    ) -> Self {
        Self {
            name,
            steps,
            parts,
            assemblies,
            paints,
            decals,
        }
    }

    /// Append a step built from `members`, following the current last step,
    /// and register everything newly seen through it.
    pub fn next_step<M: Into<Member>>(
        &mut self,
        name: impl Into<String>,
        members: impl IntoIterator<Item = M>,
    ) -> &Step {
        let step = Step::new(name, members, self.steps.last());
        tracing::debug!(
            model = %self.name,
            step = %step.name(),
            number = self.steps.len() + 1,
            "appending step"
        );
        self.register(&step);
        self.steps.push(step);
        &self.steps[self.steps.len() - 1]
    }

    fn register(&mut self, step: &Step) {
        for member in step.parts() {
            self.register_member(member);
        }

        for paint in step.paints().keys() {
            if let Entry::Vacant(slot) = self.paints.entry(PaintKey::of(paint)) {
                tracing::debug!(paint = %slot.key(), "registered paint");
                slot.insert(paint.clone());
            }
        }
        for decal in step.decals().keys() {
            if let Entry::Vacant(slot) = self.decals.entry(decal.id().to_string()) {
                tracing::debug!(decal = %decal.id(), "registered decal");
                slot.insert(decal.clone());
            }
        }
    }

    fn register_member(&mut self, member: Member) {
        match member {
            Member::Part(part) => {
                if let Entry::Vacant(slot) = self.parts.entry(part.id()) {
                    tracing::debug!(part = %slot.key(), "registered part");
                    slot.insert(part);
                }
            }
            Member::Assembly(assembly) => {
                let nested = assembly.parts();
                if let Entry::Vacant(slot) = self.assemblies.entry(assembly.id()) {
                    tracing::debug!(assembly = %slot.key(), "registered assembly");
                    slot.insert(assembly);
                }
                for member in nested {
                    self.register_member(member);
                }
            }
        }
    }

    /// Look up a step by 1-based number or by name.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::StepOutOfRange`] for a number outside
    /// `1..=len()` and [`TrackError::StepNotFound`] for an unknown name.
    pub fn get_step<'a>(&self, selector: impl Into<StepSelector<'a>>) -> Result<&Step, TrackError> {
        match selector.into() {
            StepSelector::Number(number) => number
                .checked_sub(1)
                .and_then(|index| self.steps.get(index))
                .ok_or(TrackError::StepOutOfRange {
                    number,
                    len: self.steps.len(),
                }),
            StepSelector::Name(name) => self
                .steps
                .iter()
                .find(|step| step.id() == name)
                .ok_or_else(|| TrackError::StepNotFound(name.to_string())),
        }
    }

    /// The step at 0-based `index`.
    #[must_use]
    pub fn step_at(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    #[must_use]
    pub const fn parts(&self) -> &BTreeMap<String, Part> {
        &self.parts
    }

    #[must_use]
    pub const fn assemblies(&self) -> &BTreeMap<String, Assembly> {
        &self.assemblies
    }

    #[must_use]
    pub const fn paints(&self) -> &BTreeMap<PaintKey, Paint> {
        &self.paints
    }

    #[must_use]
    pub const fn decals(&self) -> &BTreeMap<String, Decal> {
        &self.decals
    }

    /// Completion across every step, counting each part instance once.
    #[must_use]
    pub fn progress(&self) -> Progress {
        let roots: Vec<_> = self.steps.iter().map(|s| s.node().clone()).collect();
        Progress::across(&roots)
    }

    /// Write a snapshot to `<directory>/<name>.<extension>`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if encoding or writing fails.
    pub fn save(&self, storage: &StorageConfig) -> Result<PathBuf, PersistError> {
        let path = storage.path_for(&self.name);
        persist::save(self, &path, storage.pretty)?;
        Ok(path)
    }

    /// Read the snapshot named `name` from the storage directory.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file is missing or fails verification.
    pub fn load(storage: &StorageConfig, name: &str) -> Result<Self, PersistError> {
        persist::load(&storage.path_for(name))
    }
}

impl Index<usize> for Model {
    type Output = Step;

    /// 0-based, unlike [`Model::get_step`].
    fn index(&self, index: usize) -> &Step {
        &self.steps[index]
    }
}

impl<'a> IntoIterator for &'a Model {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detail::Color;
    use crate::error::ErrorKind;
    use crate::map::Status;

    fn red() -> Color {
        Color::new("Tamiya", "X-7", "Red").unwrap()
    }

    fn wheel() -> Part {
        Part::new("wheel", [red().brush()], [Decal::new("3")])
    }

    #[test]
    fn next_step_links_previous() {
        let mut model = Model::new("buggy");
        model.next_step("frame", [Part::bare("frame")]);
        model.next_step("wheels", [wheel()]);

        assert_eq!(model.len(), 2);
        assert!(model[1].previous().unwrap().same_instance(&model[0]));
        assert!(model[0].previous().is_none());
    }

    #[test]
    fn get_step_is_one_based() {
        let mut model = Model::new("buggy");
        model.next_step("frame", [Part::bare("frame")]);
        model.next_step("wheels", [wheel()]);

        assert!(model.get_step(1).unwrap().same_instance(&model[0]));
        assert!(model.get_step("wheels").unwrap().same_instance(&model[1]));
        assert!(model.step_at(0).unwrap().same_instance(&model[0]));
        assert!(model.step_at(2).is_none());
    }

    #[test]
    fn get_step_errors_are_lookups() {
        let mut model = Model::new("buggy");
        model.next_step("frame", [Part::bare("frame")]);

        let zero = model.get_step(0).unwrap_err();
        assert_eq!(zero, TrackError::StepOutOfRange { number: 0, len: 1 });
        assert_eq!(zero.kind(), ErrorKind::Lookup);

        let past = model.get_step(2).unwrap_err();
        assert_eq!(past.kind(), ErrorKind::Lookup);

        let missing = model.get_step("paint").unwrap_err();
        assert_eq!(missing, TrackError::StepNotFound("paint".into()));
    }

    #[test]
    fn name_lookup_returns_first_match() {
        let mut model = Model::new("buggy");
        model.next_step("paint", [Part::bare("a")]);
        model.next_step("paint", [Part::bare("b")]);
        assert!(model.get_step("paint").unwrap().same_instance(&model[0]));
    }

    #[test]
    fn registries_keep_first_seen() {
        let mut model = Model::new("buggy");
        let first = wheel();
        let second = wheel();
        model.next_step("one", [&first]);
        model.next_step("two", [&second]);

        assert_eq!(model.parts().len(), 1);
        assert!(model.parts()["wheel"].same_instance(&first));
    }

    #[test]
    fn registries_cover_nested_members_and_keys() {
        let mut model = Model::new("buggy");
        let axle = Assembly::new("axle", [wheel(), wheel()]);
        model.next_step("wheels", [Member::from(&axle), Part::bare("frame").into()]);

        assert_eq!(model.assemblies().len(), 1);
        assert!(!model.assemblies()["axle"].same_instance(&axle));
        assert!(model.assemblies()["axle"].same_instance(&model[0].assemblies()[0]));
        assert_eq!(model.parts().len(), 2);
        assert!(model.parts().contains_key("frame"));

        let key = PaintKey {
            handle: "X-7".into(),
            paint_type: PaintType::Brush,
        };
        assert_eq!(model.paints()[&key], red().brush());
        assert_eq!(model.decals()["3"], Decal::new("3"));
    }

    #[test]
    fn paint_key_falls_back_to_name() {
        let gloss = Color::new("Vallejo", "", "Gloss Black").unwrap();
        let key = PaintKey::of(&gloss.spray());
        assert_eq!(key.handle, "Gloss Black");
        assert_eq!(key.to_string(), "Gloss Black (spray)");
    }

    #[test]
    fn progress_counts_shared_parts_once() {
        let mut model = Model::new("buggy");
        let body = Part::new("body", [red().spray()], []);
        model.next_step("prime", [&body]);
        model.next_step("paint", [&body, &Part::bare("seat")]);

        assert_eq!(model.progress(), Progress { done: 1, total: 2 });
        body.set_paint_status(red().spray(), Status::Done).unwrap();
        assert!(model.progress().is_complete());
    }

    #[test]
    fn iteration_follows_step_order() {
        let mut model = Model::new("buggy");
        model.next_step("a", [Part::bare("x")]);
        model.next_step("b", [Part::bare("y")]);
        let names: Vec<String> = model.iter().map(Step::name).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!((&model).into_iter().count(), 2);
    }
}
