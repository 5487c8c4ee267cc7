use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::node::{self, Kind, Node, NodeRef, Probe, Shape};
use super::part::{Part, Trackable, sealed::HasNode};
use super::step::Step;
use crate::detail::{Decal, Paint};
use crate::error::TrackError;
use crate::map::Status;

/// A member of an assembly or step: a plain part or a sub-assembly.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Member {
    Part(Part),
    Assembly(Assembly),
}

impl Member {
    pub(crate) fn from_node(node: NodeRef) -> Self {
        if node::kind(&node) == Kind::Part {
            Self::Part(Part::from_node(node))
        } else {
            Self::Assembly(Assembly::from_node(node))
        }
    }

    pub(crate) fn into_node(self) -> NodeRef {
        match self {
            Self::Part(p) => Rc::clone(p.node()),
            Self::Assembly(a) => a.node,
        }
    }

    #[must_use]
    pub const fn as_part(&self) -> Option<&Part> {
        match self {
            Self::Part(p) => Some(p),
            Self::Assembly(_) => None,
        }
    }

    #[must_use]
    pub const fn as_assembly(&self) -> Option<&Assembly> {
        match self {
            Self::Assembly(a) => Some(a),
            Self::Part(_) => None,
        }
    }

    /// Set the owning step, with the semantics of the underlying variant.
    ///
    /// # Errors
    ///
    /// See [`Part::set_master`] and [`Assembly::set_master`].
    pub fn set_master(&self, step: &Step) -> Result<(), TrackError> {
        match self {
            Self::Part(p) => p.set_master(step),
            Self::Assembly(a) => a.set_master(step),
        }
    }
}

impl HasNode for Member {
    fn node(&self) -> &NodeRef {
        match self {
            Self::Part(p) => p.node(),
            Self::Assembly(a) => &a.node,
        }
    }
}

impl Trackable for Member {}

impl From<Part> for Member {
    fn from(part: Part) -> Self {
        Self::Part(part)
    }
}

impl From<&Part> for Member {
    fn from(part: &Part) -> Self {
        Self::Part(part.clone())
    }
}

impl From<Assembly> for Member {
    fn from(assembly: Assembly) -> Self {
        Self::Assembly(assembly)
    }
}

impl From<&Assembly> for Member {
    fn from(assembly: &Assembly) -> Self {
        Self::Assembly(assembly.clone())
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        node::fmt_node(self.node(), f)
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Part(p) => fmt::Debug::fmt(p, f),
            Self::Assembly(a) => fmt::Debug::fmt(a, f),
        }
    }
}

/// A part or assembly to test for membership.
#[derive(Clone, Copy)]
pub enum ItemRef<'a> {
    Part(&'a Part),
    Assembly(&'a Assembly),
}

impl ItemRef<'_> {
    fn node(&self) -> &NodeRef {
        match self {
            Self::Part(p) => p.node(),
            Self::Assembly(a) => &a.node,
        }
    }
}

impl<'a> From<&'a Part> for ItemRef<'a> {
    fn from(part: &'a Part) -> Self {
        Self::Part(part)
    }
}

impl<'a> From<&'a Assembly> for ItemRef<'a> {
    fn from(assembly: &'a Assembly) -> Self {
        Self::Assembly(assembly)
    }
}

impl<'a> From<&'a Member> for ItemRef<'a> {
    fn from(member: &'a Member) -> Self {
        match member {
            Member::Part(p) => Self::Part(p),
            Member::Assembly(a) => Self::Assembly(a),
        }
    }
}

/// What [`Assembly::get`] searches for: an id, or a part/assembly by value.
#[derive(Clone, Copy)]
pub enum Lookup<'a> {
    Id(&'a str),
    Item(ItemRef<'a>),
}

impl<'a> Lookup<'a> {
    fn probe(self) -> Probe<'a> {
        match self {
            Self::Id(id) => Probe::Id(id),
            Self::Item(ItemRef::Part(p)) => Probe::Node(p.node()),
            Self::Item(ItemRef::Assembly(a)) => Probe::Node(&a.node),
        }
    }
}

impl<'a> From<&'a str> for Lookup<'a> {
    fn from(id: &'a str) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a String> for Lookup<'a> {
    fn from(id: &'a String) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a Part> for Lookup<'a> {
    fn from(part: &'a Part) -> Self {
        Self::Item(ItemRef::Part(part))
    }
}

impl<'a> From<&'a Assembly> for Lookup<'a> {
    fn from(assembly: &'a Assembly) -> Self {
        Self::Item(ItemRef::Assembly(assembly))
    }
}

impl<'a> From<&'a Member> for Lookup<'a> {
    fn from(member: &'a Member) -> Self {
        Self::Item(member.into())
    }
}

/// Completion of the distinct plain parts below an assembly or step.
///
/// A part counts as done when it is fully painted and decaled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    /// Percentage of parts completed, in the range `0.0..=100.0`.
    ///
    /// Returns `100.0` if total is 0 (vacuously complete).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.done as f64 / self.total as f64) * 100.0
    }

    /// Returns `true` if all parts are done (or there are none).
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.total == 0 || self.done == self.total
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.total.saturating_sub(self.done)
    }

    pub(crate) fn of(node: &NodeRef) -> Self {
        Self::across(std::slice::from_ref(node))
    }

    /// Counts each part instance once even when several roots share it.
    pub(crate) fn across(roots: &[NodeRef]) -> Self {
        let parts = node::leaf_parts_of(roots);
        Self {
            done: parts.iter().filter(|p| node::is_complete(p)).count(),
            total: parts.len(),
        }
    }
}

impl std::ops::Add for Progress {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            done: self.done + rhs.done,
            total: self.total + rhs.total,
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.0}%)",
            self.done,
            self.total,
            self.percent_complete()
        )
    }
}

/// A named group of parts and sub-assemblies.
///
/// Completion is always derived from the members. The assembly's own paint
/// and decal maps hold the union of its members' keys and answer membership
/// questions only.
#[derive(Clone)]
pub struct Assembly {
    node: NodeRef,
}

impl Assembly {
    /// Group `members` under `id`.
    #[must_use]
    pub fn new<M: Into<Member>>(id: impl Into<String>, members: impl IntoIterator<Item = M>) -> Self {
        let members: Vec<NodeRef> = members
            .into_iter()
            .map(|m| Member::into_node(m.into()))
            .collect();
        let (paints, decals) = node::union_keys(&members);

        Self::from_node(Rc::new(RefCell::new(Node {
            id: id.into(),
            paints,
            decals,
            master: None,
            shape: Shape::Assembly {
                members: Rc::new(members),
            },
        })))
    }

    pub(crate) const fn from_node(node: NodeRef) -> Self {
        Self { node }
    }

    /// Direct members in order, sub-assemblies included.
    #[must_use]
    pub fn parts(&self) -> Vec<Member> {
        members_of(&self.node)
    }

    /// The direct members that are themselves assemblies.
    #[must_use]
    pub fn assemblies(&self) -> Vec<Self> {
        assemblies_of(&self.node)
    }

    /// Find members matching `item` by id or by value.
    ///
    /// Sub-assemblies owned by the same step as this assembly are always
    /// searched. Sub-assemblies owned elsewhere are searched only when
    /// `recursive` is set.
    pub fn get<'a>(&self, item: impl Into<Lookup<'a>>, recursive: bool) -> Vec<Member> {
        get_in(&self.node, item.into(), recursive)
    }

    /// `true` if [`get`](Self::get) finds `item` without forced recursion.
    pub fn contains<'a>(&self, item: impl Into<ItemRef<'a>>) -> bool {
        contains_in(&self.node, item.into())
    }

    /// Add members to the assembly.
    ///
    /// Clears the owning step: the grown assembly is no longer fully owned
    /// until it is claimed again. The member list is replaced rather than
    /// extended in place, so copies that shared the previous list keep it.
    /// New paint and decal keys are tracked as not done; existing keys keep
    /// their status.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::Cycle`] if a new member is this assembly or
    /// contains it.
    pub fn attach<M: Into<Member>>(
        &self,
        members: impl IntoIterator<Item = M>,
    ) -> Result<(), TrackError> {
        let added: Vec<NodeRef> = members
            .into_iter()
            .map(|m| Member::into_node(m.into()))
            .collect();

        if added.iter().any(|m| node::reaches(m, &self.node)) {
            return Err(TrackError::Cycle { id: self.id() });
        }

        let (paints, decals) = node::union_keys(&added);
        let count = added.len();

        let mut n = self.node.borrow_mut();
        n.master = None;
        if let Some(list) = n.members_mut() {
            Rc::make_mut(list).extend(added);
        }
        for paint in paints.keys() {
            n.paints.track(paint.clone());
        }
        for decal in decals.keys() {
            n.decals.track(decal.clone());
        }

        tracing::debug!(assembly = %n.id, added = count, "attached members; owner cleared");
        Ok(())
    }

    /// Claim this assembly and its unowned members for `step`.
    ///
    /// Sets the owner on the assembly if unset, then on every direct member
    /// that is still unowned. Members that already belong to a step are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::NothingToClaim`] if nothing was unowned.
    pub fn set_master(&self, step: &Step) -> Result<(), TrackError> {
        if node::claim(&self.node, &Rc::downgrade(step.node())) {
            Ok(())
        } else {
            Err(TrackError::NothingToClaim { id: self.id() })
        }
    }

    /// Plain parts whose status for `paint` is not done, searching every
    /// sub-assembly.
    ///
    /// With `paint = None` nothing matches, since no part tracks an
    /// unspecified paint.
    /// `recursive` is accepted for symmetry with [`get`](Self::get);
    /// sub-assemblies are searched either way.
    pub fn get_unpainted(&self, paint: Option<&Paint>, recursive: bool) -> Vec<Part> {
        unpainted_in(&self.node, paint, recursive)
    }

    /// Direct members that are not fully decaled, followed by every
    /// sub-assembly itself when `recursive` is set.
    pub fn get_undecaled(&self, recursive: bool) -> Vec<Member> {
        undecaled_in(&self.node, recursive)
    }

    /// Set `paint` on every distinct part below this assembly that tracks it.
    /// Returns how many parts were updated.
    pub fn mark_paint(&self, paint: &Paint, status: Status) -> usize {
        node::mark_paint(&self.node, paint, status)
    }

    /// Set `decal` on every distinct part below this assembly that tracks it.
    pub fn mark_decal(&self, decal: &Decal, status: Status) -> usize {
        node::mark_decal(&self.node, decal, status)
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress::of(&self.node)
    }

    /// An independent clone of this assembly and everything below it.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self::from_node(node::deep_copy(&self.node))
    }

    /// `count` independent clones.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::InvalidCopyCount`] if `count` is zero.
    pub fn copies(&self, count: usize) -> Result<Vec<Self>, TrackError> {
        if count == 0 {
            return Err(TrackError::InvalidCopyCount(count));
        }
        Ok((0..count).map(|_| self.copy()).collect())
    }
}

// Container operations shared with `Step`.

pub(crate) fn members_of(node: &NodeRef) -> Vec<Member> {
    node.borrow()
        .members()
        .iter()
        .cloned()
        .map(Member::from_node)
        .collect()
}

pub(crate) fn assemblies_of(node: &NodeRef) -> Vec<Assembly> {
    node.borrow()
        .members()
        .iter()
        .filter(|m| node::kind(m) == Kind::Assembly)
        .cloned()
        .map(Assembly::from_node)
        .collect()
}

pub(crate) fn get_in(node: &NodeRef, item: Lookup<'_>, recursive: bool) -> Vec<Member> {
    node::find(node, &item.probe(), recursive)
        .into_iter()
        .map(Member::from_node)
        .collect()
}

pub(crate) fn contains_in(node: &NodeRef, item: ItemRef<'_>) -> bool {
    !node::find(node, &Probe::Node(item.node()), false).is_empty()
}

pub(crate) fn unpainted_in(node: &NodeRef, paint: Option<&Paint>, _recursive: bool) -> Vec<Part> {
    node::unpainted(node, paint)
        .into_iter()
        .map(Part::from_node)
        .collect()
}

pub(crate) fn undecaled_in(node: &NodeRef, recursive: bool) -> Vec<Member> {
    let members = node.borrow().members().to_vec();
    let mut out: Vec<Member> = members
        .iter()
        .filter(|m| !node::is_decaled(m))
        .cloned()
        .map(Member::from_node)
        .collect();

    if recursive {
        out.extend(
            members
                .into_iter()
                .filter(|m| node::kind(m) == Kind::Assembly)
                .map(Member::from_node),
        );
    }
    out
}

impl HasNode for Assembly {
    fn node(&self) -> &NodeRef {
        &self.node
    }
}

impl Trackable for Assembly {}

impl PartialEq for Assembly {
    fn eq(&self, other: &Self) -> bool {
        node::value_eq(&self.node, &other.node)
    }
}

impl Eq for Assembly {}

impl Hash for Assembly {
    fn hash<H: Hasher>(&self, state: &mut H) {
        node::hash_node(&self.node, state);
    }
}

impl fmt::Display for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        node::fmt_node(&self.node, f)
    }
}

impl fmt::Debug for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.node.borrow();
        f.debug_struct("Assembly")
            .field("id", &n.id)
            .field("members", &n.members().len())
            .field("owned", &n.master.is_some())
            .finish()
    }
}
