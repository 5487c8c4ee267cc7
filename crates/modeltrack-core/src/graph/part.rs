use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::node::{self, Kind, Node, NodeRef};
use super::step::Step;
use crate::detail::{Decal, Paint};
use crate::error::TrackError;
use crate::map::{DecalMap, IntoStatusKey, PaintMap, Status};

pub(crate) mod sealed {
    use super::NodeRef;

    pub trait HasNode {
        fn node(&self) -> &NodeRef;
    }
}

use sealed::HasNode;

/// Read-only queries shared by every entity in the build graph.
///
/// Implemented by [`Part`], [`Assembly`](super::Assembly),
/// [`Step`](super::Step) and [`Member`](super::Member).
pub trait Trackable: HasNode {
    /// The identifier (a step's name).
    fn id(&self) -> String {
        self.node().borrow().id.clone()
    }

    /// Which variant this entity is.
    fn kind(&self) -> Kind {
        node::kind(self.node())
    }

    /// Status of `paint`, or `None` if this entity does not track it.
    fn check_paint(&self, paint: &Paint) -> Option<Status> {
        self.node().borrow().paints.get(paint)
    }

    /// Status of `decal`, or `None` if this entity does not track it.
    fn check_decal(&self, decal: &Decal) -> Option<Status> {
        self.node().borrow().decals.get(decal)
    }

    fn contains_paint(&self, paint: &Paint) -> bool {
        self.node().borrow().paints.contains(paint)
    }

    fn contains_decal(&self, decal: &Decal) -> bool {
        self.node().borrow().decals.contains(decal)
    }

    /// Snapshot of the paint map.
    ///
    /// For containers the map is the union of member keys and its statuses are
    /// not maintained; use [`is_painted`](Self::is_painted) for completion.
    fn paints(&self) -> PaintMap {
        self.node().borrow().paints.clone()
    }

    /// Snapshot of the decal map. See [`paints`](Self::paints).
    fn decals(&self) -> DecalMap {
        self.node().borrow().decals.clone()
    }

    /// `true` if every paint is done. Containers ask each direct member.
    fn is_painted(&self) -> bool {
        node::is_painted(self.node())
    }

    /// `true` if every decal is applied. Containers ask each direct member.
    fn is_decaled(&self) -> bool {
        node::is_decaled(self.node())
    }

    fn is_complete(&self) -> bool {
        node::is_complete(self.node())
    }

    /// The owning step, if one is set and still alive.
    fn master(&self) -> Option<Step> {
        self.node()
            .borrow()
            .master
            .as_ref()
            .and_then(std::rc::Weak::upgrade)
            .map(Step::from_node)
    }

    /// `true` once an owning step has been stamped, even if that step has
    /// since been dropped.
    fn is_owned(&self) -> bool {
        self.node().borrow().master.is_some()
    }

    /// `true` if both handles point at the same instance.
    fn same_instance(&self, other: &impl Trackable) -> bool {
        Rc::ptr_eq(self.node(), other.node())
    }
}

/// The smallest trackable piece of a kit.
///
/// Cloning a `Part` clones the handle: both clones are the same instance.
/// Use [`copy`](Self::copy) for an independent part.
#[derive(Clone)]
pub struct Part {
    node: NodeRef,
}

impl Part {
    /// Create a part requiring `paints` and `decals`, all not done.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        paints: impl IntoIterator<Item = Paint>,
        decals: impl IntoIterator<Item = Decal>,
    ) -> Self {
        Self::from_node(Rc::new(RefCell::new(Node::part(
            id.into(),
            PaintMap::not_done(paints),
            DecalMap::not_done(decals),
        ))))
    }

    /// A part with no paint or decal requirements.
    #[must_use]
    pub fn bare(id: impl Into<String>) -> Self {
        Self::new(id, [], [])
    }

    pub(crate) const fn from_node(node: NodeRef) -> Self {
        Self { node }
    }

    /// Set the owning step.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::MasterAlreadySet`] if an owner is already set.
    pub fn set_master(&self, step: &Step) -> Result<(), TrackError> {
        let mut n = self.node.borrow_mut();
        if n.master.is_some() {
            return Err(TrackError::MasterAlreadySet { id: n.id.clone() });
        }
        n.master = Some(Rc::downgrade(step.node()));
        Ok(())
    }

    /// Set a paint status, tracking the paint if it is new to this part.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::ConfusableKey`] when given a `Color`.
    pub fn set_paint_status(
        &self,
        paint: impl IntoStatusKey<Paint>,
        status: Status,
    ) -> Result<(), TrackError> {
        self.node.borrow_mut().paints.set(paint, status)
    }

    /// Set a decal status, tracking the decal if it is new to this part.
    ///
    /// # Errors
    ///
    /// Propagates key conversion errors from [`IntoStatusKey`].
    pub fn set_decal_status(
        &self,
        decal: impl IntoStatusKey<Decal>,
        status: Status,
    ) -> Result<(), TrackError> {
        self.node.borrow_mut().decals.set(decal, status)
    }

    /// An independent clone of this part.
    ///
    /// The clone keeps the original's owner link.
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

impl HasNode for Part {
    fn node(&self) -> &NodeRef {
        &self.node
    }
}

impl Trackable for Part {}

impl PartialEq for Part {
    fn eq(&self, other: &Self) -> bool {
        node::value_eq(&self.node, &other.node)
    }
}

impl Eq for Part {}

impl Hash for Part {
    fn hash<H: Hasher>(&self, state: &mut H) {
        node::hash_node(&self.node, state);
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        node::fmt_node(&self.node, f)
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.node.borrow();
        f.debug_struct("Part")
            .field("id", &n.id)
            .field("paints", &n.paints)
            .field("decals", &n.decals)
            .field("owned", &n.master.is_some())
            .finish()
    }
}
