//! Shared storage behind [`Part`](super::Part), [`Assembly`](super::Assembly)
//! and [`Step`](super::Step) handles.
//!
//! Every entity is one `Rc<RefCell<Node>>`. Handles are cheap clones of that
//! pointer, so a part referenced from a step, an assembly and a model registry
//! is a single instance and mutations are visible through every path.
//!
//! The entity variant is an explicit [`Kind`] carried by [`Shape`]. It is
//! folded into equality and hashing, which keeps a step and an assembly built
//! from identical content from ever comparing equal.
//!
//! Ownership (`master`) is a weak back-reference to the owning step's node.
//! A step owns its members strongly; members never keep their step alive.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::detail::{Decal, Paint};
use crate::map::{DecalMap, PaintMap, Status};

pub type NodeRef = Rc<RefCell<Node>>;
pub type NodeLink = Weak<RefCell<Node>>;

/// The entity variant of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Part,
    Assembly,
    Step,
}

impl Kind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Part => "part",
            Self::Assembly => "assembly",
            Self::Step => "step",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific data.
///
/// Member lists are `Rc<Vec<_>>` and are only ever mutated through
/// [`Rc::make_mut`]: a copy that shares the list with its source gets its own
/// list the first time either side changes.
#[derive(Debug)]
pub enum Shape {
    Part,
    Assembly {
        members: Rc<Vec<NodeRef>>,
    },
    Step {
        members: Rc<Vec<NodeRef>>,
        previous: Option<NodeRef>,
    },
}

#[derive(Debug)]
pub struct Node {
    pub(crate) id: String,
    pub(crate) paints: PaintMap,
    pub(crate) decals: DecalMap,
    pub(crate) master: Option<NodeLink>,
    pub(crate) shape: Shape,
}

impl Node {
    pub(crate) const fn part(id: String, paints: PaintMap, decals: DecalMap) -> Self {
        Self {
            id,
            paints,
            decals,
            master: None,
            shape: Shape::Part,
        }
    }

    pub(crate) const fn kind(&self) -> Kind {
        match self.shape {
            Shape::Part => Kind::Part,
            Shape::Assembly { .. } => Kind::Assembly,
            Shape::Step { .. } => Kind::Step,
        }
    }

    /// Direct members, empty for a plain part.
    pub(crate) fn members(&self) -> &[NodeRef] {
        match &self.shape {
            Shape::Part => &[],
            Shape::Assembly { members } | Shape::Step { members, .. } => members,
        }
    }

    pub(crate) const fn members_rc(&self) -> Option<&Rc<Vec<NodeRef>>> {
        match &self.shape {
            Shape::Part => None,
            Shape::Assembly { members } | Shape::Step { members, .. } => Some(members),
        }
    }

    pub(crate) const fn members_mut(&mut self) -> Option<&mut Rc<Vec<NodeRef>>> {
        match &mut self.shape {
            Shape::Part => None,
            Shape::Assembly { members } | Shape::Step { members, .. } => Some(members),
        }
    }

    pub(crate) const fn previous(&self) -> Option<&NodeRef> {
        match &self.shape {
            Shape::Step { previous, .. } => previous.as_ref(),
            _ => None,
        }
    }
}

pub fn kind(node: &NodeRef) -> Kind {
    node.borrow().kind()
}

/// Union of the members' paint and decal keys, in first-seen order, all
/// tracked as not done.
pub fn union_keys(members: &[NodeRef]) -> (PaintMap, DecalMap) {
    let mut paints = PaintMap::new();
    let mut decals = DecalMap::new();
    for member in members {
        let m = member.borrow();
        for paint in m.paints.keys() {
            paints.track(paint.clone());
        }
        for decal in m.decals.keys() {
            decals.track(decal.clone());
        }
    }
    (paints, decals)
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Plain parts read their own map; containers ask every direct member.
pub fn is_painted(node: &NodeRef) -> bool {
    let n = node.borrow();
    match n.shape {
        Shape::Part => n.paints.all_done(),
        _ => n.members().iter().all(is_painted),
    }
}

pub fn is_decaled(node: &NodeRef) -> bool {
    let n = node.borrow();
    match n.shape {
        Shape::Part => n.decals.all_done(),
        _ => n.members().iter().all(is_decaled),
    }
}

pub fn is_complete(node: &NodeRef) -> bool {
    is_painted(node) && is_decaled(node)
}

/// Every distinct plain part below `node`, depth first, each instance once.
pub fn leaf_parts(node: &NodeRef) -> Vec<NodeRef> {
    leaf_parts_of(std::slice::from_ref(node))
}

/// [`leaf_parts`] across several roots, each instance once overall.
pub fn leaf_parts_of(roots: &[NodeRef]) -> Vec<NodeRef> {
    fn walk(node: &NodeRef, seen: &mut HashSet<*const RefCell<Node>>, out: &mut Vec<NodeRef>) {
        for member in node.borrow().members() {
            if kind(member) == Kind::Part {
                if seen.insert(Rc::as_ptr(member)) {
                    out.push(Rc::clone(member));
                }
            } else {
                walk(member, seen, out);
            }
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for root in roots {
        walk(root, &mut seen, &mut out);
    }
    out
}

/// Set `paint` to `status` on every distinct part below `node` that tracks it.
pub fn mark_paint(node: &NodeRef, paint: &Paint, status: Status) -> usize {
    leaf_parts(node)
        .iter()
        .filter(|part| part.borrow_mut().paints.update(paint, status))
        .count()
}

pub fn mark_decal(node: &NodeRef, decal: &Decal, status: Status) -> usize {
    leaf_parts(node)
        .iter()
        .filter(|part| part.borrow_mut().decals.update(decal, status))
        .count()
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

/// Stamp `owner` on `node` if it is unowned, then on every direct member
/// that is still unowned (recursively through their own members).
///
/// Members that already have an owner are left alone, including their
/// descendants. Returns `true` if anything was stamped.
pub fn claim(node: &NodeRef, owner: &NodeLink) -> bool {
    let (mut changed, members) = {
        let mut n = node.borrow_mut();
        let changed = if n.master.is_none() {
            n.master = Some(Weak::clone(owner));
            true
        } else {
            false
        };
        (changed, n.members_rc().map(Rc::clone))
    };

    if let Some(members) = members {
        for member in members.iter() {
            if member.borrow().master.is_none() {
                changed |= claim(member, owner);
            }
        }
    }
    changed
}

/// The step a node's members must share to count as co-owned.
///
/// A step is its own scope; anything else is scoped by its owner.
pub fn scope(node: &NodeRef) -> Option<NodeLink> {
    let n = node.borrow();
    match n.shape {
        Shape::Step { .. } => Some(Rc::downgrade(node)),
        _ => n.master.clone(),
    }
}

pub fn same_owner(a: Option<&NodeLink>, b: Option<&NodeLink>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Weak::ptr_eq(a, b),
        _ => false,
    }
}

/// Returns `true` if `target` is `from` or appears anywhere below it.
pub fn reaches(from: &NodeRef, target: &NodeRef) -> bool {
    Rc::ptr_eq(from, target) || from.borrow().members().iter().any(|m| reaches(m, target))
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// What [`find`] matches members against.
pub enum Probe<'a> {
    Id(&'a str),
    Node(&'a NodeRef),
}

impl Probe<'_> {
    fn matches(&self, candidate: &NodeRef) -> bool {
        match self {
            Self::Id(id) => candidate.borrow().id == *id,
            Self::Node(node) => value_eq(candidate, node),
        }
    }
}

/// Direct members matching `probe`, plus matches inside sub-assemblies.
///
/// Sub-assemblies in the same ownership scope as `node` are always searched.
/// Sub-assemblies owned elsewhere (detached sub-builds) are searched only
/// when `recursive` is set.
pub fn find(node: &NodeRef, probe: &Probe<'_>, recursive: bool) -> Vec<NodeRef> {
    let owner_scope = scope(node);
    let n = node.borrow();

    let mut found: Vec<NodeRef> = n
        .members()
        .iter()
        .filter(|m| probe.matches(m))
        .map(Rc::clone)
        .collect();

    for sub in n.members().iter().filter(|m| kind(m) == Kind::Assembly) {
        let co_owned = same_owner(sub.borrow().master.as_ref(), owner_scope.as_ref());
        if co_owned || recursive {
            found.extend(find(sub, probe, recursive));
        }
    }
    found
}

/// Direct plain parts whose status for `paint` is exactly not done, followed by
/// the same search inside every sub-assembly.
///
/// With no paint given, no part qualifies: parts only track concrete paints.
pub fn unpainted(node: &NodeRef, paint: Option<&Paint>) -> Vec<NodeRef> {
    let n = node.borrow();
    let mut out = Vec::new();

    for member in n.members() {
        let m = member.borrow();
        if m.kind() != Kind::Part {
            continue;
        }
        if paint.is_some_and(|paint| m.paints.get(paint) == Some(Status::NotDone)) {
            out.push(Rc::clone(member));
        }
    }

    for sub in n.members().iter().filter(|m| kind(m) == Kind::Assembly) {
        out.extend(unpainted(sub, paint));
    }
    out
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Value equality: kind, id, paint/decal key sets and, for containers, the
/// ordered members. Statuses, owners and `previous` do not take part.
pub fn value_eq(a: &NodeRef, b: &NodeRef) -> bool {
    if Rc::ptr_eq(a, b) {
        return true;
    }
    let (a, b) = (a.borrow(), b.borrow());
    a.kind() == b.kind()
        && a.id == b.id
        && a.paints.same_keys(&b.paints)
        && a.decals.same_keys(&b.decals)
        && a.members().len() == b.members().len()
        && a
            .members()
            .iter()
            .zip(b.members())
            .all(|(x, y)| value_eq(x, y))
}

/// Hash consistent with [`value_eq`].
pub fn hash_node<H: Hasher>(node: &NodeRef, state: &mut H) {
    let n = node.borrow();
    n.kind().hash(state);
    n.id.hash(state);
    n.paints.hash(state);
    n.decals.hash(state);
    if n.kind() != Kind::Part {
        n.members().len().hash(state);
        for member in n.members() {
            hash_node(member, state);
        }
    }
}

// ---------------------------------------------------------------------------
// Copies
// ---------------------------------------------------------------------------

/// A new, unowned assembly node with the same id and statuses, sharing the
/// member list copy-on-write.
pub fn detached_copy(node: &NodeRef) -> NodeRef {
    let n = node.borrow();
    let members = n.members_rc().map_or_else(|| Rc::new(Vec::new()), Rc::clone);
    Rc::new(RefCell::new(Node {
        id: n.id.clone(),
        paints: n.paints.clone(),
        decals: n.decals.clone(),
        master: None,
        shape: Shape::Assembly { members },
    }))
}

/// Clone `node` and everything below it.
///
/// Instances shared inside the copied subtree stay shared in the copy.
/// Owner links and a step's `previous` link are carried over as-is, pointing
/// at the same steps as the source.
pub fn deep_copy(node: &NodeRef) -> NodeRef {
    fn copy(node: &NodeRef, memo: &mut HashMap<*const RefCell<Node>, NodeRef>) -> NodeRef {
        if let Some(done) = memo.get(&Rc::as_ptr(node)) {
            return Rc::clone(done);
        }

        let n = node.borrow();
        let shape = match &n.shape {
            Shape::Part => Shape::Part,
            Shape::Assembly { members } => Shape::Assembly {
                members: Rc::new(members.iter().map(|m| copy(m, memo)).collect()),
            },
            Shape::Step { members, previous } => Shape::Step {
                members: Rc::new(members.iter().map(|m| copy(m, memo)).collect()),
                previous: previous.clone(),
            },
        };

        let cloned = Rc::new(RefCell::new(Node {
            id: n.id.clone(),
            paints: n.paints.clone(),
            decals: n.decals.clone(),
            master: n.master.clone(),
            shape,
        }));
        memo.insert(Rc::as_ptr(node), Rc::clone(&cloned));
        cloned
    }

    copy(node, &mut HashMap::new())
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

pub fn fmt_node(node: &NodeRef, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let n = node.borrow();
    match n.shape {
        Shape::Part => write!(f, "'{}', {}, {}", n.id, n.paints, n.decals),
        Shape::Assembly { .. } => {
            write!(f, "'{}' :", n.id)?;
            fmt_members(&n, f)
        }
        Shape::Step { .. } => {
            write!(f, "Step {}:", n.id)?;
            fmt_members(&n, f)
        }
    }
}

fn fmt_members(n: &Node, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for member in n.members() {
        f.write_str("\n[")?;
        fmt_node(member, f)?;
        f.write_str("]")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detail::Color;
    use std::hash::DefaultHasher;

    fn red() -> Paint {
        Color::new("Tamiya", "X-7", "Red").unwrap().spray()
    }

    fn part(id: &str, paints: &[Paint]) -> NodeRef {
        Rc::new(RefCell::new(Node::part(
            id.to_string(),
            PaintMap::not_done(paints.iter().cloned()),
            DecalMap::new(),
        )))
    }

    fn assembly(id: &str, members: Vec<NodeRef>) -> NodeRef {
        let (paints, decals) = union_keys(&members);
        Rc::new(RefCell::new(Node {
            id: id.to_string(),
            paints,
            decals,
            master: None,
            shape: Shape::Assembly {
                members: Rc::new(members),
            },
        }))
    }

    fn digest(node: &NodeRef) -> u64 {
        let mut h = DefaultHasher::new();
        hash_node(node, &mut h);
        h.finish()
    }

    #[test]
    fn part_and_assembly_never_equal() {
        let plain = part("hood", &[]);
        let grouped = assembly("hood", vec![]);
        assert!(!value_eq(&plain, &grouped));
        assert_ne!(digest(&plain), digest(&grouped));
    }

    #[test]
    fn equality_ignores_status_and_owner() {
        let a = part("hood", &[red()]);
        let b = part("hood", &[red()]);
        b.borrow_mut().paints.update(&red(), Status::Done);
        b.borrow_mut().master = Some(Weak::new());
        assert!(value_eq(&a, &b));
        assert_eq!(digest(&a), digest(&b));
    }

    #[test]
    fn deep_copy_preserves_internal_sharing() {
        let shared = part("wheel", &[red()]);
        let inner = assembly("axle", vec![Rc::clone(&shared)]);
        let outer = assembly("chassis", vec![Rc::clone(&shared), inner]);

        let copied = deep_copy(&outer);
        assert!(value_eq(&copied, &outer));
        assert!(!Rc::ptr_eq(&copied, &outer));

        let c = copied.borrow();
        let direct = &c.members()[0];
        let nested = Rc::clone(&c.members()[1].borrow().members()[0]);
        assert!(Rc::ptr_eq(direct, &nested));
        assert!(!Rc::ptr_eq(direct, &shared));
    }

    #[test]
    fn detached_copy_shares_members_until_written() {
        let source = assembly("door", vec![part("handle", &[])]);
        let copy = detached_copy(&source);
        {
            let (s, c) = (source.borrow(), copy.borrow());
            assert!(Rc::ptr_eq(
                s.members_rc().unwrap(),
                c.members_rc().unwrap()
            ));
        }

        let extra = part("glass", &[]);
        Rc::make_mut(source.borrow_mut().members_mut().unwrap()).push(extra);
        assert_eq!(source.borrow().members().len(), 2);
        assert_eq!(copy.borrow().members().len(), 1);
    }

    #[test]
    fn reaches_detects_nesting() {
        let leaf = part("bolt", &[]);
        let mid = assembly("bracket", vec![Rc::clone(&leaf)]);
        let top = assembly("frame", vec![Rc::clone(&mid)]);
        assert!(reaches(&top, &leaf));
        assert!(reaches(&top, &top));
        assert!(!reaches(&leaf, &top));
    }
}
