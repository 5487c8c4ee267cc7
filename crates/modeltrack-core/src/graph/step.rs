use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::assembly::{self, Assembly, ItemRef, Lookup, Member, Progress};
use super::node::{self, Node, NodeLink, NodeRef, Shape};
use super::part::{Part, Trackable, sealed::HasNode};
use crate::detail::{Decal, Paint};
use crate::map::Status;

/// One stage of the build.
///
/// A step owns the parts and assemblies introduced at that stage and links
/// back to the step before it. Bare parts are stored as given, so the same
/// part instance can be carried through several steps. Assemblies are copied
/// on the way in: later `attach` calls on the caller's assembly (or on the
/// copy held by another step) never change what this step holds.
#[derive(Clone)]
pub struct Step {
    node: NodeRef,
}

impl Step {
    /// Create a step named `name` from `members`, following `previous`.
    ///
    /// Every member that has no owner yet is stamped with this step. Parts
    /// that already belong to an earlier step keep that owner.
    #[must_use]
    pub fn new<M: Into<Member>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = M>,
        previous: Option<&Self>,
    ) -> Self {
        let stored: Vec<NodeRef> = members
            .into_iter()
            .map(|m| match m.into() {
                Member::Part(part) => Rc::clone(part.node()),
                Member::Assembly(assembly) => node::detached_copy(assembly.node()),
            })
            .collect();
        let (paints, decals) = node::union_keys(&stored);
        let previous = previous.map(|step| Rc::clone(&step.node));

        let node = Rc::new_cyclic(|me: &NodeLink| {
            for member in &stored {
                if member.borrow().master.is_none() {
                    node::claim(member, me);
                }
            }
            RefCell::new(Node {
                id: name.into(),
                paints,
                decals,
                master: None,
                shape: Shape::Step {
                    members: Rc::new(stored),
                    previous,
                },
            })
        });

        tracing::debug!(
            step = %node.borrow().id,
            members = node.borrow().members().len(),
            "step created"
        );
        Self { node }
    }

    pub(crate) const fn from_node(node: NodeRef) -> Self {
        Self { node }
    }

    /// The step name (its id).
    #[must_use]
    pub fn name(&self) -> String {
        self.id()
    }

    /// The step this one follows, if any.
    #[must_use]
    pub fn previous(&self) -> Option<Self> {
        self.node.borrow().previous().cloned().map(Self::from_node)
    }

    /// Direct members in order, sub-assemblies included.
    #[must_use]
    pub fn parts(&self) -> Vec<Member> {
        assembly::members_of(&self.node)
    }

    /// The direct members that are assemblies (this step's copies).
    #[must_use]
    pub fn assemblies(&self) -> Vec<Assembly> {
        assembly::assemblies_of(&self.node)
    }

    /// Find members matching `item`. Sub-assemblies stamped by this step are
    /// always searched; sub-builds owned by earlier steps only when
    /// `recursive` is set.
    pub fn get<'a>(&self, item: impl Into<Lookup<'a>>, recursive: bool) -> Vec<Member> {
        assembly::get_in(&self.node, item.into(), recursive)
    }

    pub fn contains<'a>(&self, item: impl Into<ItemRef<'a>>) -> bool {
        assembly::contains_in(&self.node, item.into())
    }

    /// See [`Assembly::get_unpainted`].
    pub fn get_unpainted(&self, paint: Option<&Paint>, recursive: bool) -> Vec<Part> {
        assembly::unpainted_in(&self.node, paint, recursive)
    }

    /// See [`Assembly::get_undecaled`].
    pub fn get_undecaled(&self, recursive: bool) -> Vec<Member> {
        assembly::undecaled_in(&self.node, recursive)
    }

    pub fn mark_paint(&self, paint: &Paint, status: Status) -> usize {
        node::mark_paint(&self.node, paint, status)
    }

    pub fn mark_decal(&self, decal: &Decal, status: Status) -> usize {
        node::mark_decal(&self.node, decal, status)
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress::of(&self.node)
    }
}

impl HasNode for Step {
    fn node(&self) -> &NodeRef {
        &self.node
    }
}

impl Trackable for Step {}

impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        node::value_eq(&self.node, &other.node)
    }
}

impl Eq for Step {}

impl Hash for Step {
    fn hash<H: Hasher>(&self, state: &mut H) {
        node::hash_node(&self.node, state);
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        node::fmt_node(&self.node, f)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.node.borrow();
        f.debug_struct("Step")
            .field("name", &n.id)
            .field("members", &n.members().len())
            .field("previous", &n.previous().map(|p| p.borrow().id.clone()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detail::Color;
    use crate::error::{ErrorKind, TrackError};
    use std::hash::DefaultHasher;

    fn black() -> Paint {
        Color::new("Tamiya", "XF-1", "Flat Black").unwrap().brush()
    }

    fn wheel() -> Part {
        Part::new("wheel", [black()], [])
    }

    fn digest<T: Hash>(value: &T) -> u64 {
        let mut h = DefaultHasher::new();
        value.hash(&mut h);
        h.finish()
    }

    #[test]
    fn bare_parts_are_stamped_in_place() {
        let frame = Part::bare("frame");
        let step = Step::new("chassis", [&frame], None);
        assert!(step.parts()[0].same_instance(&frame));
        assert!(frame.master().unwrap().same_instance(&step));
    }

    #[test]
    fn assemblies_are_copied_and_stamped() {
        let left = wheel();
        let axle = Assembly::new("axle", [&left]);
        let step = Step::new("wheels", [&axle], None);

        let held = step.assemblies()[0].clone();
        assert!(!held.same_instance(&axle));
        assert_eq!(held, axle);
        assert!(held.master().unwrap().same_instance(&step));
        assert!(!axle.is_owned());
        // Members are shared, not copied.
        assert!(left.master().unwrap().same_instance(&step));
    }

    #[test]
    fn setting_master_twice_fails() {
        let step = Step::new("one", Vec::<Part>::new(), None);
        let bolt = Part::bare("bolt");
        bolt.set_master(&step).unwrap();
        assert!(bolt.master().unwrap().same_instance(&step));

        let err = bolt.set_master(&step).unwrap_err();
        assert_eq!(err, TrackError::MasterAlreadySet { id: "bolt".into() });
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn shared_part_keeps_first_owner() {
        let body = Part::bare("body");
        let first = Step::new("prime", [&body], None);
        let second = Step::new("paint", [&body], Some(&first));
        assert!(body.master().unwrap().same_instance(&first));
        assert!(second.parts()[0].same_instance(&body));
    }

    #[test]
    fn reattach_then_reclaim() {
        let s1 = Step::new("one", [Part::bare("frame")], None);
        let axle = Assembly::new("axle", [wheel()]);
        axle.set_master(&s1).unwrap();

        let hub = Part::bare("hub");
        axle.attach([&hub]).unwrap();
        assert!(!axle.is_owned());
        assert!(!hub.is_owned());

        axle.set_master(&s1).unwrap();
        assert!(axle.master().unwrap().same_instance(&s1));
        assert!(hub.master().unwrap().same_instance(&s1));

        let err = axle.set_master(&s1).unwrap_err();
        assert_eq!(err, TrackError::NothingToClaim { id: "axle".into() });
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn one_assembly_in_two_steps_stays_independent() {
        let axle = Assembly::new("axle", [wheel()]);
        let s1 = Step::new("one", [&axle], None);
        let s2 = Step::new("two", [&axle], Some(&s1));

        s1.assemblies()[0].attach([Part::bare("hub")]).unwrap();
        assert_eq!(s1.assemblies()[0].parts().len(), 2);
        assert_eq!(s2.assemblies()[0].parts().len(), 1);
        assert_eq!(axle.parts().len(), 1);

        axle.attach([Part::bare("cap"), Part::bare("nut")]).unwrap();
        assert_eq!(axle.parts().len(), 3);
        assert_eq!(s2.assemblies()[0].parts().len(), 1);
    }

    #[test]
    fn get_follows_detached_sub_builds_only_when_recursive() {
        let axle = Assembly::new("axle", [wheel()]);
        let s1 = Step::new("one", [&axle], None);
        let axle_built = s1.assemblies()[0].clone();

        let chassis = Assembly::new("chassis", [Member::from(Part::bare("frame")), axle_built.into()]);
        let s2 = Step::new("two", [&chassis], Some(&s1));

        assert_eq!(s1.get("wheel", false).len(), 1);
        assert_eq!(s2.get("frame", false).len(), 1);
        assert!(s2.get("wheel", false).is_empty());
        assert_eq!(s2.get("wheel", true).len(), 1);
        assert!(s2.contains(&chassis));
    }

    #[test]
    fn previous_links_backwards() {
        let s1 = Step::new("one", Vec::<Part>::new(), None);
        let s2 = Step::new("two", Vec::<Part>::new(), Some(&s1));
        assert!(s2.previous().unwrap().same_instance(&s1));
        assert!(s1.previous().is_none());
        assert_eq!(s2.name(), "two");
    }

    #[test]
    fn step_and_assembly_never_collide() {
        let frame = Part::bare("frame");
        let grouped = Assembly::new("chassis", [&frame]);
        let staged = Step::new("chassis", [&frame], None);
        assert_ne!(digest(&grouped), digest(&staged));

        let again = Step::new("chassis", [&frame], None);
        assert_eq!(staged, again);
        assert_eq!(digest(&staged), digest(&again));
    }

    #[test]
    fn step_completion_and_queries() {
        let left = wheel();
        let right = wheel();
        let axle = Assembly::new("axle", [&left, &right]);
        let step = Step::new("wheels", [Member::from(&axle), Part::bare("frame").into()], None);

        assert!(!step.is_painted());
        assert_eq!(step.get_unpainted(Some(&black()), false).len(), 2);
        assert_eq!(step.mark_paint(&black(), Status::Done), 2);
        assert!(step.is_complete());
        assert_eq!(step.progress(), Progress { done: 3, total: 3 });
        assert!(step.get_undecaled(false).is_empty());
    }

    #[test]
    fn display_names_the_step() {
        let step = Step::new("1", [Part::bare("hub")], None);
        assert_eq!(step.to_string(), "Step 1:\n['hub', {}, {}]");
    }
}
