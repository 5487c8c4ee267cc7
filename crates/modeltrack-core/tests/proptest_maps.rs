use modeltrack_core::map::IdentityKeyedMap;
use modeltrack_core::{ErrorKind, PaintMap, Part, Status, Trackable};
use proptest::prelude::*;
use std::hash::{DefaultHasher, Hash, Hasher};

use generators::*;

fn digest<T: Hash>(value: &T) -> u64 {
    let mut h = DefaultHasher::new();
    value.hash(&mut h);
    h.finish()
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn status_map_hash_ignores_insertion_order((paints, shuffled) in arb_paints_and_shuffle()) {
        let a = PaintMap::not_done(paints);
        let b = PaintMap::not_done(shuffled);
        prop_assert_eq!(digest(&a), digest(&b));
    }

    #[test]
    fn status_map_hash_ignores_statuses(
        (paints, shuffled) in arb_paints_and_shuffle(),
        status in arb_status(),
    ) {
        let a = PaintMap::not_done(paints);
        let b: PaintMap = shuffled.into_iter().map(|p| (p, status)).collect();
        prop_assert_eq!(digest(&a), digest(&b));
    }

    #[test]
    fn status_map_hash_tracks_key_set(
        (paints, _) in arb_paints_and_shuffle(),
        extra in arb_paint(),
    ) {
        prop_assume!(!paints.contains(&extra));
        let base = PaintMap::not_done(paints.clone());
        let grown = PaintMap::not_done(paints.into_iter().chain([extra]));
        prop_assert_ne!(digest(&base), digest(&grown));
    }

    #[test]
    fn keyed_map_equality_ignores_order((paints, shuffled) in arb_paints_and_shuffle()) {
        let a: IdentityKeyedMap<_, usize> = paints.iter().cloned().map(|p| (p, 1)).collect();
        let b: IdentityKeyedMap<_, usize> = shuffled.into_iter().map(|p| (p, 1)).collect();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(digest(&a), digest(&b));
    }

    #[test]
    fn color_is_never_a_paint_key(color in arb_color(), status in arb_status()) {
        let mut map = PaintMap::new();
        let err = map.set(&color, status).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Type);
        prop_assert!(map.is_empty());
    }

    #[test]
    fn part_is_painted_iff_all_done(
        paints in prop::collection::hash_set(arb_paint(), 0..6),
        statuses in prop::collection::vec(arb_status(), 6),
    ) {
        let part = Part::new("piece", paints.iter().cloned(), []);
        for (paint, status) in paints.iter().zip(&statuses) {
            part.set_paint_status(paint, *status).unwrap();
        }
        let expected = statuses.iter().take(paints.len()).all(|s| *s == Status::Done);
        prop_assert_eq!(part.is_painted(), expected);
    }

    #[test]
    fn part_identity_ignores_statuses(
        paints in prop::collection::hash_set(arb_paint(), 0..6),
        status in arb_status(),
    ) {
        let a = Part::new("piece", paints.iter().cloned(), []);
        let b = Part::new("piece", paints.iter().cloned(), []);
        for paint in &paints {
            b.set_paint_status(paint, status).unwrap();
        }
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(digest(&a), digest(&b));
    }
}
