use amr_transfer::adapt::{INDICATOR_SENTINEL, build_restriction_map, compute_indicators, mark_cells};
use amr_transfer::prelude::*;
use hashbrown::HashSet;
use proptest::prelude::*;

mod util;
use util::*;

fn leaf_pairs(forest: &QuadForest) -> HashSet<(PersistentId, PersistentId)> {
    let mut pairs = HashSet::new();
    for leaf in forest.leaves() {
        for intersection in forest.intersections(leaf).unwrap() {
            if let Some(neighbor) = intersection.neighbor {
                if forest.is_leaf(neighbor).unwrap() {
                    pairs.insert((leaf.min(neighbor), leaf.max(neighbor)));
                }
            }
        }
    }
    pairs
}

fn refine_marked(forest: &QuadForest) -> Vec<PersistentId> {
    forest
        .leaves()
        .into_iter()
        .filter(|&l| forest.mark_of(l).unwrap() == Mark::Refine)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn indicator_is_the_largest_jump_to_any_leaf_neighbour(
        nx in 1u32..4, ny in 1u32..4, rounds in 0u8..3, seed in any::<u64>()
    ) {
        let forest = random_quad_forest([nx, ny], rounds, seed);
        let mapper = LeafIndexMapper::new(&forest).unwrap();
        let field = random_field(forest.leaf_count(), seed ^ 0x9e37);
        let ind = compute_indicators(&forest, &mapper, &field).unwrap();

        for leaf in forest.leaves() {
            let i = mapper.map(&forest, leaf).unwrap().get();
            let mut expected = INDICATOR_SENTINEL;
            for intersection in forest.intersections(leaf).unwrap() {
                let Some(neighbor) = intersection.neighbor else { continue };
                let j = mapper.map(&forest, neighbor).unwrap().get();
                expected = expected.max((field[i] - field[j]).abs());
            }
            prop_assert_eq!(ind.values[i], expected, "leaf {}", leaf);
        }
    }

    #[test]
    fn every_leaf_face_is_visited_once(
        nx in 1u32..4, ny in 1u32..4, rounds in 0u8..3, seed in any::<u64>()
    ) {
        let forest = random_quad_forest([nx, ny], rounds, seed);
        let mapper = LeafIndexMapper::new(&forest).unwrap();
        let field = random_field(forest.leaf_count(), seed);
        let ind = compute_indicators(&forest, &mapper, &field).unwrap();
        prop_assert_eq!(ind.face_visits, leaf_pairs(&forest).len());
    }

    #[test]
    fn raising_refine_tol_never_adds_refinement(
        rounds in 0u8..3, seed in any::<u64>(), low in 0.01f64..0.5, step in 0.0f64..0.5
    ) {
        let forest = random_quad_forest([3, 2], rounds, seed);
        let mapper = LeafIndexMapper::new(&forest).unwrap();
        let field = random_field(forest.leaf_count(), seed.rotate_left(7));
        let ind = compute_indicators(&forest, &mapper, &field).unwrap();

        let marked_with = |refine_tol: f64| {
            let mut copy = forest.clone();
            let options = AdaptOptions {
                refine_tol,
                coarsen_tol: 0.001,
                ..AdaptOptions::with_levels(0, 3)
            };
            mark_cells(&mut copy, &mapper, &ind, &options).unwrap();
            refine_marked(&copy).into_iter().collect::<HashSet<_>>()
        };
        let loose = marked_with(low);
        let strict = marked_with(low + step);
        prop_assert!(strict.is_subset(&loose));
    }

    #[test]
    fn uniform_leaves_restrict_to_the_same_value(
        nx in 1u32..4, ny in 1u32..4, rounds in 0u8..4, seed in any::<u64>(), v in -50i32..50
    ) {
        let forest = random_quad_forest([nx, ny], rounds, seed);
        let mapper = LeafIndexMapper::new(&forest).unwrap();
        let field = vec![f64::from(v); forest.leaf_count()];
        let map = build_restriction_map(&forest, &mapper, &field).unwrap();

        prop_assert_eq!(map.len(), forest.node_count());
        for (_, restricted) in map.iter() {
            prop_assert!(restricted.count >= 1);
            prop_assert_eq!(restricted.average(), f64::from(v));
        }
    }

    #[test]
    fn adapted_field_covers_every_leaf_within_old_bounds(
        nx in 1u32..4, ny in 1u32..4, rounds in 0u8..3, seed in any::<u64>()
    ) {
        let mut forest = random_quad_forest([nx, ny], rounds, seed);
        let mut mapper = LeafIndexMapper::new(&forest).unwrap();
        let mut field = random_field(forest.leaf_count(), seed.wrapping_mul(31));
        let lo = field.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = field.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        adapt_step(&mut forest, &mut mapper, &mut field, 0, 3).unwrap();

        prop_assert_eq!(field.len(), forest.leaf_count());
        prop_assert_eq!(mapper.ordered(), forest.leaves());
        prop_assert_eq!(forest.phase(), AdaptPhase::Idle);
        for value in &field {
            prop_assert!(*value >= lo - 1e-9 && *value <= hi + 1e-9, "{} outside [{}, {}]", value, lo, hi);
        }
    }

    #[test]
    fn uniform_field_never_changes_the_mesh(
        rounds in 0u8..3, seed in any::<u64>(), v in -50i32..50
    ) {
        let mut forest = random_quad_forest([2, 2], rounds, seed);
        let mut mapper = LeafIndexMapper::new(&forest).unwrap();
        let mut field = vec![f64::from(v); forest.leaf_count()];
        let before = forest.leaves();

        prop_assert!(!adapt_step(&mut forest, &mut mapper, &mut field, 0, 3).unwrap());
        prop_assert_eq!(forest.leaves(), before);
        prop_assert_eq!(field, vec![f64::from(v); forest.leaf_count()]);
    }
}
