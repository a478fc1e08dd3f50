#![allow(dead_code)]
use amr_transfer::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Run one full refine/coarsen protocol round with explicit marks.
pub fn apply_marks<M: AdaptiveMesh>(mesh: &mut M, marks: &[(M::Cell, Mark)]) -> bool {
    for (cell, mark) in marks {
        mesh.mark(*mark, *cell).unwrap();
    }
    mesh.prepare().unwrap();
    let changed = mesh.adapt().unwrap();
    mesh.finalize().unwrap();
    changed
}

/// A quad forest with `rounds` passes of random refinement (seeded).
pub fn random_quad_forest(extent: [u32; 2], rounds: u8, seed: u64) -> QuadForest {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut forest = QuadForest::new(extent).unwrap();
    for _ in 0..rounds {
        let marks: Vec<_> = forest
            .leaves()
            .into_iter()
            .filter(|_| rng.gen_bool(0.3))
            .map(|leaf| (leaf, Mark::Refine))
            .collect();
        apply_marks(&mut forest, &marks);
    }
    forest
}

/// Integer-valued random field, one value per leaf.
pub fn random_field(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..len).map(|_| f64::from(rng.gen_range(-50i32..50))).collect()
}

/// Sample `f` at the leaf centers of a forest, in mapper order.
pub fn sample<const D: usize>(
    forest: &Forest<D>,
    mapper: &LeafIndexMapper,
    f: impl Fn([f64; D]) -> f64,
) -> Vec<f64> {
    let mut field = vec![0.0; CellMapper::<Forest<D>>::size(mapper)];
    for leaf in forest.leaves() {
        let index = mapper.map(forest, leaf).unwrap();
        field[index.get()] = f(forest.center(leaf).unwrap());
    }
    field
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}
