use proptest::prelude::*;

/// Strategy for generating (num_atoms, num_workers) pairs, workers possibly exceeding atoms
pub fn atoms_and_workers_strategy() -> impl Strategy<Value = (usize, usize)> {
    (1usize..=5_000, 1usize..=64)
}

/// Strategy for generating small batches where clamping kicks in often
pub fn small_batch_strategy() -> impl Strategy<Value = (usize, usize)> {
    (1usize..=12, 1usize..=16)
}

/// Strategy for generating a shuffled order of `len` chunk positions
pub fn permutation_strategy(len: usize) -> impl Strategy<Value = Vec<usize>> {
    Just((0..len).collect::<Vec<_>>()).prop_shuffle()
}

/// Strategy for generating per-chunk column sets that overlap only partially,
/// each in its own order
pub fn column_sets_strategy(chunks: usize) -> impl Strategy<Value = Vec<Vec<&'static str>>> {
    prop::collection::vec(
        prop::sample::subsequence(vec!["open", "high", "low", "close"], 1..=4).prop_shuffle(),
        chunks,
    )
}
