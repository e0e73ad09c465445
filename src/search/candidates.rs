//! Candidate maps: the input differences still to be tested, each with the output differences
//! still to be tested against it.

use fnv::FnvBuildHasher;
use indexmap::{IndexMap, IndexSet};

use crate::utility::mask;

/// Set of output differences of one input difference.
pub type DiffSet = IndexSet<u128, FnvBuildHasher>;

/// Map from an input difference to the output differences left to test. Keys with an empty set
/// are removed by the search.
pub type CandidateMap = IndexMap<u128, DiffSet, FnvBuildHasher>;

/**
All pairs with a single active cell on each side: every non-zero value of `in_cell` against
every non-zero value of `out_cell`.

in_cell     Index of the active input cell.
out_cell    Index of the active output cell.
cell_size   Size of a cell in bits.
*/
pub fn single_cell(in_cell: usize, out_cell: usize, cell_size: usize) -> CandidateMap {
    let values = 1..=mask(cell_size);
    let outputs: DiffSet = values.clone().map(|v| v << (out_cell * cell_size)).collect();

    values
        .map(|v| (v << (in_cell * cell_size), outputs.clone()))
        .collect()
}

/// Groups pairs by input difference.
pub fn from_pairs<I: IntoIterator<Item = (u128, u128)>>(pairs: I) -> CandidateMap {
    let mut candidates = CandidateMap::default();

    for (x, y) in pairs {
        candidates.entry(x).or_default().insert(y);
    }

    candidates
}

/// Total number of pairs in the map.
pub fn count(candidates: &CandidateMap) -> usize {
    candidates.values().map(|set| set.len()).sum()
}
