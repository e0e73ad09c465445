//! Types and functions for searching for impossible differentials.

pub mod candidates;
pub mod equivalence;

pub use self::candidates::{CandidateMap, DiffSet};
pub use self::equivalence::{equivalence_search, naive_search, SearchResult, SearchStats};
