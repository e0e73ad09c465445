//! Search for impossible differentials with the differential possibility equivalence of Sasaki
//! and Todo: a single feasible trail through the main model certifies every other candidate
//! pair that connects to the same middle states through the auxiliary models.

use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span};

use crate::error::{Error, Result};
use crate::oracle::Oracle;
use crate::primitive::{Layer, Primitive};
use crate::search::candidates::{count, CandidateMap};

/**
Counters of a search run.

candidates      Number of candidate pairs at the start.
full_queries    Queries on the main model.
in_queries      Queries on the auxiliary input model.
out_queries     Queries on the auxiliary output model.
discarded       Pairs shown possible without querying the main model.
found           Impossible differentials found.
elapsed         Wall time of the run.
*/
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchStats {
    pub candidates: usize,
    pub full_queries: usize,
    pub in_queries: usize,
    pub out_queries: usize,
    pub discarded: usize,
    pub found: usize,
    pub elapsed: Duration,
}

impl SearchStats {
    /// Percentage of auxiliary queries which discarded a pair.
    pub fn discard_rate(&self) -> f64 {
        let aux = self.in_queries + self.out_queries;

        if aux == 0 {
            0.0
        } else {
            100.0 * self.discarded as f64 / aux as f64
        }
    }
}

impl fmt::Display for SearchStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let full_rate = if self.candidates == 0 {
            0.0
        } else {
            100.0 * self.full_queries as f64 / self.candidates as f64
        };

        write!(
            f,
            "{:.1?}, {} candidates, {} full queries ({:.2} %), {} x queries, {} y queries, \
             discard rate {:.1} %, {} found",
            self.elapsed,
            self.candidates,
            self.full_queries,
            full_rate,
            self.in_queries,
            self.out_queries,
            self.discard_rate(),
            self.found
        )
    }
}

/// The outcome of a search: impossible pairs in the order they were found.
#[derive(Clone, Debug)]
pub struct SearchResult {
    pub impossible: Vec<(u128, u128)>,
    pub stats: SearchStats,
}

/// Returns the number of rounds `(r_in, r_out)` covered by the auxiliary models.
fn check_models<O: Oracle>(
    model: &Primitive<O>,
    aux_in: &Primitive<O>,
    aux_out: &Primitive<O>,
) -> Result<(usize, usize)> {
    for aux in &[aux_in, aux_out] {
        if aux.layer().name() != model.layer().name()
            || aux.state_size() != model.state_size()
            || aux.cell_size() != model.cell_size()
        {
            return Err(Error::StateMismatch(format!(
                "main model is {} with {}-bit cells, auxiliary model is {} with {}-bit cells",
                model.layer().name(),
                model.cell_size(),
                aux.layer().name(),
                aux.cell_size()
            )));
        }

        if aux.sbox() != model.sbox() {
            return Err(Error::StateMismatch(String::from(
                "auxiliary model uses a different S-box model",
            )));
        }
    }

    let r_in = aux_in.rounds() - 1;
    let r_out = aux_out.rounds() - 1;

    // The middle states must lie in different rounds of the main model
    if r_in + r_out + 1 >= model.rounds() {
        return Err(Error::InvalidAuxiliaryCoverage {
            r_in,
            r_out,
            rounds: model.rounds(),
        });
    }

    Ok((r_in, r_out))
}

/**
Finds all impossible differentials among the candidate pairs.

model       The main model.
candidates  Pairs to test, drained by the search.
aux_in      Model of the first `r_in + 1` rounds.
aux_out     Model of the last `r_out + 1` rounds.
label       Name of the run used in the logs.

Any inconclusive query aborts the search.
*/
pub fn equivalence_search<O: Oracle>(
    model: &mut Primitive<O>,
    mut candidates: CandidateMap,
    aux_in: &mut Primitive<O>,
    aux_out: &mut Primitive<O>,
    label: &str,
) -> Result<SearchResult> {
    let (r_in, r_out) = check_models(model, aux_in, aux_out)?;
    let y_mid_round = model.rounds() - r_out - 1;

    let span = info_span!("search", %label);
    let _enter = span.enter();

    let start = Instant::now();
    let mut impossible = Vec::new();
    let mut stats = SearchStats {
        candidates: count(&candidates),
        ..SearchStats::default()
    };

    candidates.retain(|_, outputs| !outputs.is_empty());

    while let Some(x) = candidates.keys().next().copied() {
        while let Some(y) = candidates.get_mut(&x).and_then(|outputs| outputs.pop()) {
            stats.full_queries += 1;

            if !model.is_possible(x, y)? {
                stats.found += 1;
                impossible.push((x, y));
                info!(x = %model.format_state(x), y = %model.format_state(y), "impossible differential");
                continue;
            }

            let x_mid = model.get_state_at(r_in, Layer::SboxOutput)?;
            let y_mid = model.get_state_at(y_mid_round, Layer::SboxInput)?;

            // Mark first, the map is not modified while it is scanned
            let mut marked = Vec::new();

            for (&x_start, outputs) in candidates.iter() {
                let reachable = x_start == x || {
                    stats.in_queries += 1;
                    aux_in.is_possible(x_start, x_mid)?
                };

                if !reachable {
                    continue;
                }

                for &y_end in outputs {
                    stats.out_queries += 1;

                    if aux_out.is_possible(y_mid, y_end)? {
                        marked.push((x_start, y_end));
                    }
                }
            }

            stats.discarded += marked.len();

            for (x_start, y_end) in marked {
                if let Some(outputs) = candidates.get_mut(&x_start) {
                    outputs.swap_remove(&y_end);
                }
            }

            candidates.retain(|_, outputs| !outputs.is_empty());

            stats.elapsed = start.elapsed();
            debug!(remaining = count(&candidates), "{}", stats);
        }

        candidates.shift_remove(&x);
    }

    stats.elapsed = start.elapsed();
    info!("{}", stats);

    Ok(SearchResult { impossible, stats })
}

/// Tests every candidate pair on the main model, one query per pair.
pub fn naive_search<O: Oracle>(model: &mut Primitive<O>, candidates: &CandidateMap) -> Result<SearchResult> {
    let start = Instant::now();
    let mut impossible = Vec::new();
    let mut stats = SearchStats {
        candidates: count(candidates),
        ..SearchStats::default()
    };

    for (&x, outputs) in candidates {
        for &y in outputs {
            stats.full_queries += 1;

            if !model.is_possible(x, y)? {
                stats.found += 1;
                impossible.push((x, y));
            }
        }
    }

    stats.elapsed = start.elapsed();
    info!("{}", stats);

    Ok(SearchResult { impossible, stats })
}
