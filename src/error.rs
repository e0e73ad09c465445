//! Error type shared by the modelling and search layers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The S-box model does not map n bits to n bits.
    #[error("S-box model maps {input} bits to {output} bits, cells must keep their width")]
    SboxWidthMismatch { input: usize, output: usize },

    /// The S-box model file is inconsistent with itself.
    #[error("malformed S-box model: {0}")]
    MalformedSbox(String),

    /// The S-box width does not divide the state of the linear layer.
    #[error("{cipher} uses {expected}-bit cells, the S-box model has {found}-bit cells")]
    CellSizeMismatch {
        cipher: String,
        expected: usize,
        found: usize,
    },

    #[error("a model needs at least one round, got {0}")]
    InvalidRounds(usize),

    /// The auxiliary models do not leave room for a middle state.
    #[error("auxiliary models cover {r_in} + {r_out} rounds, {rounds}-round model needs r_in + r_out + 1 < rounds")]
    InvalidAuxiliaryCoverage {
        r_in: usize,
        r_out: usize,
        rounds: usize,
    },

    /// A difference has bits set above the state of the model.
    #[error("difference {value:#x} does not fit a {state_size}-bit state")]
    DifferenceOutOfRange { value: u128, state_size: usize },

    #[error("cell {cell} out of range, the state has {num_cells} cells")]
    CellOutOfRange { cell: usize, num_cells: usize },

    #[error("models have different state layouts: {0}")]
    StateMismatch(String),

    /// The oracle returned neither feasible nor infeasible.
    #[error("oracle returned an inconclusive status: {0}")]
    OracleInconclusive(String),

    /// A solution value was read while no feasible solution is available.
    #[error("no feasible solution available")]
    NoSolution,

    #[error("unknown cipher: {0}")]
    UnknownCipher(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
