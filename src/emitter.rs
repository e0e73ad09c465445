//! Translation of boolean relations into linear constraints over binary variables.

use std::str::FromStr;

use crate::oracle::{LinearExpr, Oracle, Variable};
use crate::sbox::SboxModel;
use crate::utility::parity;

/// Encoding used for XOR constraints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XorMode {
    /// One cut per odd-parity assignment, exponential in the number of variables.
    Binary,
    /// `Σ x = 2·t + target` with an auxiliary bounded integer `t`.
    Integer,
    /// Both encodings at once.
    Both,
}

impl Default for XorMode {
    fn default() -> XorMode {
        XorMode::Binary
    }
}

impl FromStr for XorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary"  => Ok(XorMode::Binary),
            "integer" => Ok(XorMode::Integer),
            "both"    => Ok(XorMode::Both),
            _         => Err(String::from("Unknown XOR mode.")),
        }
    }
}

/**
Constrains the parity of `vars` to equal `target`.

oracle      The oracle receiving the constraints.
vars        The variables to sum modulo 2.
target      The expected parity.
mode        The encoding to use.
*/
pub fn xor_equals<O: Oracle + ?Sized>(oracle: &mut O, vars: &[Variable], target: bool, mode: XorMode) {
    let n = vars.len();

    if mode != XorMode::Integer {
        assert!(n < 32, "binary XOR encoding of {} variables", n);

        // Exclude every assignment with the wrong parity
        for assignment in 0..(1u64 << n) {
            if (assignment.count_ones() % 2 == 1) == target {
                continue;
            }

            let mut expr = LinearExpr::new();

            for (j, &var) in vars.iter().enumerate() {
                if (assignment >> j) & 1 == 0 {
                    expr.add_term(var, 1);
                } else {
                    expr.add_term(var, -1);
                    expr.add_constant(1);
                }
            }

            oracle.assert_constraint(&expr.at_least(1));
        }
    }

    if mode != XorMode::Binary {
        let half = (n / 2 + n % 2) as i64;
        let t = oracle.new_integer(0, half);

        let expr = LinearExpr::sum(vars).term(t, -2);
        oracle.assert_constraint(&expr.equals(i64::from(target)));
    }
}

/**
A binary matrix with at most 128 columns. Row `i` is stored as an integer whose bit `j` is
the coefficient of column `j`.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryMatrix {
    rows: Vec<u128>,
    columns: usize,
}

impl BinaryMatrix {
    pub fn new(rows: Vec<u128>, columns: usize) -> BinaryMatrix {
        assert!(columns <= 128);
        assert!(rows.iter().all(|&row| columns == 128 || row >> columns == 0));

        BinaryMatrix { rows, columns }
    }

    pub fn from_words(words: &[u64], columns: usize) -> BinaryMatrix {
        BinaryMatrix::new(words.iter().map(|&w| u128::from(w)).collect(), columns)
    }

    /// Builds a matrix from rows of 0/1 entries.
    pub fn from_entries(entries: &[&[u8]]) -> BinaryMatrix {
        let columns = entries.first().map_or(0, |row| row.len());
        let rows = entries
            .iter()
            .map(|row| {
                assert_eq!(row.len(), columns);
                row.iter()
                    .enumerate()
                    .fold(0, |acc, (j, &e)| acc | (u128::from(e & 1) << j))
            })
            .collect();

        BinaryMatrix::new(rows, columns)
    }

    /// The matrix `(I|I)` relating `n` input bits to `n` equal output bits.
    pub fn identity_pair(n: usize) -> BinaryMatrix {
        BinaryMatrix::new((0..n).map(|i| (1 | 1 << n) << i).collect(), 2 * n)
    }

    pub fn rows(&self) -> &[u128] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns
    }

    /// The largest number of non-zero entries in a row.
    pub fn max_row_weight(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.count_ones() as usize)
            .max()
            .unwrap_or(0)
    }

    /// Computes `M·v` over GF(2). Bit `i` of the result is the parity of row `i` and `v`.
    pub fn multiply(&self, v: u128) -> u128 {
        self.rows
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &row)| acc | (parity(row & v) << i))
    }
}

/**
Constrains `M·(input|output) = target` over GF(2), one XOR constraint per row restricted to
the variables with a non-zero coefficient.

oracle      The oracle receiving the constraints.
matrix      The relation matrix, its columns index `input` followed by `output`.
input       Variables of the first columns.
output      Variables of the remaining columns.
target      Bit `i` is the right hand side of row `i`.
mode        The XOR encoding.
*/
pub fn linear_relation<O: Oracle + ?Sized>(
    oracle: &mut O,
    matrix: &BinaryMatrix,
    input: &[Variable],
    output: &[Variable],
    target: u128,
    mode: XorMode,
) {
    let vars: Vec<Variable> = input.iter().chain(output.iter()).copied().collect();
    assert_eq!(vars.len(), matrix.num_columns());

    for (i, &row) in matrix.rows().iter().enumerate() {
        let selected: Vec<Variable> = vars
            .iter()
            .enumerate()
            .filter(|&(j, _)| (row >> j) & 1 == 1)
            .map(|(_, &var)| var)
            .collect();

        xor_equals(oracle, &selected, (target >> i) & 1 == 1, mode);
    }
}

/// Adds `Σ c_i·a_i + Σ d_j·b_j + k >= 0` for every inequality of the S-box model.
pub fn sbox_relation<O: Oracle + ?Sized>(
    oracle: &mut O,
    sbox: &SboxModel,
    input: &[Variable],
    output: &[Variable],
) {
    let n = input.len();
    let m = output.len();
    assert_eq!(n, sbox.input_size());
    assert_eq!(m, sbox.output_size());

    for inequality in sbox.inequalities() {
        let mut expr = LinearExpr::constant(inequality[n + m]);

        for (&var, &c) in input.iter().chain(output.iter()).zip(inequality.iter()) {
            expr.add_term(var, c);
        }

        oracle.assert_constraint(&expr.at_least(0));
    }
}
