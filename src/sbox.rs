//! Difference models of S-boxes: the DDT together with a set of linear inequalities whose
//! integer points are exactly the possible transitions.

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::utility::bits;

/// The content of an S-box model file.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SboxFile {
    input_size: usize,
    output_size: usize,
    ddt: Vec<Vec<usize>>,
    inequalities: Vec<Vec<i64>>,
}

/**
A structure describing the difference behaviour of an S-box.

input_size      Size of the S-box input in bits.
output_size     Size of the S-box output in bits.
ddt             The difference distribution table, indexed by input then output difference.
inequalities    Each entry holds the input coefficients, the output coefficients and the
                constant of an inequality `Σ c_i·a_i + Σ d_j·b_j + k >= 0`.
rows            Output differences compatible with each input difference.
columns         Input differences compatible with each output difference.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SboxFile", into = "SboxFile")]
pub struct SboxModel {
    input_size: usize,
    output_size: usize,
    ddt: Vec<Vec<usize>>,
    inequalities: Vec<Vec<i64>>,
    rows: Vec<Vec<usize>>,
    columns: Vec<Vec<usize>>,
}

impl TryFrom<SboxFile> for SboxModel {
    type Error = Error;

    fn try_from(file: SboxFile) -> Result<SboxModel> {
        SboxModel::new(file.input_size, file.output_size, file.ddt, file.inequalities)
    }
}

impl From<SboxModel> for SboxFile {
    fn from(model: SboxModel) -> SboxFile {
        SboxFile {
            input_size: model.input_size,
            output_size: model.output_size,
            ddt: model.ddt,
            inequalities: model.inequalities,
        }
    }
}

impl SboxModel {
    /// Creates a model after checking the dimensions of the DDT and of the inequalities.
    pub fn new(
        input_size: usize,
        output_size: usize,
        ddt: Vec<Vec<usize>>,
        inequalities: Vec<Vec<i64>>,
    ) -> Result<SboxModel> {
        if input_size == 0 || input_size > 16 || output_size == 0 || output_size > 16 {
            return Err(Error::MalformedSbox(format!(
                "unsupported sizes {} -> {}",
                input_size, output_size
            )));
        }

        if ddt.len() != 1 << input_size || ddt.iter().any(|row| row.len() != 1 << output_size) {
            return Err(Error::MalformedSbox(String::from(
                "DDT dimensions do not match the S-box sizes",
            )));
        }

        let width = input_size + output_size + 1;

        if let Some(bad) = inequalities.iter().find(|ineq| ineq.len() != width) {
            return Err(Error::MalformedSbox(format!(
                "inequality of length {}, expected {}",
                bad.len(),
                width
            )));
        }

        let mut rows = vec![Vec::new(); 1 << input_size];
        let mut columns = vec![Vec::new(); 1 << output_size];

        for (a, row) in ddt.iter().enumerate() {
            for (b, &count) in row.iter().enumerate() {
                if count != 0 {
                    rows[a].push(b);
                    columns[b].push(a);
                }
            }
        }

        Ok(SboxModel {
            input_size,
            output_size,
            ddt,
            inequalities,
            rows,
            columns,
        })
    }

    /// The identity transition `a = b` on `size` bits.
    pub fn identity(size: usize) -> SboxModel {
        let n = 1usize << size;
        let ddt = (0..n)
            .map(|a| (0..n).map(|b| usize::from(a == b)).collect())
            .collect();

        let mut inequalities = Vec::with_capacity(2 * size);

        for i in 0..size {
            let mut forward = vec![0; 2 * size + 1];
            forward[i] = 1;
            forward[size + i] = -1;

            let mut backward = vec![0; 2 * size + 1];
            backward[i] = -1;
            backward[size + i] = 1;

            inequalities.push(forward);
            inequalities.push(backward);
        }

        SboxModel::build(size, size, ddt, inequalities)
    }

    /**
    An arbitrary bijective S-box: any non-zero input difference can lead to any non-zero output
    difference and zero only leads to zero.

    input_size      Size of the input in bits.
    output_size     Size of the output in bits.
    */
    pub fn arbitrary(input_size: usize, output_size: usize) -> SboxModel {
        let ddt = (0..1usize << input_size)
            .map(|a| {
                (0..1usize << output_size)
                    .map(|b| usize::from((a == 0) == (b == 0)))
                    .collect()
            })
            .collect();

        let width = input_size + output_size + 1;
        let mut inequalities = Vec::with_capacity(input_size + output_size);

        // An active output bit needs an active input
        for j in 0..output_size {
            let mut ineq = vec![0; width];
            ineq[..input_size].iter_mut().for_each(|c| *c = 1);
            ineq[input_size + j] = -1;
            inequalities.push(ineq);
        }

        // An active input bit needs an active output
        for i in 0..input_size {
            let mut ineq = vec![0; width];
            ineq[input_size..input_size + output_size]
                .iter_mut()
                .for_each(|c| *c = 1);
            ineq[i] = -1;
            inequalities.push(ineq);
        }

        SboxModel::build(input_size, output_size, ddt, inequalities)
    }

    /**
    Creates a model from a lookup table. The inequality set holds one cut per impossible
    transition, it is exact but far from minimal.

    size    Size of the S-box in bits.
    table   The S-box table, of length 2^size.
    */
    pub fn from_table(size: usize, table: &[u8]) -> SboxModel {
        assert_eq!(1 << size, table.len());

        let ddt = generate_ddt(table, size);
        let width = 2 * size;
        let mut inequalities = Vec::new();

        for (a, row) in ddt.iter().enumerate() {
            for (b, &count) in row.iter().enumerate() {
                if count != 0 {
                    continue;
                }

                let point = bits((a | b << size) as u128, width);
                let ones = point.iter().filter(|&&bit| bit).count() as i64;
                let mut ineq: Vec<i64> = point.iter().map(|&bit| if bit { -1 } else { 1 }).collect();
                ineq.push(ones - 1);
                inequalities.push(ineq);
            }
        }

        debug!(size, cuts = inequalities.len(), "S-box model from table");

        SboxModel::build(size, size, ddt, inequalities)
    }

    /// `new` for generated models, which have consistent dimensions by construction.
    fn build(
        input_size: usize,
        output_size: usize,
        ddt: Vec<Vec<usize>>,
        inequalities: Vec<Vec<i64>>,
    ) -> SboxModel {
        match SboxModel::new(input_size, output_size, ddt, inequalities) {
            Ok(model) => model,
            Err(e) => panic!("generated S-box model is inconsistent: {}", e),
        }
    }

    /// Reads a model file. Cells must keep their width through the S-box.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SboxModel> {
        let reader = BufReader::new(File::open(path)?);
        let model: SboxModel = serde_json::from_reader(reader)?;

        if model.input_size != model.output_size {
            return Err(Error::SboxWidthMismatch {
                input: model.input_size,
                output: model.output_size,
            });
        }

        Ok(model)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn ddt(&self) -> &Vec<Vec<usize>> {
        &self.ddt
    }

    pub fn inequalities(&self) -> &[Vec<i64>] {
        &self.inequalities
    }

    /// Output differences reachable from input difference `a`.
    pub fn successors(&self, a: usize) -> &[usize] {
        &self.rows[a]
    }

    /// Input differences that can lead to output difference `b`.
    pub fn predecessors(&self, b: usize) -> &[usize] {
        &self.columns[b]
    }

    pub fn is_possible(&self, a: usize, b: usize) -> bool {
        self.ddt[a][b] != 0
    }

    /// Checks whether the point `(a, b)` satisfies every inequality.
    pub fn satisfies(&self, a: usize, b: usize) -> bool {
        let n = self.input_size;
        let m = self.output_size;
        let point = bits((a | b << n) as u128, n + m);

        self.inequalities.iter().all(|ineq| {
            let lhs: i64 = point
                .iter()
                .zip(ineq.iter())
                .filter(|&(&bit, _)| bit)
                .map(|(_, &c)| c)
                .sum();
            lhs + ineq[n + m] >= 0
        })
    }

    /// Checks that the inequalities carve out exactly the non-zero DDT entries.
    pub fn is_exact(&self) -> bool {
        (0..1 << self.input_size).all(|a| {
            (0..1 << self.output_size).all(|b| self.satisfies(a, b) == self.is_possible(a, b))
        })
    }
}

/// Generates the DDT associated with an S-box table.
pub fn generate_ddt(table: &[u8], sbox_size: usize) -> Vec<Vec<usize>> {
    let ddt_size = 1 << sbox_size;
    let mut ddt = vec![vec![0; ddt_size]; ddt_size];

    for plaintext_0 in 0..ddt_size {
        let ciphertext_0 = table[plaintext_0];

        for (in_diff, ddt_row) in ddt.iter_mut().enumerate() {
            let plaintext_1 = plaintext_0 ^ in_diff;
            let ciphertext_1 = table[plaintext_1];

            ddt_row[(ciphertext_0 ^ ciphertext_1) as usize] += 1;
        }
    }

    ddt
}
