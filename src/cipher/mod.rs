//! A trait for representing the linear layers of AES-like ciphers as well as the implementations
//! for AES and SKINNY.

use std::str::FromStr;

use crate::emitter::XorMode;
use crate::oracle::{Oracle, Variable};
use crate::utility::{active_cells, mask};

/// Different models of the MixColumns step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MixColumns {
    /// The MixColumns matrix of the cipher.
    Original,
    /// An equivalent matrix which needs fewer inequalities.
    Equivalent,
    /// No mixing at all, only the cell permutation remains.
    Identity,
}

impl FromStr for MixColumns {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" | "origin" => Ok(MixColumns::Original),
            "equivalent" | "equiv" => Ok(MixColumns::Equivalent),
            "identity" => Ok(MixColumns::Identity),
            _ => Err(String::from("Unknown MixColumns model.")),
        }
    }
}

/// A trait defining the linear layer of an AES-like cipher.
pub trait LinearLayer {
    /// Returns the name of the cipher.
    fn name(&self) -> String;

    /// Returns the state size in bits.
    fn state_size(&self) -> usize;

    /// Returns the size of a cell (the S-box width) in bits.
    fn cell_size(&self) -> usize;

    /// Returns the number of cells of the state.
    fn num_cells(&self) -> usize {
        self.state_size() / self.cell_size()
    }

    /// Applies the linear layer to a difference.
    fn apply(&self, input: u128) -> u128;

    /// Applies the inverse linear layer to a difference.
    fn apply_inv(&self, input: u128) -> u128;

    /**
    Adds the constraints linking the S-box output of one round to the S-box input of the next.

    oracle      The oracle receiving the constraints.
    sbox_out    Variables of the S-box output of round r.
    sbox_in     Variables of the S-box input of round r+1.
    mode        XOR encoding.
    */
    fn emit(&self, oracle: &mut dyn Oracle, sbox_out: &[Variable], sbox_in: &[Variable], mode: XorMode);

    /// Maps an S-box output difference between the model basis and the standard basis.
    /// The map is an involution.
    fn output_basis(&self, x: u128) -> u128 {
        x
    }

    /// Returns the S-box table matching the model basis.
    fn sbox_table(&self) -> Vec<u8>;

    /// Returns the cells that a difference in `cell` can reach through the linear layer.
    fn cell_successors(&self, cell: usize) -> Vec<usize> {
        support(self.cell_size(), self.num_cells(), cell, |x| self.apply(x))
    }

    /// Returns the cells a difference ending in `cell` after the linear layer can come from.
    fn cell_predecessors(&self, cell: usize) -> Vec<usize> {
        support(self.cell_size(), self.num_cells(), cell, |x| self.apply_inv(x))
    }
}

/// Union of the active cells of the images of the bits of `cell`.
fn support<F: Fn(u128) -> u128>(cell_size: usize, num_cells: usize, cell: usize, f: F) -> Vec<usize> {
    assert!(cell < num_cells, "cell {} out of range", cell);

    let image = (0..cell_size)
        .map(|bit| f(1 << (cell * cell_size + bit)))
        .fold(0, |acc, y| acc | cell_mask(y, num_cells, cell_size));

    active_cells(image, num_cells, cell_size)
}

/// Replaces every non-zero cell by an all-ones cell.
fn cell_mask(x: u128, num_cells: usize, cell_size: usize) -> u128 {
    active_cells(x, num_cells, cell_size)
        .into_iter()
        .fold(0, |acc, i| acc | (mask(cell_size) << (i * cell_size)))
}

pub mod aes;
pub mod skinny;

/// Converts the name of a cipher to an instance of its linear layer.
pub fn name_to_layer(name: &str, mixcol: MixColumns) -> Option<Box<dyn LinearLayer>> {
    match name {
        "aes"       => Some(Box::new(aes::Aes::new(mixcol))),
        "skinny64"  => Some(Box::new(skinny::Skinny::new(4, mixcol))),
        "skinny128" => Some(Box::new(skinny::Skinny::new(8, mixcol))),
        _ => None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use rand::Rng;

    const CIPHERS: [&str; 3] = ["aes", "skinny64", "skinny128"];
    const MODES: [MixColumns; 3] = [MixColumns::Original, MixColumns::Equivalent, MixColumns::Identity];

    #[quickcheck]
    fn inverse(x: u128) -> bool {
        CIPHERS.iter().all(|name| {
            MODES.iter().all(|&mixcol| {
                let layer = name_to_layer(name, mixcol).unwrap();
                let x = x & mask(layer.state_size());
                layer.apply_inv(layer.apply(x)) == x && layer.apply(layer.apply_inv(x)) == x
            })
        })
    }

    #[test]
    fn single_cell_support() {
        let mut rng = rand::thread_rng();

        for name in CIPHERS.iter() {
            let layer = name_to_layer(name, MixColumns::Original).unwrap();
            let cs = layer.cell_size();

            for cell in 0..layer.num_cells() {
                let successors = layer.cell_successors(cell);
                let predecessors = layer.cell_predecessors(cell);

                for _ in 0..16 {
                    let v = rng.gen_range(1..(1u128 << cs)) << (cell * cs);

                    for i in active_cells(layer.apply(v), layer.num_cells(), cs) {
                        assert!(successors.contains(&i), "{} {} {}", name, cell, i);
                    }
                    for i in active_cells(layer.apply_inv(v), layer.num_cells(), cs) {
                        assert!(predecessors.contains(&i), "{} {} {}", name, cell, i);
                    }
                }
            }
        }
    }

    #[test]
    fn known_supports() {
        let aes = name_to_layer("aes", MixColumns::Original).unwrap();
        assert_eq!(aes.cell_successors(0), vec![0, 1, 2, 3]);
        assert_eq!(aes.cell_predecessors(0), vec![0, 5, 10, 15]);

        let skinny = name_to_layer("skinny128", MixColumns::Original).unwrap();
        assert_eq!(skinny.cell_successors(0), vec![0, 4, 12]);
        assert_eq!(skinny.cell_predecessors(0), vec![13]);

        let shuffle = name_to_layer("aes", MixColumns::Identity).unwrap();
        assert_eq!(shuffle.cell_successors(5), vec![1]);
    }

    #[test]
    fn unknown_cipher() {
        assert!(name_to_layer("present", MixColumns::Original).is_none());
        assert_eq!("equiv".parse::<MixColumns>(), Ok(MixColumns::Equivalent));
    }
}
