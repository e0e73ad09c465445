//! The SKINNY linear layer for 4-bit and 8-bit cells.

use itertools::iproduct;
use lazy_static::lazy_static;

use crate::cipher::{LinearLayer, MixColumns};
use crate::emitter::{linear_relation, BinaryMatrix, XorMode};
use crate::oracle::{Oracle, Variable};
use crate::utility::mask;

/*****************************************************************
                            SKINNY
******************************************************************/

/// The 4-bit SKINNY S-box.
pub const SKINNY64_SBOX: [u8; 16] = [0xc, 0x6, 0x9, 0x0, 0x1, 0xa, 0x2, 0xb, 0x3, 0x8, 0x5, 0xd, 0x4, 0xe, 0x7, 0xf];

/// The 8-bit SKINNY S-box.
pub const SKINNY128_SBOX: [u8; 256] = [
    0x65, 0x4c, 0x6a, 0x42, 0x4b, 0x63, 0x43, 0x6b, 0x55, 0x75, 0x5a, 0x7a, 0x53, 0x73, 0x5b, 0x7b,
    0x35, 0x8c, 0x3a, 0x81, 0x89, 0x33, 0x80, 0x3b, 0x95, 0x25, 0x98, 0x2a, 0x90, 0x23, 0x99, 0x2b,
    0xe5, 0xcc, 0xe8, 0xc1, 0xc9, 0xe0, 0xc0, 0xe9, 0xd5, 0xf5, 0xd8, 0xf8, 0xd0, 0xf0, 0xd9, 0xf9,
    0xa5, 0x1c, 0xa8, 0x12, 0x1b, 0xa0, 0x13, 0xa9, 0x05, 0xb5, 0x0a, 0xb8, 0x03, 0xb0, 0x0b, 0xb9,
    0x32, 0x88, 0x3c, 0x85, 0x8d, 0x34, 0x84, 0x3d, 0x91, 0x22, 0x9c, 0x2c, 0x94, 0x24, 0x9d, 0x2d,
    0x62, 0x4a, 0x6c, 0x45, 0x4d, 0x64, 0x44, 0x6d, 0x52, 0x72, 0x5c, 0x7c, 0x54, 0x74, 0x5d, 0x7d,
    0xa1, 0x1a, 0xac, 0x15, 0x1d, 0xa4, 0x14, 0xad, 0x02, 0xb1, 0x0c, 0xbc, 0x04, 0xb4, 0x0d, 0xbd,
    0xe1, 0xc8, 0xec, 0xc5, 0xcd, 0xe4, 0xc4, 0xed, 0xd1, 0xf1, 0xdc, 0xfc, 0xd4, 0xf4, 0xdd, 0xfd,
    0x36, 0x8e, 0x38, 0x82, 0x8b, 0x30, 0x83, 0x39, 0x96, 0x26, 0x9a, 0x28, 0x93, 0x20, 0x9b, 0x29,
    0x66, 0x4e, 0x68, 0x41, 0x49, 0x60, 0x40, 0x69, 0x56, 0x76, 0x58, 0x78, 0x50, 0x70, 0x59, 0x79,
    0xa6, 0x1e, 0xaa, 0x11, 0x19, 0xa3, 0x10, 0xab, 0x06, 0xb6, 0x08, 0xba, 0x00, 0xb3, 0x09, 0xbb,
    0xe6, 0xce, 0xea, 0xc2, 0xcb, 0xe3, 0xc3, 0xeb, 0xd6, 0xf6, 0xda, 0xfa, 0xd3, 0xf3, 0xdb, 0xfb,
    0x31, 0x8a, 0x3e, 0x86, 0x8f, 0x37, 0x87, 0x3f, 0x92, 0x21, 0x9e, 0x2e, 0x97, 0x27, 0x9f, 0x2f,
    0x61, 0x48, 0x6e, 0x46, 0x4f, 0x67, 0x47, 0x6f, 0x51, 0x71, 0x5e, 0x7e, 0x57, 0x77, 0x5f, 0x7f,
    0xa2, 0x18, 0xae, 0x16, 0x1f, 0xa7, 0x17, 0xaf, 0x01, 0xb2, 0x0e, 0xbe, 0x07, 0xb7, 0x0f, 0xbf,
    0xe2, 0xca, 0xee, 0xc6, 0xcf, 0xe7, 0xc7, 0xef, 0xd2, 0xf2, 0xde, 0xfe, 0xd7, 0xf7, 0xdf, 0xff,
];

/// Cell `i` moves to cell `SHIFT_ROWS[i]`, rows are rotated to the right.
const SHIFT_ROWS: [usize; 16] = [0, 1, 2, 3, 5, 6, 7, 4, 10, 11, 8, 9, 15, 12, 13, 14];

/// Cell `i` after ShiftRows comes from cell `ISHIFT_ROWS[i]`.
const ISHIFT_ROWS: [usize; 16] = [0, 1, 2, 3, 7, 4, 5, 6, 10, 11, 8, 9, 13, 14, 15, 12];

lazy_static! {
    /// Relation between the four input rows and the four output rows of one bit-plane.
    static ref ORIGINAL: BinaryMatrix = BinaryMatrix::from_entries(&[
        &[1, 0, 1, 1, 1, 0, 0, 0],
        &[1, 0, 0, 0, 0, 1, 0, 0],
        &[0, 1, 1, 0, 0, 0, 1, 0],
        &[1, 0, 1, 0, 0, 0, 0, 1],
    ]);

    /// The first row replaced by the sum of the first and the last.
    static ref EQUIVALENT: BinaryMatrix = BinaryMatrix::from_entries(&[
        &[0, 0, 0, 1, 1, 0, 0, 1],
        &[1, 0, 0, 0, 0, 1, 0, 0],
        &[0, 1, 1, 0, 0, 0, 1, 0],
        &[1, 0, 1, 0, 0, 0, 0, 1],
    ]);

    static ref IDENTITY: BinaryMatrix = BinaryMatrix::identity_pair(4);
}

/** 
A structure representing the SKINNY linear layer.

cell_size   Size of a cell in bits, 4 for SKINNY-64 and 8 for SKINNY-128.
mixcol      The MixColumns model used for the constraints.
*/
#[derive(Clone)]
pub struct Skinny {
    cell_size: usize,
    mixcol: MixColumns,
}

impl Skinny {
    pub fn new(cell_size: usize, mixcol: MixColumns) -> Skinny {
        assert!(cell_size == 4 || cell_size == 8, "SKINNY has 4 or 8 bit cells");
        Skinny { cell_size, mixcol }
    }

    fn matrix(&self) -> &'static BinaryMatrix {
        match self.mixcol {
            MixColumns::Original => &ORIGINAL,
            MixColumns::Equivalent => &EQUIVALENT,
            MixColumns::Identity => &IDENTITY,
        }
    }

    fn row_size(&self) -> usize {
        4 * self.cell_size
    }

    fn permute(&self, input: u128, table: &[usize; 16]) -> u128 {
        let cs = self.cell_size;

        (0..16).fold(0, |x, i| x ^ ((input >> (i * cs)) & mask(cs)) << (table[i] * cs))
    }
}

impl LinearLayer for Skinny {
    fn name(&self) -> String {
        format!("SKINNY-{}", 16 * self.cell_size)
    }

    fn state_size(&self) -> usize {
        16 * self.cell_size
    }

    fn cell_size(&self) -> usize {
        self.cell_size
    }

    /** 
    Applies ShiftRows and MixColumns.
    
    input   The input to the linear layer.
    */
    fn apply(&self, input: u128) -> u128 {
        let mut output = self.permute(input, &SHIFT_ROWS);

        if self.mixcol == MixColumns::Identity {
            return output;
        }

        let rs = self.row_size();
        let row = mask(rs);

        output ^= (output & (row << (2 * rs))) >> rs;
        output ^= (output & row) << (2 * rs);
        output ^= (output & (row << (2 * rs))) << rs;
        ((output << rs) ^ (output >> (3 * rs))) & mask(self.state_size())
    }

    fn apply_inv(&self, input: u128) -> u128 {
        let mut output = input;

        if self.mixcol != MixColumns::Identity {
            let rs = self.row_size();
            let row = mask(rs);

            output = ((output >> rs) ^ (output << (3 * rs))) & mask(self.state_size());
            output ^= (output & (row << (2 * rs))) << rs;
            output ^= (output & row) << (2 * rs);
            output ^= (output & (row << (2 * rs))) >> rs;
        }

        self.permute(output, &ISHIFT_ROWS)
    }

    /**
    ShiftRows is a renaming of the S-box output variables. MixColumns acts on every column
    and every bit position of the cells as a 4x8 binary relation between the rows.
    */
    fn emit(&self, oracle: &mut dyn Oracle, sbox_out: &[Variable], sbox_in: &[Variable], mode: XorMode) {
        let cs = self.cell_size;
        let rs = self.row_size();
        assert_eq!(sbox_out.len(), self.state_size());
        assert_eq!(sbox_in.len(), self.state_size());

        let shifted: Vec<Variable> = (0..self.state_size())
            .map(|i| sbox_out[cs * ISHIFT_ROWS[i / cs] + i % cs])
            .collect();

        for (col, bit) in iproduct!(0..4, 0..cs) {
            let input: Vec<Variable> = (0..4).map(|row| shifted[rs * row + cs * col + bit]).collect();
            let output: Vec<Variable> = (0..4).map(|row| sbox_in[rs * row + cs * col + bit]).collect();

            linear_relation(oracle, self.matrix(), &input, &output, 0, mode);
        }
    }

    fn sbox_table(&self) -> Vec<u8> {
        match self.cell_size {
            4 => SKINNY64_SBOX.to_vec(),
            _ => SKINNY128_SBOX.to_vec(),
        }
    }
}
