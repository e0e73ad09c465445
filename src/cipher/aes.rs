//! The AES linear layer and its difference models.

use lazy_static::lazy_static;

use crate::cipher::{LinearLayer, MixColumns};
use crate::emitter::{linear_relation, BinaryMatrix, XorMode};
use crate::oracle::{Oracle, Variable};
use crate::utility::map_cells;

/*****************************************************************
                            AES
******************************************************************/

/// The AES S-box.
pub const AES_SBOX: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab, 0x76,
    0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4, 0x72, 0xc0,
    0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71, 0xd8, 0x31, 0x15,
    0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2, 0xeb, 0x27, 0xb2, 0x75,
    0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6, 0xb3, 0x29, 0xe3, 0x2f, 0x84,
    0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb, 0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf,
    0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45, 0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8,
    0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5, 0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2,
    0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44, 0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73,
    0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a, 0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb,
    0xe0, 0x32, 0x3a, 0x0a, 0x49, 0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79,
    0xe7, 0xc8, 0x37, 0x6d, 0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08,
    0xba, 0x78, 0x25, 0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a,
    0x70, 0x3e, 0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e,
    0xe1, 0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb, 0x16,
];

/// Cell `i` moves to cell `SHIFT_ROWS[i]`.
const SHIFT_ROWS: [usize; 16] = [0, 13, 10, 7, 4, 1, 14, 11, 8, 5, 2, 15, 12, 9, 6, 3];

/// Cell `i` after ShiftRows comes from cell `ISHIFT_ROWS[i]`.
const ISHIFT_ROWS: [usize; 16] = [0, 5, 10, 15, 4, 9, 14, 3, 8, 13, 2, 7, 12, 1, 6, 11];

/// Rows of `(M|I)` for one column, little endian within each byte.
const MIXCOL_ORIGINAL: [u64; 32] = [
    0x101018180, 0x202028381, 0x404040602, 0x808088c84,
    0x1010109888, 0x2020203010, 0x4040406020, 0x808080c040,
    0x10001818001, 0x20002838102, 0x40004060204, 0x800088c8408,
    0x100010988810, 0x200020301020, 0x400040602040, 0x800080c04080,
    0x1000081800101, 0x2000083810202, 0x4000006020404, 0x800008c840808,
    0x10000098881010, 0x20000030102020, 0x40000060204040, 0x800000c0408080,
    0x100000080010181, 0x200000081020283, 0x400000002040406, 0x80000008408088c,
    0x1000000088101098, 0x2000000010202030, 0x4000000020404060, 0x80000000408080c0,
];

/// Rows of `P·(M|I)·Q`, the relation with the S-box outputs expressed in the basis of `qmat`.
const MIXCOL_EQUIVALENT: [u64; 32] = [
    0x1010101000080, 0x202020301, 0x404040602, 0x8000808840c0000,
    0x1010101808, 0x2020203010, 0x4040406020, 0x808080c040,
    0x101000100800100, 0x20002030102, 0x40004060204, 0x80808000000840c,
    0x100010180810, 0x200020301020, 0x400040602040, 0x800080c04080,
    0x101010000008001, 0x2000003010202, 0x4000006020404, 0x808080c000084,
    0x10000018081010, 0x20000030102020, 0x40000060204040, 0x800000c0408080,
    0x100010180010000, 0x200000001020203, 0x400000002040406, 0x808000800840c00,
    0x1000000008101018, 0x2000000010202030, 0x4000000020404060, 0x80000000408080c0,
];

lazy_static! {
    static ref ORIGINAL: BinaryMatrix = BinaryMatrix::from_words(&MIXCOL_ORIGINAL, 64);
    static ref EQUIVALENT: BinaryMatrix = BinaryMatrix::from_words(&MIXCOL_EQUIVALENT, 64);
    static ref IDENTITY: BinaryMatrix = BinaryMatrix::identity_pair(32);
}

/**
Performs multiplication by two in the AES field
*/
fn aes_times2(x: u128) -> u128 {
    ((x << 1) & 0xff) ^ (((x >> 7) & 0x1) * 0x1b)
}

/// The affine change of basis of the equivalent S-box: `x ^ x7 ^ (x7 << 3)`.
pub fn qmat(x: u128) -> u128 {
    let top = (x >> 7) & 1;
    x ^ top ^ (top << 3)
}

/// Applies `qmat` to every byte of the state.
pub fn qmat_on_state(x: u128) -> u128 {
    map_cells(x, 16, 8, qmat)
}

/** 
A structure representing the AES linear layer.

mixcol      The MixColumns model used for the constraints.
*/
#[derive(Clone)]
pub struct Aes {
    mixcol: MixColumns,
}

impl Aes {
    pub fn new(mixcol: MixColumns) -> Aes {
        Aes { mixcol }
    }

    fn matrix(&self) -> &'static BinaryMatrix {
        match self.mixcol {
            MixColumns::Original => &ORIGINAL,
            MixColumns::Equivalent => &EQUIVALENT,
            MixColumns::Identity => &IDENTITY,
        }
    }

    fn shift_rows(input: u128) -> u128 {
        (0..16).fold(0, |x, i| x ^ ((input >> (i * 8)) & 0xff) << (SHIFT_ROWS[i] * 8))
    }

    fn ishift_rows(input: u128) -> u128 {
        (0..16).fold(0, |x, i| x ^ ((input >> (SHIFT_ROWS[i] * 8)) & 0xff) << (i * 8))
    }

    fn mix_columns(x: u128) -> u128 {
        let mut y = 0;

        for i in 0..4 {
            let t = ((x >> (   32*i)) & 0xff) 
                  ^ ((x >> ( 8+32*i)) & 0xff) 
                  ^ ((x >> (16+32*i)) & 0xff) 
                  ^ ((x >> (24+32*i)) & 0xff);
            let u = (x >> (32*i)) & 0xff;
            
            y ^= (((x >> (32*i)) & 0xff) 
              ^ aes_times2(((x >> (   32*i)) & 0xff)^((x >> ( 8+32*i)) & 0xff)) 
              ^ t) << (   32*i);
            y ^= (((x >> (8+32*i)) & 0xff) 
              ^ aes_times2(((x >> ( 8+32*i)) & 0xff)^((x >> (16+32*i)) & 0xff)) 
              ^ t) << ( 8+32*i);
            y ^= (((x >> (16+32*i)) & 0xff) 
              ^ aes_times2(((x >> (16+32*i)) & 0xff)^((x >> (24+32*i)) & 0xff)) 
              ^ t) << (16+32*i);
            y ^= (((x >> (24+32*i)) & 0xff) 
              ^ aes_times2(((x >> (24+32*i)) & 0xff)^u) 
              ^ t) << (24+32*i);
        }

        y
    }

    /// InvMixColumns as a preprocessing step followed by MixColumns.
    fn inv_mix_columns(x: u128) -> u128 {
        let mut y = 0;

        for i in 0..4 {
            let u = aes_times2(aes_times2(((x >> (32*i)) & 0xff) ^ ((x >> (16+32*i)) & 0xff)));
    
            y ^= (((x >> (   32*i)) & 0xff) ^ u) << (   32*i);
            y ^= (((x >> (16+32*i)) & 0xff) ^ u) << (16+32*i);
            
            let u = aes_times2(aes_times2(((x >> (8+32*i)) & 0xff) ^ ((x >> (24+32*i)) & 0xff)));
            
            y ^= (((x >> (8+32*i)) & 0xff) ^ u) << (8+32*i);
            y ^= (((x >> (24+32*i)) & 0xff) ^ u) << (24+32*i);
        }

        Aes::mix_columns(y)
    }
}

impl LinearLayer for Aes {
    fn name(&self) -> String {
        String::from("AES")
    }

    fn state_size(&self) -> usize {
        128
    }

    fn cell_size(&self) -> usize {
        8
    }

    /** 
    Applies ShiftRows followed by MixColumns, or ShiftRows alone for the identity model.
    
    input   The input to the linear layer.
    */
    fn apply(&self, input: u128) -> u128 {
        let x = Aes::shift_rows(input);

        match self.mixcol {
            MixColumns::Identity => x,
            _ => Aes::mix_columns(x),
        }
    }

    fn apply_inv(&self, input: u128) -> u128 {
        let x = match self.mixcol {
            MixColumns::Identity => input,
            _ => Aes::inv_mix_columns(input),
        };

        Aes::ishift_rows(x)
    }

    /**
    ShiftRows is a renaming of the S-box output variables. Each column then goes through a
    32x64 binary relation between the shifted bytes and the next S-box input.
    */
    fn emit(&self, oracle: &mut dyn Oracle, sbox_out: &[Variable], sbox_in: &[Variable], mode: XorMode) {
        assert_eq!(sbox_out.len(), 128);
        assert_eq!(sbox_in.len(), 128);

        let shifted: Vec<Variable> = (0..128)
            .map(|i| sbox_out[8 * ISHIFT_ROWS[i / 8] + i % 8])
            .collect();

        for col in 0..4 {
            let range = 32 * col..32 * (col + 1);
            linear_relation(oracle, self.matrix(), &shifted[range.clone()], &sbox_in[range], 0, mode);
        }
    }

    fn output_basis(&self, x: u128) -> u128 {
        match self.mixcol {
            MixColumns::Equivalent => qmat_on_state(x),
            _ => x,
        }
    }

    fn sbox_table(&self) -> Vec<u8> {
        match self.mixcol {
            MixColumns::Equivalent => AES_SBOX.iter().map(|&s| qmat(u128::from(s)) as u8).collect(),
            _ => AES_SBOX.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{name_to_layer, LinearLayer};
    use crate::oracle::{LinearExpr, SatOracle, Status};
    use rand::Rng;

    /// Column vectors of FIPS-197, appendix B and C.
    const MIXCOL_VECTORS: [(u128, u128); 4] = [
        (0x84FB386F1AE1AC977941DD70832DD769, 0x9F487F794F955F662AFC86ABD7F1AB29),
        (0x1F770C64F0B579DEAAAC432C3D37CF0E, 0xB7A53ECBBF9D75A0C40EFC79B674CC11),
        (0x684AF5BC0ACCE85564BB0878242ED2ED, 0x7A1E98BDACB6D1141A6944DD06EB2D3E),
        (0x9316DD47C2FA92834390A1DE43E43F23, 0xAAA755B34CFFE57CEF6F98E1F01C13E6),
    ];

    const SHIFT_ROWS_VECTORS: [(u128, u128); 2] = [
        (0x63CAB7040953D051CD60E0E7BA70E18C, 0x6353E08C0960E104CD70B751BACAD0E7),
        (0x84FB386F1AE1AC97DF5CFD237C49946B, 0x84E1FD6B1A5C946FDF4938977CFBAC23),
    ];

    #[test]
    fn linear() {
        let cipher = name_to_layer("aes", MixColumns::Original).unwrap();
        let x = 0x00112233445566778899aabbccddeeff;

        assert_eq!(x, cipher.apply_inv(cipher.apply(x)));
    }

    #[test]
    fn fips_vectors() {
        let layer = Aes::new(MixColumns::Original);

        // The vectors list the first byte of the state first
        for &(x, y) in MIXCOL_VECTORS.iter() {
            assert_eq!(layer.apply(x.swap_bytes()), y.swap_bytes());
        }

        let layer = Aes::new(MixColumns::Identity);

        for &(x, y) in SHIFT_ROWS_VECTORS.iter() {
            assert_eq!(layer.apply(x.swap_bytes()), y.swap_bytes());
        }
    }

    #[test]
    fn qmat_is_involution() {
        for x in 0..256 {
            assert_eq!(qmat(qmat(x)), x);
        }
        assert_eq!(qmat(0x80), 0x89);
    }

    #[test]
    fn matrix_weights() {
        assert_eq!(ORIGINAL.max_row_weight(), 8);
        assert_eq!(EQUIVALENT.max_row_weight(), 7);
        assert_eq!(ORIGINAL.num_rows(), 32);
    }

    /// Fixes both sides of one linear layer and asks the oracle.
    fn layer_accepts(layer: &Aes, x: u128, y: u128) -> bool {
        let mut oracle = SatOracle::new();
        let out: Vec<_> = (0..128).map(|_| oracle.new_binary()).collect();
        let next: Vec<_> = (0..128).map(|_| oracle.new_binary()).collect();
        layer.emit(&mut oracle, &out, &next, XorMode::Binary);

        let raw = layer.output_basis(x);

        for i in 0..128 {
            oracle.assert_constraint(&LinearExpr::from(out[i]).equals(((raw >> i) & 1) as i64));
            oracle.assert_constraint(&LinearExpr::from(next[i]).equals(((y >> i) & 1) as i64));
        }

        oracle.solve() == Status::Feasible
    }

    #[test]
    fn model_matches_layer() {
        let mut rng = rand::thread_rng();

        for &mixcol in &[MixColumns::Original, MixColumns::Equivalent, MixColumns::Identity] {
            let layer = Aes::new(mixcol);

            for _ in 0..4 {
                let x: u128 = rng.gen();
                let y = layer.apply(x);

                assert!(layer_accepts(&layer, x, y), "{:?} {:032x}", mixcol, x);
                assert!(!layer_accepts(&layer, x, y ^ 1 << rng.gen_range(0..128)), "{:?} {:032x}", mixcol, x);
            }
        }
    }

    #[test]
    fn equivalent_sbox_table() {
        let layer = Aes::new(MixColumns::Equivalent);
        let table = layer.sbox_table();

        for x in 0..256 {
            assert_eq!(u128::from(table[x]), qmat(u128::from(AES_SBOX[x])));
        }
    }
}
