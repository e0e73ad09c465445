//! A collection of bit-vector helpers used throughout the library. States are `u128` values
//! where bit `i` of the integer is bit `i` of the state.

/// Calculates the modulo 2 sum of the bits in the input.
pub fn parity(input: u128) -> u128 {
    u128::from(input.count_ones() & 1)
}

/// Returns the `size` least significant bits of `x`, least significant first.
pub fn bits(x: u128, size: usize) -> Vec<bool> {
    (0..size).map(|i| (x >> i) & 1 == 1).collect()
}

/// Inverse of `bits`.
pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> u128 {
    bits.into_iter()
        .enumerate()
        .fold(0, |acc, (i, b)| acc | (u128::from(b) << i))
}

/// Returns a mask of the `size` least significant bits.
#[inline(always)]
pub fn mask(size: usize) -> u128 {
    if size >= 128 {
        !0
    } else {
        (1 << size) - 1
    }
}

/// Extracts the value of cell `i` of a state made of `cell_size`-bit cells.
#[inline(always)]
pub fn cell(x: u128, i: usize, cell_size: usize) -> u128 {
    (x >> (i * cell_size)) & mask(cell_size)
}

/// Applies `f` to every `cell_size`-bit cell of the `num_cells` cells of `x`.
pub fn map_cells<F: Fn(u128) -> u128>(x: u128, num_cells: usize, cell_size: usize, f: F) -> u128 {
    let mut y = 0;

    for i in 0..num_cells {
        y ^= (f(cell(x, i, cell_size)) & mask(cell_size)) << (i * cell_size);
    }

    y
}

/// Returns the indices of the non-zero cells of `x`.
pub fn active_cells(x: u128, num_cells: usize, cell_size: usize) -> Vec<usize> {
    (0..num_cells).filter(|&i| cell(x, i, cell_size) != 0).collect()
}
