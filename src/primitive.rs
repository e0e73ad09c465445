//! The difference model of an AES-like primitive over a fixed number of rounds.
//!
//! Every round holds one binary variable per state bit at the S-box input and one at the S-box
//! output. S-box inequalities tie the two layers of a round and the linear layer of the cipher
//! ties the output of round `r` to the input of round `r + 1`. Differences are fixed through
//! removable equality constraints, one slot per bit, so that a model can be queried over and
//! over again.

use fnv::FnvHashMap;
use itertools::Itertools;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::cipher::LinearLayer;
use crate::emitter::{sbox_relation, XorMode};
use crate::error::{Error, Result};
use crate::oracle::{ConstraintId, LinearExpr, Oracle, SatOracle, Status, Variable};
use crate::sbox::SboxModel;
use crate::utility::{active_cells, bits, cell, from_bits, mask};

/// The two layers of variables in a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    SboxInput,
    SboxOutput,
}

/// The boundary of the model an active cell restriction applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Input,
    Output,
}

/// A named removable constraint fixing one bit of the input or output difference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Slot {
    Input(usize),
    Output(usize),
}

/**
A constraint model of `rounds` rounds of an AES-like primitive.

oracle          The oracle holding the variables and constraints.
layer           The linear layer of the cipher.
sbox            The S-box model applied to every cell.
rounds          Number of rounds.
in_sbox         Variables of the S-box inputs, indexed by round then bit.
out_sbox        Variables of the S-box outputs, in the basis of the linear layer model.
slots           Constraints currently fixing the input and output difference.
restrictions    Constraints of the active cell restrictions per side.
solved          Whether the last query found a solution that can be read back.
*/
pub struct Primitive<O: Oracle = SatOracle> {
    oracle: O,
    layer: Box<dyn LinearLayer>,
    sbox: Arc<SboxModel>,
    rounds: usize,
    in_sbox: Vec<Vec<Variable>>,
    out_sbox: Vec<Vec<Variable>>,
    slots: FnvHashMap<Slot, ConstraintId>,
    restrictions: FnvHashMap<Side, Vec<ConstraintId>>,
    solved: bool,
}

/// Variables and constraints that only live for the duration of one operation.
struct Scope<'a, O: Oracle> {
    oracle: &'a mut O,
    variables: Vec<Variable>,
    constraints: Vec<ConstraintId>,
}

impl<'a, O: Oracle> Scope<'a, O> {
    fn new(oracle: &'a mut O) -> Scope<'a, O> {
        Scope {
            oracle,
            variables: Vec::new(),
            constraints: Vec::new(),
        }
    }

    fn new_binary(&mut self) -> Variable {
        let var = self.oracle.new_binary();
        self.variables.push(var);
        var
    }

    fn add_constraint(&mut self, expr: LinearExpr, rhs: i64) {
        let id = self.oracle.add_constraint(&expr.at_least(rhs));
        self.constraints.push(id);
    }
}

impl<'a, O: Oracle> Drop for Scope<'a, O> {
    fn drop(&mut self) {
        for id in self.constraints.drain(..) {
            self.oracle.remove_constraint(id);
        }
        for var in self.variables.drain(..) {
            self.oracle.remove_variable(var);
        }
    }
}

impl Primitive<SatOracle> {
    /// Builds a model on a fresh SAT oracle with the default XOR encoding.
    pub fn new(layer: Box<dyn LinearLayer>, sbox: Arc<SboxModel>, rounds: usize) -> Result<Primitive> {
        Primitive::with_oracle(SatOracle::new(), layer, sbox, rounds, XorMode::default())
    }
}

impl<O: Oracle> Primitive<O> {
    /**
    Builds a model on the given oracle.

    oracle      An oracle without constraints.
    layer       The linear layer of the cipher.
    sbox        The S-box model, its width must match the cells of the linear layer.
    rounds      Number of rounds, at least one.
    mode        XOR encoding used for the linear layer.
    */
    pub fn with_oracle(
        mut oracle: O,
        layer: Box<dyn LinearLayer>,
        sbox: Arc<SboxModel>,
        rounds: usize,
        mode: XorMode,
    ) -> Result<Primitive<O>> {
        if rounds == 0 {
            return Err(Error::InvalidRounds(rounds));
        }

        if sbox.input_size() != sbox.output_size() {
            return Err(Error::SboxWidthMismatch {
                input: sbox.input_size(),
                output: sbox.output_size(),
            });
        }

        if sbox.input_size() != layer.cell_size() {
            return Err(Error::CellSizeMismatch {
                cipher: layer.name(),
                expected: layer.cell_size(),
                found: sbox.input_size(),
            });
        }

        // Inactive cells must stay inactive through the S-box layer
        if sbox.successors(0) != [0] || sbox.predecessors(0) != [0] {
            return Err(Error::MalformedSbox(String::from(
                "the zero difference must only connect to itself",
            )));
        }

        let state_size = layer.state_size();
        let cs = layer.cell_size();

        let new_layer = |oracle: &mut O| (0..state_size).map(|_| oracle.new_binary()).collect::<Vec<_>>();
        let in_sbox: Vec<_> = (0..rounds).map(|_| new_layer(&mut oracle)).collect();
        let out_sbox: Vec<_> = (0..rounds).map(|_| new_layer(&mut oracle)).collect();

        for (a, b) in in_sbox.iter().zip(out_sbox.iter()) {
            for nibble in 0..layer.num_cells() {
                let range = cs * nibble..cs * (nibble + 1);
                sbox_relation(&mut oracle, &sbox, &a[range.clone()], &b[range]);
            }
        }

        for r in 0..rounds - 1 {
            layer.emit(&mut oracle, &out_sbox[r], &in_sbox[r + 1], mode);
        }

        debug!(cipher = %layer.name(), rounds, ?mode, "built primitive model");

        Ok(Primitive {
            oracle,
            layer,
            sbox,
            rounds,
            in_sbox,
            out_sbox,
            slots: FnvHashMap::default(),
            restrictions: FnvHashMap::default(),
            solved: false,
        })
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn state_size(&self) -> usize {
        self.layer.state_size()
    }

    pub fn cell_size(&self) -> usize {
        self.layer.cell_size()
    }

    pub fn num_cells(&self) -> usize {
        self.layer.num_cells()
    }

    pub fn layer(&self) -> &dyn LinearLayer {
        self.layer.as_ref()
    }

    pub fn sbox(&self) -> &SboxModel {
        &self.sbox
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Replaces the constraint occupying `slot` by `var == bit`.
    fn fill_slot(&mut self, slot: Slot, var: Variable, bit: bool) {
        if let Some(id) = self.slots.remove(&slot) {
            self.oracle.remove_constraint(id);
        }

        let id = self.oracle.add_constraint(&LinearExpr::from(var).equals(i64::from(bit)));
        self.slots.insert(slot, id);
    }

    /// Checks that `cell` is a cell of the state.
    pub fn check_cell(&self, cell: usize) -> Result<()> {
        if cell >= self.num_cells() {
            return Err(Error::CellOutOfRange {
                cell,
                num_cells: self.num_cells(),
            });
        }

        Ok(())
    }

    fn check_width(&self, x: u128) -> Result<()> {
        if x & !mask(self.state_size()) != 0 {
            return Err(Error::DifferenceOutOfRange {
                value: x,
                state_size: self.state_size(),
            });
        }

        Ok(())
    }

    /// Fixes the S-box input difference of the first round.
    pub fn set_input_diff(&mut self, x: u128) -> Result<()> {
        self.check_width(x)?;
        let vars = self.in_sbox[0].clone();

        for (i, (var, bit)) in vars.into_iter().zip(bits(x, self.state_size())).enumerate() {
            self.fill_slot(Slot::Input(i), var, bit);
        }

        self.solved = false;
        Ok(())
    }

    /// Fixes the S-box output difference of the last round.
    pub fn set_output_diff(&mut self, y: u128) -> Result<()> {
        self.check_width(y)?;
        let raw = self.layer.output_basis(y);
        let vars = self.out_sbox[self.rounds - 1].clone();

        for (i, (var, bit)) in vars.into_iter().zip(bits(raw, self.state_size())).enumerate() {
            self.fill_slot(Slot::Output(i), var, bit);
        }

        self.solved = false;
        Ok(())
    }

    /// Runs the oracle on the current constraints.
    fn query(&mut self) -> Result<bool> {
        let status = self.oracle.solve();
        self.solved = status == Status::Feasible;

        match status {
            Status::Feasible => Ok(true),
            Status::Infeasible => Ok(false),
            Status::Inconclusive(reason) => Err(Error::OracleInconclusive(reason)),
        }
    }

    /**
    Checks whether the input difference `x` can lead to the output difference `y`. On success
    the intermediate states of a trail can be read with `get_state_at`.
    */
    pub fn is_possible(&mut self, x: u128, y: u128) -> Result<bool> {
        self.set_input_diff(x)?;
        self.set_output_diff(y)?;

        let possible = self.query()?;
        trace!(x = %self.format_state(x), y = %self.format_state(y), possible, "query");

        Ok(possible)
    }

    /// Reads the difference at the given round and layer from the last solution.
    pub fn get_state_at(&self, round: usize, layer: Layer) -> Result<u128> {
        assert!(round < self.rounds, "round {} out of range", round);

        if !self.solved {
            return Err(Error::NoSolution);
        }

        let vars = match layer {
            Layer::SboxInput => &self.in_sbox[round],
            Layer::SboxOutput => &self.out_sbox[round],
        };

        let values = vars
            .iter()
            .map(|&var| self.oracle.value(var).map(|v| v != 0).ok_or(Error::NoSolution))
            .collect::<Result<Vec<bool>>>()?;

        let x = from_bits(values);

        Ok(match layer {
            Layer::SboxInput => x,
            Layer::SboxOutput => self.layer.output_basis(x),
        })
    }

    pub fn last_input_diff(&self) -> Result<u128> {
        self.get_state_at(0, Layer::SboxInput)
    }

    pub fn last_output_diff(&self) -> Result<u128> {
        self.get_state_at(self.rounds - 1, Layer::SboxOutput)
    }

    /**
    Forces every cell but `cell` to be inactive in the first round (or the last round) and
    every cell that `cell` cannot reach through one linear layer to be inactive in the second
    round (or the second to last round).

    cell    The only active cell at the boundary.
    side    The boundary to restrict.

    # Panics
    Panics if `cell` is out of range or `side` is already restricted.
    */
    pub fn restrict_active_cell(&mut self, cell: usize, side: Side) {
        assert!(cell < self.num_cells(), "cell {} out of range", cell);
        assert!(
            !self.restrictions.contains_key(&side),
            "{:?} side is already restricted",
            side
        );

        let (boundary, allowed) = match side {
            Side::Input => (0, self.layer.cell_successors(cell)),
            Side::Output => (self.rounds - 1, self.layer.cell_predecessors(cell)),
        };

        let mut zeroes: Vec<(usize, usize)> = (0..self.num_cells())
            .filter(|&i| i != cell)
            .map(|i| (boundary, i))
            .collect();

        if self.rounds >= 2 {
            let next = match side {
                Side::Input => 1,
                Side::Output => self.rounds - 2,
            };

            zeroes.extend(
                (0..self.num_cells())
                    .filter(|i| !allowed.contains(i))
                    .map(|i| (next, i)),
            );
        }

        let cs = self.cell_size();
        let mut ids = Vec::new();

        for (round, i) in zeroes {
            for vars in &[&self.in_sbox[round], &self.out_sbox[round]] {
                for &var in &vars[cs * i..cs * (i + 1)] {
                    ids.push(self.oracle.add_constraint(&LinearExpr::from(var).equals(0)));
                }
            }
        }

        debug!(cell, ?side, constraints = ids.len(), "restricted active cell");

        self.restrictions.insert(side, ids);
        self.solved = false;
    }

    /// Removes the active cell restriction of `side`, if any.
    pub fn unrestrict(&mut self, side: Side) {
        if let Some(ids) = self.restrictions.remove(&side) {
            for id in ids {
                self.oracle.remove_constraint(id);
            }
        }

        self.solved = false;
    }

    /**
    Computes a trail with the minimum number of active cells over all rounds, with at least
    one active cell in the first round. Returns the active `(round, cell)` positions. The
    model is left with the constraints it had before the call.
    */
    pub fn minimize_active_cells(&mut self) -> Result<Vec<(usize, usize)>> {
        let cs = self.layer.cell_size();
        let num_cells = self.layer.num_cells();
        let in_sbox = &self.in_sbox;
        let mut scope = Scope::new(&mut self.oracle);
        let mut active = Vec::with_capacity(self.rounds);

        for vars in in_sbox.iter() {
            let indicators: Vec<Variable> = (0..num_cells)
                .map(|i| {
                    let y = scope.new_binary();
                    let cell_vars = &vars[cs * i..cs * (i + 1)];

                    // y is the disjunction of the bits of the cell
                    for &b in cell_vars {
                        scope.add_constraint(LinearExpr::from(y).term(b, -1), 0);
                    }
                    scope.add_constraint(LinearExpr::sum(cell_vars).term(y, -1), 0);

                    y
                })
                .collect();

            active.push(indicators);
        }

        scope.add_constraint(LinearExpr::sum(&active[0]), 1);

        let objective = LinearExpr::sum(active.iter().flatten());
        let optimum = scope.oracle.minimize(&objective)?;

        let positions = match optimum {
            Some(_) => active
                .iter()
                .enumerate()
                .flat_map(|(r, row)| row.iter().enumerate().map(move |(i, &y)| (r, i, y)))
                .filter(|&(_, _, y)| scope.oracle.value(y) == Some(1))
                .map(|(r, i, _)| (r, i))
                .collect::<Vec<_>>(),
            None => return Err(Error::NoSolution),
        };

        debug_assert_eq!(Some(positions.len() as i64), optimum);
        drop(scope);
        self.solved = false;

        debug!(rounds = self.rounds, active = positions.len(), "minimum number of active cells");

        Ok(positions)
    }

    /// A readable form of a state listing the active cells and their values.
    pub fn format_state(&self, x: u128) -> String {
        if x == 0 {
            return String::from("0");
        }

        let cs = self.cell_size();
        let cells = active_cells(x, self.num_cells(), cs)
            .into_iter()
            .map(|i| format!("(cell: {:2}, val: {:3x})", i, cell(x, i, cs)))
            .join(", ");

        format!("[{}]", cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::aes::qmat_on_state;
    use crate::cipher::{name_to_layer, MixColumns};

    fn model(cipher: &str, mixcol: MixColumns, sbox: SboxModel, rounds: usize) -> Primitive {
        let layer = name_to_layer(cipher, mixcol).unwrap();
        Primitive::new(layer, Arc::new(sbox), rounds).unwrap()
    }

    const MIXCOL_VECTORS: [(u128, u128); 2] = [
        (0x84FB386F1AE1AC977941DD70832DD769, 0x9F487F794F955F662AFC86ABD7F1AB29),
        (0x1F770C64F0B579DEAAAC432C3D37CF0E, 0xB7A53ECBBF9D75A0C40EFC79B674CC11),
    ];

    #[test]
    fn aes_shift_rows_vector() {
        let mut mid = model("aes", MixColumns::Identity, SboxModel::identity(8), 2);
        let x = 0x63CAB7040953D051CD60E0E7BA70E18Cu128.swap_bytes();
        let y = 0x6353E08C0960E104CD70B751BACAD0E7u128.swap_bytes();

        assert!(mid.is_possible(x, y).unwrap());
        assert!(!mid.is_possible(x ^ 1, y).unwrap());
    }

    #[test]
    fn aes_original_vectors() {
        let mut mid = model("aes", MixColumns::Original, SboxModel::identity(8), 2);

        for &(x, y) in MIXCOL_VECTORS.iter() {
            let (x, y) = (x.swap_bytes(), y.swap_bytes());
            assert!(mid.is_possible(x, y).unwrap());
            assert!(!mid.is_possible(x ^ 1, y).unwrap());
        }
    }

    #[test]
    fn aes_equivalent_vectors() {
        let mut mid = model("aes", MixColumns::Equivalent, SboxModel::identity(8), 2);

        for &(x, y) in MIXCOL_VECTORS.iter() {
            let xx = qmat_on_state(x.swap_bytes());
            let yy = qmat_on_state(y.swap_bytes());
            assert!(mid.is_possible(xx, yy).unwrap());
            assert!(!mid.is_possible(xx ^ 1, yy).unwrap());
        }
    }

    /// SubBytes inputs and outputs of FIPS-197, appendix B and C.
    const SUB_BYTES_VECTORS: [(u128, u128); 5] = [
        (0x193DE3BEA0F4E22B9AC68D2AE9F84808, 0xD42711AEE0BF98F1B8B45DE51E415230),
        (0xA49C7FF2689F352B6B5BEA43026A5049, 0x49DED28945DB96F17F39871A7702533B),
        (0xAA8F5F0361DDE3EF82D24AD26832469A, 0xAC73CF7BEFC111DF13B5D6B545235AB8),
        (0x00102030405060708090A0B0C0D0E0F0, 0x63CAB7040953D051CD60E0E7BA70E18C),
        (0x89D810E8855ACE682D1843D8CB128FE4, 0xA761CA9B97BE8B45D8AD1A611FC97369),
    ];

    #[test]
    fn aes_sbox_vectors() {
        // Adds i to byte i, byte 0 is left alone
        let shift = (0..16u128).fold(0, |acc, i| acc ^ i << (8 * i));

        for &mixcol in &[MixColumns::Original, MixColumns::Equivalent] {
            let layer = name_to_layer("aes", mixcol).unwrap();
            let sbox = SboxModel::from_table(8, &layer.sbox_table());
            let mut mid = model("aes", mixcol, sbox, 1);

            for (i, &(x0, y0)) in SUB_BYTES_VECTORS.iter().enumerate() {
                for &(x1, y1) in &SUB_BYTES_VECTORS[i + 1..] {
                    let x = (x0 ^ x1).swap_bytes();
                    let y = (y0 ^ y1).swap_bytes();

                    assert!(mid.is_possible(x, y).unwrap(), "{:?} {:032x}", mixcol, x);
                    assert_eq!(mid.last_output_diff().unwrap(), y);
                    assert!(!mid.is_possible(x, y ^ shift).unwrap(), "{:?} {:032x}", mixcol, x);
                }
            }
        }
    }

    #[test]
    fn states_follow_the_trail() {
        let mut mid = model("skinny64", MixColumns::Original, SboxModel::identity(4), 3);
        let layer = name_to_layer("skinny64", MixColumns::Original).unwrap();

        assert!(matches!(mid.last_input_diff(), Err(Error::NoSolution)));

        let x = 0x0000_0a00_3000_0001;
        let y = layer.apply(layer.apply(x));
        assert!(mid.is_possible(x, y).unwrap());

        assert_eq!(mid.last_input_diff().unwrap(), x);
        assert_eq!(mid.get_state_at(0, Layer::SboxOutput).unwrap(), x);
        assert_eq!(mid.get_state_at(1, Layer::SboxInput).unwrap(), layer.apply(x));
        assert_eq!(mid.get_state_at(2, Layer::SboxInput).unwrap(), y);
        assert_eq!(mid.last_output_diff().unwrap(), y);

        assert!(!mid.is_possible(x, y ^ 0x10).unwrap());
        assert!(matches!(mid.get_state_at(1, Layer::SboxInput), Err(Error::NoSolution)));
    }

    #[test]
    fn slots_are_replaced() {
        let mut mid = model("skinny64", MixColumns::Equivalent, SboxModel::arbitrary(4, 4), 2);

        for x in 1..8u128 {
            mid.is_possible(x, x << 4).unwrap();
            assert_eq!(mid.oracle().live_constraints(), 128);
        }

        mid.set_input_diff(0).unwrap();
        assert_eq!(mid.oracle().live_constraints(), 128);
    }

    #[test]
    fn construction_errors() {
        let aes = || name_to_layer("aes", MixColumns::Original).unwrap();

        assert!(matches!(
            Primitive::new(aes(), Arc::new(SboxModel::identity(8)), 0),
            Err(Error::InvalidRounds(0))
        ));
        assert!(matches!(
            Primitive::new(aes(), Arc::new(SboxModel::identity(4)), 2),
            Err(Error::CellSizeMismatch { expected: 8, found: 4, .. })
        ));
        assert!(matches!(
            Primitive::new(aes(), Arc::new(SboxModel::arbitrary(8, 7)), 2),
            Err(Error::SboxWidthMismatch { input: 8, output: 7 })
        ));

        let mut ddt = SboxModel::identity(8).ddt().clone();
        ddt[0][1] = 1;
        let leaky = SboxModel::new(8, 8, ddt, Vec::new()).unwrap();
        assert!(matches!(
            Primitive::new(aes(), Arc::new(leaky), 2),
            Err(Error::MalformedSbox(_))
        ));
    }

    #[test]
    fn differences_wider_than_the_state() {
        let mut mid = model("skinny64", MixColumns::Original, SboxModel::arbitrary(4, 4), 4);
        let x = 0x1;
        let y = 0xf << 80;

        assert!(matches!(
            mid.is_possible(x, y),
            Err(Error::DifferenceOutOfRange { state_size: 64, .. })
        ));
        assert!(matches!(
            mid.set_input_diff(1 << 64),
            Err(Error::DifferenceOutOfRange { value, .. }) if value == 1 << 64
        ));
        assert!(mid.set_output_diff(1 << 63).is_ok());

        assert!(mid.check_cell(15).is_ok());
        assert!(matches!(
            mid.check_cell(20),
            Err(Error::CellOutOfRange { cell: 20, num_cells: 16 })
        ));

        // AES fills the whole word
        let mut aes = model("aes", MixColumns::Original, SboxModel::arbitrary(8, 8), 1);
        assert!(aes.set_input_diff(u128::max_value()).is_ok());
    }

    #[test]
    fn minimum_active_cells() {
        let sbox = SboxModel::arbitrary(4, 4);

        let mut two = model("skinny64", MixColumns::Original, sbox.clone(), 2);
        let cells = two.minimize_active_cells().unwrap();
        assert_eq!(cells.len(), 2);
        assert!(cells.iter().any(|&(r, _)| r == 0));

        let mut three = model("skinny64", MixColumns::Original, sbox, 3);
        assert_eq!(three.minimize_active_cells().unwrap().len(), 5);
    }

    #[test]
    fn minimization_leaves_model_untouched() {
        let mut three = model("skinny64", MixColumns::Original, SboxModel::arbitrary(4, 4), 3);
        let x = 1 << 16;
        let y = three.layer().apply(three.layer().apply(x));
        let possible = three.is_possible(x, y).unwrap();
        let constraints = three.oracle().live_constraints();
        let variables = three.oracle().live_variables();

        // Cell 4 reaches a single cell and then three cells
        assert_eq!(three.minimize_active_cells().unwrap().len(), 5);
        assert_eq!(three.oracle().live_constraints(), constraints);
        assert_eq!(three.oracle().live_variables(), variables);

        three.set_input_diff(0).unwrap();
        assert!(matches!(three.minimize_active_cells(), Err(Error::NoSolution)));
        assert_eq!(three.oracle().live_constraints(), constraints);
        assert_eq!(three.oracle().live_variables(), variables);

        assert_eq!(three.is_possible(x, y).unwrap(), possible);
    }

    #[test]
    fn restrictions_keep_single_cell_trails() {
        let mut mid = model("skinny64", MixColumns::Original, SboxModel::arbitrary(4, 4), 4);

        for a in 0..4 {
            for b in 0..16 {
                let x = 0x3 << (4 * a);
                let y = 0x5 << (4 * b);
                let free = mid.is_possible(x, y).unwrap();

                mid.restrict_active_cell(a, Side::Input);
                mid.restrict_active_cell(b, Side::Output);
                assert_eq!(mid.is_possible(x, y).unwrap(), free, "{} {}", a, b);
                mid.unrestrict(Side::Input);
                mid.unrestrict(Side::Output);
            }
        }

        assert_eq!(mid.oracle().live_constraints(), 128);
    }

    #[test]
    fn restrictions_exclude_other_cells() {
        let mut mid = model("aes", MixColumns::Original, SboxModel::identity(8), 3);
        let layer = name_to_layer("aes", MixColumns::Original).unwrap();
        let x = 0x1b;
        let y = layer.apply(layer.apply(x));

        mid.restrict_active_cell(0, Side::Input);
        assert!(mid.is_possible(x, y).unwrap());
        assert!(!mid.is_possible(x << 40, layer.apply(layer.apply(x << 40))).unwrap());

        mid.restrict_active_cell(3, Side::Output);
        assert!(!mid.is_possible(x, y).unwrap());

        mid.unrestrict(Side::Output);
        assert!(mid.is_possible(x, y).unwrap());
    }

    #[test]
    fn single_round_restrictions() {
        let mut mid = model("skinny64", MixColumns::Original, SboxModel::arbitrary(4, 4), 1);

        mid.restrict_active_cell(2, Side::Output);
        assert!(mid.is_possible(0x3 << 8, 0x7 << 8).unwrap());
        assert!(!mid.is_possible(0x3 << 12, 0x7 << 12).unwrap());

        mid.restrict_active_cell(2, Side::Input);
        assert!(mid.is_possible(0x3 << 8, 0x7 << 8).unwrap());
        mid.unrestrict(Side::Output);
        mid.unrestrict(Side::Input);
        assert!(mid.is_possible(0x3 << 12, 0x7 << 12).unwrap());
    }

    #[test]
    #[should_panic]
    fn double_restriction() {
        let mut mid = model("skinny64", MixColumns::Original, SboxModel::identity(4), 2);
        mid.restrict_active_cell(0, Side::Input);
        mid.restrict_active_cell(1, Side::Input);
    }

    #[test]
    fn formatting() {
        let mid = model("skinny64", MixColumns::Original, SboxModel::identity(4), 1);
        assert_eq!(mid.format_state(0), "0");
        assert_eq!(mid.format_state(0xa0_0001), "[(cell:  0, val:   1), (cell:  5, val:   a)]");
    }
}
