//! An `Oracle` backed by the varisat CDCL solver.
//!
//! Linear constraints are normalised to `Σ w·l >= bound` over literals with positive weights
//! and then turned into clauses: directly when the constraint is a disjunction, otherwise
//! through a BDD over the weighted literals. Removable constraints are either unit literals,
//! passed as assumptions, or guarded by an activation literal assumed while they are live.

use fnv::FnvHashMap;
use tracing::trace;
use varisat::{ExtendFormula, Lit, Solver};

use super::{Constraint, ConstraintId, LinearExpr, Oracle, Relation, Status, Variable};

/// How an oracle variable is represented in the solver.
enum VarKind {
    Binary(Lit),
    /// `lower + Σ 2^j·bits[j]`
    Integer { lower: i64, bits: Vec<Lit> },
    Removed,
}

/// How a removable constraint is switched on.
enum Guard {
    Assumptions(Vec<Lit>),
    Activation(Lit),
}

/// `Σ w·l >= bound` with `w > 0`, terms sorted by decreasing weight.
#[derive(Debug)]
struct Normalized {
    terms: Vec<(Lit, i64)>,
    bound: i64,
}

enum Shape {
    Trivial,
    Unsat,
    Clause(Vec<Lit>),
    General,
}

impl Normalized {
    fn shape(&self) -> Shape {
        if self.bound <= 0 {
            return Shape::Trivial;
        }

        let total: i64 = self.terms.iter().map(|&(_, w)| w).sum();

        if total < self.bound {
            Shape::Unsat
        } else if self.terms.iter().all(|&(_, w)| w >= self.bound) {
            Shape::Clause(self.terms.iter().map(|&(l, _)| l).collect())
        } else {
            Shape::General
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Node {
    True,
    False,
    Lit(Lit),
}

/// Memoised BDD encoding of a normalised constraint. Node `(i, k)` stands for
/// `Σ_{j >= i} w_j·l_j >= k`; only the implication node -> constraint is encoded.
struct BddEncoder<'s> {
    solver: &'s mut Solver<'static>,
    terms: &'s [(Lit, i64)],
    suffix: Vec<i64>,
    memo: FnvHashMap<(usize, i64), Node>,
}

impl<'s> BddEncoder<'s> {
    fn new(solver: &'s mut Solver<'static>, terms: &'s [(Lit, i64)]) -> BddEncoder<'s> {
        let mut suffix = vec![0; terms.len() + 1];

        for i in (0..terms.len()).rev() {
            suffix[i] = suffix[i + 1] + terms[i].1;
        }

        BddEncoder {
            solver,
            terms,
            suffix,
            memo: FnvHashMap::default(),
        }
    }

    fn node(&mut self, i: usize, k: i64) -> Node {
        if k <= 0 {
            return Node::True;
        }
        if self.suffix[i] < k {
            return Node::False;
        }
        if let Some(&node) = self.memo.get(&(i, k)) {
            return node;
        }

        let (lit, weight) = self.terms[i];
        let high = self.node(i + 1, k - weight);
        let low = self.node(i + 1, k);

        let node = if high == low {
            high
        } else {
            let n = self.solver.new_lit();
            self.implies(n, lit, high);
            self.implies(n, !lit, low);
            Node::Lit(n)
        };

        self.memo.insert((i, k), node);
        node
    }

    /// Adds `n ∧ condition → target`.
    fn implies(&mut self, n: Lit, condition: Lit, target: Node) {
        match target {
            Node::True => {}
            Node::False => self.solver.add_clause(&[!n, !condition]),
            Node::Lit(t) => self.solver.add_clause(&[!n, !condition, t]),
        }
    }
}

/**
A feasibility oracle on top of a varisat solver.

solver        The incremental SAT solver.
variables     Representation of every oracle variable.
guards        The live removable constraints.
model         Values of the solver variables in the last feasible solution.
false_lit     A literal fixed to false, used to make unguarded contradictions.
*/
pub struct SatOracle {
    solver: Solver<'static>,
    variables: Vec<VarKind>,
    guards: FnvHashMap<usize, Guard>,
    next_constraint: usize,
    model: Option<Vec<bool>>,
    false_lit: Lit,
}

impl Default for SatOracle {
    fn default() -> SatOracle {
        SatOracle::new()
    }
}

impl SatOracle {
    pub fn new() -> SatOracle {
        let mut solver = Solver::new();
        let false_lit = solver.new_lit();
        solver.add_clause(&[!false_lit]);

        SatOracle {
            solver,
            variables: Vec::new(),
            guards: FnvHashMap::default(),
            next_constraint: 0,
            model: None,
            false_lit,
        }
    }

    /// Number of removable constraints currently live.
    pub fn live_constraints(&self) -> usize {
        self.guards.len()
    }

    /// Number of variables declared and not removed.
    pub fn live_variables(&self) -> usize {
        self.variables
            .iter()
            .filter(|v| !matches!(v, VarKind::Removed))
            .count()
    }

    /// Rewrites `sign·expr >= 0` over solver literals.
    fn normalize(&self, expr: &LinearExpr, sign: i64) -> Normalized {
        let mut constant = sign * expr.constant_term();
        let mut coefficients: FnvHashMap<Lit, i64> = FnvHashMap::default();

        for &(var, c) in expr.terms() {
            let c = sign * c;

            match &self.variables[var.index()] {
                VarKind::Binary(lit) => *coefficients.entry(*lit).or_insert(0) += c,
                VarKind::Integer { lower, bits } => {
                    constant += c * lower;
                    for (j, lit) in bits.iter().enumerate() {
                        *coefficients.entry(*lit).or_insert(0) += c << j;
                    }
                }
                VarKind::Removed => panic!("constraint uses removed variable {}", var.index()),
            }
        }

        // c·x with c < 0 becomes c + |c|·¬x
        let mut bound = -constant;
        let mut terms = Vec::with_capacity(coefficients.len());

        for (lit, c) in coefficients {
            if c > 0 {
                terms.push((lit, c));
            } else if c < 0 {
                terms.push((!lit, -c));
                bound -= c;
            }
        }

        terms.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        Normalized { terms, bound }
    }

    fn normalize_constraint(&self, constraint: &Constraint) -> Vec<Normalized> {
        match constraint.relation {
            Relation::GreaterEqual => vec![self.normalize(&constraint.expr, 1)],
            Relation::LessEqual => vec![self.normalize(&constraint.expr, -1)],
            Relation::Equal => vec![
                self.normalize(&constraint.expr, 1),
                self.normalize(&constraint.expr, -1),
            ],
        }
    }

    fn add_guarded(&mut self, guard: Option<Lit>, lits: &[Lit]) {
        let mut clause = lits.to_vec();

        match guard {
            Some(g) => clause.push(!g),
            None if clause.is_empty() => clause.push(self.false_lit),
            None => {}
        }

        self.solver.add_clause(&clause);
    }

    fn encode(&mut self, constraint: &Normalized, guard: Option<Lit>) {
        match constraint.shape() {
            Shape::Trivial => {}
            Shape::Unsat => self.add_guarded(guard, &[]),
            Shape::Clause(lits) => self.add_guarded(guard, &lits),
            Shape::General => {
                let root = BddEncoder::new(&mut self.solver, &constraint.terms)
                    .node(0, constraint.bound);

                match root {
                    Node::True => {}
                    Node::False => self.add_guarded(guard, &[]),
                    Node::Lit(l) => self.add_guarded(guard, &[l]),
                }
            }
        }
    }

    fn model_value(&self, lit: Lit) -> Option<bool> {
        self.model.as_ref().map(|model| {
            let value = model.get(lit.var().index()).copied().unwrap_or(false);
            value == lit.is_positive()
        })
    }
}

impl Oracle for SatOracle {
    fn new_binary(&mut self) -> Variable {
        let lit = self.solver.new_lit();
        self.variables.push(VarKind::Binary(lit));
        Variable(self.variables.len() - 1)
    }

    fn new_integer(&mut self, lower: i64, upper: i64) -> Variable {
        assert!(lower <= upper, "empty integer domain [{}, {}]", lower, upper);

        let range = (upper - lower) as u64;
        let width = (64 - range.leading_zeros()) as usize;
        let bits = (0..width).map(|_| self.solver.new_lit()).collect();

        self.variables.push(VarKind::Integer { lower, bits });
        let var = Variable(self.variables.len() - 1);

        if width > 0 && range != (1u64 << width) - 1 {
            self.assert_constraint(&LinearExpr::from(var).at_most(upper));
        }

        var
    }

    fn remove_variable(&mut self, var: Variable) {
        self.variables[var.index()] = VarKind::Removed;
    }

    fn assert_constraint(&mut self, constraint: &Constraint) {
        for part in self.normalize_constraint(constraint) {
            self.encode(&part, None);
        }
    }

    fn add_constraint(&mut self, constraint: &Constraint) -> ConstraintId {
        let parts = self.normalize_constraint(constraint);
        let mut units = Vec::new();
        let mut simple = true;

        for part in &parts {
            match part.shape() {
                Shape::Trivial => {}
                Shape::Clause(ref lits) if lits.len() == 1 => units.push(lits[0]),
                _ => simple = false,
            }
        }

        let guard = if simple {
            Guard::Assumptions(units)
        } else {
            let g = self.solver.new_lit();
            for part in &parts {
                self.encode(part, Some(g));
            }
            Guard::Activation(g)
        };

        let id = self.next_constraint;
        self.next_constraint += 1;
        self.guards.insert(id, guard);

        ConstraintId(id)
    }

    fn remove_constraint(&mut self, id: ConstraintId) {
        match self.guards.remove(&id.0) {
            Some(Guard::Activation(g)) => self.solver.add_clause(&[!g]),
            Some(Guard::Assumptions(_)) => {}
            None => panic!("constraint {} is not live", id.0),
        }
    }

    fn solve(&mut self) -> Status {
        let assumptions: Vec<Lit> = self
            .guards
            .values()
            .flat_map(|guard| match guard {
                Guard::Assumptions(lits) => lits.clone(),
                Guard::Activation(g) => vec![*g],
            })
            .collect();

        trace!(assumptions = assumptions.len(), "sat query");

        self.solver.assume(&assumptions);
        self.model = None;

        match self.solver.solve() {
            Ok(true) => match self.solver.model() {
                Some(lits) => {
                    let size = lits.iter().map(|l| l.var().index() + 1).max().unwrap_or(0);
                    let mut model = vec![false; size];

                    for lit in lits {
                        model[lit.var().index()] = lit.is_positive();
                    }

                    self.model = Some(model);
                    Status::Feasible
                }
                None => Status::Inconclusive(String::from("solver reported sat without a model")),
            },
            Ok(false) => Status::Infeasible,
            Err(e) => Status::Inconclusive(e.to_string()),
        }
    }

    fn value(&self, var: Variable) -> Option<i64> {
        match &self.variables[var.index()] {
            VarKind::Binary(lit) => self.model_value(*lit).map(i64::from),
            VarKind::Integer { lower, bits } => {
                let mut value = *lower;

                for (j, lit) in bits.iter().enumerate() {
                    if self.model_value(*lit)? {
                        value += 1 << j;
                    }
                }

                Some(value)
            }
            VarKind::Removed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(oracle: &mut SatOracle, vars: &[Variable], value: usize) -> Vec<ConstraintId> {
        vars.iter()
            .enumerate()
            .map(|(i, &v)| {
                let bit = ((value >> i) & 1) as i64;
                oracle.add_constraint(&LinearExpr::from(v).equals(bit))
            })
            .collect()
    }

    fn release(oracle: &mut SatOracle, ids: Vec<ConstraintId>) {
        for id in ids {
            oracle.remove_constraint(id);
        }
    }

    #[test]
    fn weighted_constraints_match_brute_force() {
        let mut oracle = SatOracle::new();
        let x: Vec<_> = (0..4).map(|_| oracle.new_binary()).collect();

        let constraints = vec![
            LinearExpr::new()
                .term(x[0], 3)
                .term(x[1], -2)
                .term(x[2], 1)
                .term(x[3], 2)
                .at_least(2),
            LinearExpr::new()
                .term(x[0], 2)
                .term(x[1], 2)
                .term(x[2], -1)
                .term(x[3], -3)
                .at_most(0),
            LinearExpr::sum(&x).term(x[0], 1).equals(2),
            LinearExpr::new().term(x[1], 5).term(x[1], -5).at_least(1),
        ];

        for constraint in &constraints {
            let id = oracle.add_constraint(constraint);

            for value in 0..16 {
                let ids = fix(&mut oracle, &x, value);
                let expected =
                    constraint.is_satisfied(|v| ((value >> v.index()) & 1) as i64);
                assert_eq!(oracle.solve() == Status::Feasible, expected, "{:?} {}", constraint, value);
                release(&mut oracle, ids);
            }

            oracle.remove_constraint(id);
        }

        assert_eq!(oracle.live_constraints(), 0);
        assert_eq!(oracle.solve(), Status::Feasible);
    }

    #[test]
    fn integer_bounds() {
        let mut oracle = SatOracle::new();
        let t = oracle.new_integer(-2, 3);

        assert_eq!(oracle.minimize(&LinearExpr::from(t)).unwrap(), Some(-2));
        assert_eq!(oracle.value(t), Some(-2));
        assert_eq!(oracle.minimize(&LinearExpr::new().term(t, -1)).unwrap(), Some(-3));
        assert_eq!(oracle.value(t), Some(3));

        let id = oracle.add_constraint(&LinearExpr::from(t).equals(4));
        assert_eq!(oracle.solve(), Status::Infeasible);
        assert_eq!(oracle.value(t), None);
        oracle.remove_constraint(id);

        let id = oracle.add_constraint(&LinearExpr::from(t).equals(1));
        assert_eq!(oracle.solve(), Status::Feasible);
        assert_eq!(oracle.value(t), Some(1));
        oracle.remove_constraint(id);
    }

    #[test]
    fn removal_restores_feasibility() {
        let mut oracle = SatOracle::new();
        let x: Vec<_> = (0..3).map(|_| oracle.new_binary()).collect();

        let a = oracle.add_constraint(&LinearExpr::sum(&x).at_least(2));
        let b = oracle.add_constraint(&LinearExpr::sum(&x).at_most(1));
        assert_eq!(oracle.solve(), Status::Infeasible);

        oracle.remove_constraint(b);
        assert_eq!(oracle.solve(), Status::Feasible);
        let ones: i64 = x.iter().map(|&v| oracle.value(v).unwrap()).sum();
        assert!(ones >= 2);

        let c = oracle.add_constraint(&LinearExpr::from(x[0]).equals(0));
        let d = oracle.add_constraint(&LinearExpr::from(x[1]).equals(0));
        assert_eq!(oracle.solve(), Status::Infeasible);

        oracle.remove_constraint(a);
        assert_eq!(oracle.solve(), Status::Feasible);
        oracle.remove_constraint(c);
        oracle.remove_constraint(d);
        assert_eq!(oracle.live_constraints(), 0);
    }

    #[test]
    fn permanent_contradiction() {
        let mut oracle = SatOracle::new();
        let x = oracle.new_binary();

        oracle.assert_constraint(&LinearExpr::new().term(x, 2).at_least(3));
        assert_eq!(oracle.solve(), Status::Infeasible);
    }

    #[test]
    fn removed_variable_has_no_value() {
        let mut oracle = SatOracle::new();
        let x = oracle.new_binary();
        let y = oracle.new_binary();

        assert_eq!(oracle.solve(), Status::Feasible);
        oracle.remove_variable(x);
        assert_eq!(oracle.value(x), None);
        assert!(oracle.value(y).is_some());
        assert_eq!(oracle.live_variables(), 1);
    }
}
