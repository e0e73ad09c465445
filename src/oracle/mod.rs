//! The feasibility oracle: a store of binary (and small bounded integer) variables and of
//! linear constraints over them, able to decide whether the constraints admit a solution.
//!
//! Models talk to the oracle only through the `Oracle` trait. `sat::SatOracle` is the
//! implementation used by the rest of the crate.

pub mod sat;

use smallvec::SmallVec;
use std::fmt;
use tracing::trace;

use crate::error::{Error, Result};

pub use self::sat::SatOracle;

/// Handle of a variable owned by an oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable(pub(crate) usize);

impl Variable {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle of a removable constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintId(pub(crate) usize);

/**
An integer linear expression `Σ c_i·v_i + constant`.

terms       Pairs of variable and coefficient. A variable may appear more than once.
constant    The constant term.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinearExpr {
    terms: SmallVec<[(Variable, i64); 8]>,
    constant: i64,
}

impl LinearExpr {
    pub fn new() -> LinearExpr {
        LinearExpr::default()
    }

    /// The expression consisting of a constant only.
    pub fn constant(constant: i64) -> LinearExpr {
        LinearExpr {
            terms: SmallVec::new(),
            constant,
        }
    }

    /// The sum of the given variables, each with coefficient 1.
    pub fn sum<'a, I: IntoIterator<Item = &'a Variable>>(variables: I) -> LinearExpr {
        let mut expr = LinearExpr::new();

        for &var in variables {
            expr.add_term(var, 1);
        }

        expr
    }

    pub fn add_term(&mut self, var: Variable, coefficient: i64) {
        if coefficient != 0 {
            self.terms.push((var, coefficient));
        }
    }

    pub fn add_constant(&mut self, constant: i64) {
        self.constant += constant;
    }

    /// Builder version of `add_term`.
    pub fn term(mut self, var: Variable, coefficient: i64) -> LinearExpr {
        self.add_term(var, coefficient);
        self
    }

    pub fn terms(&self) -> &[(Variable, i64)] {
        &self.terms
    }

    pub fn constant_term(&self) -> i64 {
        self.constant
    }

    /// Evaluates the expression for the values given by `value`.
    pub fn evaluate<F: Fn(Variable) -> i64>(&self, value: F) -> i64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, &(var, c)| acc + c * value(var))
    }

    /// The constraint `self >= rhs`.
    pub fn at_least(mut self, rhs: i64) -> Constraint {
        self.constant -= rhs;
        Constraint::new(self, Relation::GreaterEqual)
    }

    /// The constraint `self <= rhs`.
    pub fn at_most(mut self, rhs: i64) -> Constraint {
        self.constant -= rhs;
        Constraint::new(self, Relation::LessEqual)
    }

    /// The constraint `self == rhs`.
    pub fn equals(mut self, rhs: i64) -> Constraint {
        self.constant -= rhs;
        Constraint::new(self, Relation::Equal)
    }
}

impl From<Variable> for LinearExpr {
    fn from(var: Variable) -> LinearExpr {
        LinearExpr::new().term(var, 1)
    }
}

impl fmt::Display for LinearExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, &(var, c)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{}·v{}", c, var.0)?;
        }

        write!(f, " + {}", self.constant)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    GreaterEqual,
    LessEqual,
    Equal,
}

/// A linear constraint `expr (>=|<=|==) 0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    pub expr: LinearExpr,
    pub relation: Relation,
}

impl Constraint {
    pub fn new(expr: LinearExpr, relation: Relation) -> Constraint {
        Constraint { expr, relation }
    }

    /// Checks the constraint against the values given by `value`.
    pub fn is_satisfied<F: Fn(Variable) -> i64>(&self, value: F) -> bool {
        let lhs = self.expr.evaluate(value);

        match self.relation {
            Relation::GreaterEqual => lhs >= 0,
            Relation::LessEqual => lhs <= 0,
            Relation::Equal => lhs == 0,
        }
    }
}

/// Outcome of a feasibility query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Feasible,
    Infeasible,
    /// The oracle gave up or failed. The reason is backend specific.
    Inconclusive(String),
}

/**
The contract a constraint solver has to fulfil to back a model.

Constraints added with `assert_constraint` stay for the lifetime of the oracle. Constraints
added with `add_constraint` can later be retracted with `remove_constraint`. Values can only be
read after a `Feasible` answer and until the next query.
*/
pub trait Oracle {
    /// Declares a new variable taking values in {0, 1}.
    fn new_binary(&mut self) -> Variable;

    /// Declares a new integer variable taking values in `[lower, upper]`.
    fn new_integer(&mut self, lower: i64, upper: i64) -> Variable;

    /// Retracts a variable. It must not appear in any live constraint.
    fn remove_variable(&mut self, var: Variable);

    /// Adds a constraint that cannot be removed.
    fn assert_constraint(&mut self, constraint: &Constraint);

    /// Adds a constraint that can be removed with `remove_constraint`.
    fn add_constraint(&mut self, constraint: &Constraint) -> ConstraintId;

    fn remove_constraint(&mut self, id: ConstraintId);

    /// Looks for any point satisfying all live constraints.
    fn solve(&mut self) -> Status;

    /// The value of `var` in the last feasible solution.
    fn value(&self, var: Variable) -> Option<i64>;

    /**
    Minimises `objective` over the live constraints. Returns `None` when they are
    infeasible. On success an optimal solution is readable through `value` and the
    oracle holds exactly the constraints it held before the call.
    */
    fn minimize(&mut self, objective: &LinearExpr) -> Result<Option<i64>> {
        let mut bounds = Vec::new();
        let mut best = None;

        // Tighten an upper bound on the objective until the constraints break
        let outcome = loop {
            match self.solve() {
                Status::Feasible => {
                    let value = objective.evaluate(|var| self.value(var).unwrap_or(0));
                    best = Some(value);
                    trace!(objective = %objective, bound = value - 1, "tightening objective");
                    bounds.push(self.add_constraint(&objective.clone().at_most(value - 1)));
                }
                Status::Infeasible => break Ok(()),
                Status::Inconclusive(reason) => break Err(Error::OracleInconclusive(reason)),
            }
        };

        for id in bounds {
            self.remove_constraint(id);
        }

        outcome?;

        if let Some(value) = best {
            // The last query was infeasible, solve once more to expose an optimal point
            let id = self.add_constraint(&objective.clone().at_most(value));
            let status = self.solve();
            self.remove_constraint(id);

            match status {
                Status::Feasible => {}
                Status::Infeasible => {
                    return Err(Error::OracleInconclusive(format!(
                        "objective bound {} turned infeasible",
                        value
                    )))
                }
                Status::Inconclusive(reason) => return Err(Error::OracleInconclusive(reason)),
            }
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expr_evaluation() {
        let a = Variable(0);
        let b = Variable(1);
        let expr = LinearExpr::new().term(a, 3).term(b, -2).term(a, 1);
        let value = |v: Variable| if v == a { 1 } else { 2 };

        assert_eq!(expr.evaluate(value), 0);
        assert!(expr.clone().at_least(0).is_satisfied(value));
        assert!(expr.clone().equals(0).is_satisfied(value));
        assert!(!expr.clone().at_least(1).is_satisfied(value));
        assert!(!expr.at_most(-1).is_satisfied(|_| 0));
    }

    #[test]
    fn zero_terms_dropped() {
        let expr = LinearExpr::new().term(Variable(3), 0);
        assert!(expr.terms().is_empty());
    }

    #[test]
    fn minimize_on_sat_oracle() {
        let mut oracle = SatOracle::new();
        let x: Vec<_> = (0..4).map(|_| oracle.new_binary()).collect();
        oracle.assert_constraint(&LinearExpr::sum(&x).at_least(2));
        oracle.assert_constraint(&LinearExpr::from(x[0]).equals(1));

        let objective = LinearExpr::sum(&x).term(x[1], 2);
        assert_eq!(oracle.minimize(&objective).unwrap(), Some(2));
        assert_eq!(oracle.value(x[0]), Some(1));
        assert_eq!(oracle.value(x[1]), Some(0));
        assert_eq!(oracle.live_constraints(), 0);

        oracle.assert_constraint(&LinearExpr::sum(&x).at_most(0));
        assert_eq!(oracle.minimize(&objective).unwrap(), None);
    }
}
