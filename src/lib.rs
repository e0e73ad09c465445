//! Search for impossible differentials of AES-like block ciphers.
//!
//! A cipher is modelled as a system of linear constraints over binary variables, one variable per
//! state bit before and after every S-box layer. A feasibility oracle decides whether an input
//! and an output difference can be connected. The search reuses every feasible answer to discard
//! many other candidate pairs through smaller auxiliary models.

pub mod cipher;
pub mod emitter;
pub mod error;
pub mod oracle;
pub mod primitive;
pub mod sbox;
pub mod search;
pub mod utility;

pub use crate::error::{Error, Result};
