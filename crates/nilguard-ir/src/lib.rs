//! SSA program representation and CFG navigation for nilguard.
//!
//! The front-end bridge delivers a whole program as JSON; this crate owns
//! the deserialized types plus the per-procedure views (CFG with
//! dominator tree, instruction/referrer indices) the analysis traverses.

pub mod cfg;
pub mod index;
pub mod ir;
