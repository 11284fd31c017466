//! Whole-program nilness analysis.
//!
//! Finds nil dereferences and degenerate nil comparisons in SSA programs
//! delivered by the front-end bridge. An interprocedural fixpoint
//! derives per-procedure summaries (argument, return, and bound-receiver
//! nilness per site); a second dominance-order pass consumes them to
//! emit diagnostics with root-cause suppression.

pub mod ignore;
pub mod lattice;
pub mod propagate;
pub mod rules;
pub mod stack;
pub mod store;
pub mod summary;
pub mod walker;

pub use propagate::{AnalysisOptions, Analyzer};
