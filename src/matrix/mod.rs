//! Matrix Module
//!
//! The contradiction matrix and the principle names its cells refer to.

pub mod contradiction;
pub mod principles;

pub use contradiction::{ContradictionMatrix, MatrixLayout};
pub use principles::PrincipleCatalog;
