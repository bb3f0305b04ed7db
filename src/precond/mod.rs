//! Incomplete-factorisation preconditioners.

pub mod ic;
pub mod ilut;
