//! This crate contains a small interactive evaluator for fully parenthesized
//! arithmetic with variable assignment.

pub mod end_to_end;
pub mod lexical_analysis;
pub mod tree_building;
pub mod tree_evaluation;
