//! plugin-forge command line
//!
//! Library half of the binary so the command handlers can be tested.

pub mod commands;
pub mod common;

pub use common::GlobalOpts;
