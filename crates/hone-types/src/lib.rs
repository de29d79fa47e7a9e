//! # hone-types
//!
//! Core data model for the hone parameter tuner: bounded search dimensions,
//! bound snapshots, and the workspace error taxonomy.

pub mod errors;
pub mod parameter;

pub use errors::*;
pub use parameter::*;
