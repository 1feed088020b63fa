//! Command implementations for the kdtrain CLI.

pub mod inspect;
pub mod synth;
pub mod teacher;
pub mod train;
pub mod types;
