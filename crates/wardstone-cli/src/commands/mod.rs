//! CLI command implementations.

pub mod check;
pub mod demo;
pub mod matrix;
pub mod roles;
pub mod version;
