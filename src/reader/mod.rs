//! Read-only access to the bytes of the input file.

pub mod func;

mod models;
pub use models::*;
