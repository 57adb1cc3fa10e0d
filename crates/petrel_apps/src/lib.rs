//! Reference programs built on `petrel_core`.
//!
//! Each binary under `src/bin` is a thin wrapper: it parses option flags
//! with [`cli::Args`], calls one function from [`programs`] and prints the
//! result.
pub mod cli;
pub mod problems;
pub mod programs;

pub use cli::options_from_args;
