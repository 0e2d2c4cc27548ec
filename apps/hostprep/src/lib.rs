//! # hostprep
//!
//! Library half of the hostprep binary: CLI definitions and command
//! implementations, exposed so they can be exercised from tests.

pub mod cli;
