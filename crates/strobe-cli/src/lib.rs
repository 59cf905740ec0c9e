//! Strobe host harness
//!
//! Command implementations behind the `strobe` binary, exposed as a library so
//! they can be driven from tests.

pub mod commands;
