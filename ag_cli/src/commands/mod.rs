//! Command implementations for the ag CLI.

pub mod cleanup;
pub mod download;
pub mod info;
pub mod source;
