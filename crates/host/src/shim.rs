//! The dispatcher script written out for PhantomJS-compatible engines.
//!
//! It is regenerated on every `Process::open` so the script and this crate's
//! protocol always ship together.

/// Source of the dispatcher. Reads its port from `PORT`.
pub const SHIM: &str = include_str!("shim.js");

/// Prefix of the temporary file the script is written to.
pub const SCRIPT_PREFIX: &str = "phantomjs-";
