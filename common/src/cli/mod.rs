//! CLI-related shared utilities.
//!
//! Shared by both binaries so `--color` behaves identically.

mod color;

pub use color::ColorWhen;
