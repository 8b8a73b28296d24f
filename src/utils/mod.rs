//! Cross-cutting filesystem helpers.

pub mod fs;
