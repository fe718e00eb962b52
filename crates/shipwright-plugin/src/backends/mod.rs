//! Built-in leaf plugins that move files.

pub mod local;
pub mod zip;
