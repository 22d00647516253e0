//! Shared helpers used by several layers.

pub mod json_path;
